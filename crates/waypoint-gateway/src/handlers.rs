// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway.
//!
//! Handles POST /api/generate, GET /health, GET /metrics, and the
//! /cache/* administration routes.

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use waypoint_cache::{CacheHealth, CacheStats};
use waypoint_core::{
    ComplexityTier, ProviderFailure, RequestContext, TokenOptimization, WaypointError,
};
use waypoint_router::{ProviderHealth, ServiceStatus, WarmEntry};

use crate::server::GatewayState;

/// Header carrying the caller's tenant.
pub const TENANT_HEADER: &str = "x-tenant-id";

const DEFAULT_TENANT: &str = "default";

/// Request body for POST /api/generate.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub prompt: String,
    /// Optional ceiling on the token budget.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// Response body for POST /api/generate.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub request_id: String,
    pub tenant_id: String,
    pub text: String,
    pub provider: String,
    pub cost: f64,
    pub cache_hit: bool,
    pub tier: ComplexityTier,
    pub token_optimization: TokenOptimization,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: ServiceStatus,
    pub version: String,
    pub uptime_secs: u64,
    /// RFC 3339 process start time.
    pub started_at: String,
    pub providers: Vec<ProviderHealth>,
    pub cache: CacheHealth,
}

#[derive(Debug, Deserialize)]
pub struct WarmRequest {
    pub entries: Vec<WarmEntryBody>,
}

#[derive(Debug, Deserialize)]
pub struct WarmEntryBody {
    pub prompt: String,
    pub response: String,
}

#[derive(Debug, Serialize)]
pub struct WarmResponse {
    pub warmed: usize,
}

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub pattern: String,
    pub removed: usize,
}

/// Error response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
    /// Stable error kind, e.g. `routing_exhausted`.
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Per-provider reasons when the chain was exhausted.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<ProviderFailure>,
}

/// A [`WaypointError`] on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub request_id: Option<String>,
    pub error: WaypointError,
}

impl ApiError {
    fn for_request(request_id: &str, error: WaypointError) -> Self {
        Self {
            request_id: Some(request_id.to_string()),
            error,
        }
    }
}

impl From<WaypointError> for ApiError {
    fn from(error: WaypointError) -> Self {
        Self {
            request_id: None,
            error,
        }
    }
}

/// HTTP status for an error surfaced to a caller.
pub fn status_for(error: &WaypointError) -> StatusCode {
    match error {
        WaypointError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        WaypointError::RoutingExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        WaypointError::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.error);
        let kind = self.error.kind();
        let error = self.error.to_string();
        let attempts = match self.error {
            WaypointError::RoutingExhausted { attempts } => attempts,
            _ => Vec::new(),
        };
        (
            status,
            Json(ErrorResponse {
                error,
                kind,
                request_id: self.request_id,
                attempts,
            }),
        )
            .into_response()
    }
}

fn tenant_from(headers: &HeaderMap) -> String {
    headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TENANT)
        .to_string()
}

/// POST /api/generate
///
/// Classifies the prompt, serves it from cache or the provider chain, and
/// returns the answer with cost and token budget metadata.
pub async fn post_generate(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(body): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let request_id = uuid::Uuid::new_v4().to_string();
    let tenant_id = tenant_from(&headers);
    debug!(%request_id, %tenant_id, max_tokens = ?body.max_tokens, "generate request received");

    let ctx = RequestContext::new(
        request_id.clone(),
        tenant_id.clone(),
        body.prompt,
        body.max_tokens,
        state.request_timeout,
    );
    let routed = state
        .orchestrator
        .route(ctx)
        .await
        .map_err(|e| ApiError::for_request(&request_id, e))?;

    Ok(Json(GenerateResponse {
        request_id: routed.request_id,
        tenant_id,
        text: routed.text,
        provider: routed.provider,
        cost: routed.cost,
        cache_hit: routed.cache_hit,
        tier: routed.tier,
        token_optimization: routed.token_optimization,
    }))
}

/// GET /health
///
/// 200 while at least one provider can be tried, 503 when every breaker is open.
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let health = state.orchestrator.health().await;
    let status = match health.status {
        ServiceStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        ServiceStatus::Healthy | ServiceStatus::Degraded => StatusCode::OK,
    };
    let body = HealthResponse {
        status: health.status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        started_at: state.health.started_at.to_rfc3339(),
        providers: health.providers,
        cache: health.cache,
    };
    (status, Json(body)).into_response()
}

/// GET /metrics
///
/// Prometheus text exposition, or 404 when metrics are disabled.
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET /cache/stats
pub async fn get_cache_stats(State(state): State<GatewayState>) -> Json<CacheStats> {
    Json(state.orchestrator.cache_stats().await)
}

/// POST /cache/invalidate/{pattern}
pub async fn post_cache_invalidate(
    State(state): State<GatewayState>,
    Path(pattern): Path<String>,
) -> Result<Json<InvalidateResponse>, ApiError> {
    let removed = state.orchestrator.invalidate(&pattern).await?;
    Ok(Json(InvalidateResponse { pattern, removed }))
}

/// POST /cache/warm
pub async fn post_cache_warm(
    State(state): State<GatewayState>,
    Json(body): Json<WarmRequest>,
) -> Result<Json<WarmResponse>, ApiError> {
    let entries = body
        .entries
        .into_iter()
        .map(|e| WarmEntry {
            prompt: e.prompt,
            response: e.response,
        })
        .collect();
    let warmed = state.orchestrator.warm(entries).await?;
    Ok(Json(WarmResponse { warmed }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use waypoint_core::FailureReason;

    use super::*;

    #[test]
    fn generate_request_accepts_optional_max_tokens() {
        let req: GenerateRequest = serde_json::from_str(r#"{"prompt": "hi"}"#).unwrap();
        assert_eq!(req.prompt, "hi");
        assert!(req.max_tokens.is_none());

        let req: GenerateRequest =
            serde_json::from_str(r#"{"prompt": "hi", "maxTokens": 200}"#).unwrap();
        assert_eq!(req.max_tokens, Some(200));
    }

    #[test]
    fn generate_response_uses_camel_case() {
        let resp = GenerateResponse {
            request_id: "r".into(),
            tenant_id: "t".into(),
            text: "answer".into(),
            provider: "openai".into(),
            cost: 0.025,
            cache_hit: false,
            tier: ComplexityTier::Complex,
            token_optimization: TokenOptimization::new(4096, 1000),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["cacheHit"], false);
        assert_eq!(json["tier"], "complex");
        assert_eq!(json["tokenOptimization"]["saved"], 3096);
        assert_eq!(json["requestId"], "r");
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            status_for(&WaypointError::InvalidRequest("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&WaypointError::RoutingExhausted { attempts: vec![] }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&WaypointError::DeadlineExceeded {
                budget: Duration::from_secs(1)
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&WaypointError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn exhausted_error_body_lists_attempts() {
        let body = ErrorResponse {
            error: "all providers failed".into(),
            kind: "routing_exhausted",
            request_id: Some("req-9".into()),
            attempts: vec![ProviderFailure {
                provider: "perplexity".into(),
                reason: FailureReason::CircuitOpen,
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["requestId"], "req-9");
        assert_eq!(json["attempts"][0]["provider"], "perplexity");
    }

    #[test]
    fn error_body_omits_empty_fields() {
        let body = ErrorResponse {
            error: "bad".into(),
            kind: "invalid_request",
            request_id: None,
            attempts: vec![],
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"error":"bad","kind":"invalid_request"}"#);
    }

    #[test]
    fn tenant_defaults_when_header_missing_or_blank() {
        let mut headers = HeaderMap::new();
        assert_eq!(tenant_from(&headers), "default");
        headers.insert(TENANT_HEADER, "  ".parse().unwrap());
        assert_eq!(tenant_from(&headers), "default");
        headers.insert(TENANT_HEADER, "acme".parse().unwrap());
        assert_eq!(tenant_from(&headers), "acme");
    }
}
