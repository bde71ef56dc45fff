// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use waypoint_core::WaypointError;
use waypoint_router::Orchestrator;

use crate::auth::{AuthConfig, admin_auth};
use crate::handlers;

/// Health state for the unauthenticated health/metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Wall-clock start time reported by `/health`.
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            start_time: std::time::Instant::now(),
            started_at: chrono::Utc::now(),
            prometheus_render: None,
        }
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub orchestrator: Arc<Orchestrator>,
    /// Admin route authentication.
    pub auth: AuthConfig,
    pub health: HealthState,
    /// Deadline given to each generate request.
    pub request_timeout: Duration,
}

impl GatewayState {
    pub fn new(orchestrator: Arc<Orchestrator>, request_timeout: Duration) -> Self {
        Self {
            orchestrator,
            auth: AuthConfig::default(),
            health: HealthState::default(),
            request_timeout,
        }
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_prometheus_render(mut self, render: Arc<dyn Fn() -> String + Send + Sync>) -> Self {
        self.health.prometheus_render = Some(render);
        self
    }
}

/// Bind address for the gateway.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Assemble the route table.
///
/// Public: `/api/generate`, `/health`, `/metrics`, `/cache/stats`.
/// Admin (bearer-guarded when a token is set): `/cache/invalidate/{pattern}`,
/// `/cache/warm`.
pub fn build_router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/api/generate", post(handlers::post_generate))
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .route("/cache/stats", get(handlers::get_cache_stats))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route(
            "/cache/invalidate/{pattern}",
            post(handlers::post_cache_invalidate),
        )
        .route("/cache/warm", post(handlers::post_cache_warm))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            admin_auth,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the gateway until `shutdown` is cancelled.
///
/// In-flight requests are allowed to finish before this returns.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), WaypointError> {
    if state.auth.is_open() {
        tracing::warn!("no admin token configured; /cache/invalidate and /cache/warm are open");
    }

    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| WaypointError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| WaypointError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}
