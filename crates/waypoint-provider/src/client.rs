// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for a single provider endpoint.
//!
//! Provides [`HttpProviderClient`], which owns a pooled `reqwest::Client`
//! for one provider, enforces the attempt deadline, and resolves the cost of
//! each call. It never retries; the orchestrator decides what happens next.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tokio::time::Instant;
use tracing::debug;
use waypoint_core::{InvokeRequest, ProviderDescriptor, ProviderReply, WaypointError};

use crate::wire::{ErrorResponse, GenerateRequest, GenerateResponse};

/// Idle connections kept per host.
const POOL_MAX_IDLE_PER_HOST: usize = 32;

/// How long an idle pooled connection is kept.
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Clone)]
pub struct HttpProviderClient {
    descriptor: ProviderDescriptor,
    client: reqwest::Client,
}

impl HttpProviderClient {
    /// Build a client for `descriptor`.
    ///
    /// The bearer token, if any, is installed as a sensitive default header.
    pub fn new(descriptor: ProviderDescriptor) -> Result<Self, WaypointError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &descriptor.api_key {
            let mut value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                WaypointError::Config(format!(
                    "invalid api_key for provider `{}`: {e}",
                    descriptor.name
                ))
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .build()
            .map_err(|e| WaypointError::Provider {
                provider: descriptor.name.clone(),
                message: format!("failed to build HTTP client: {e}"),
                status: None,
                source: Some(Box::new(e)),
            })?;

        Ok(Self { descriptor, client })
    }

    pub fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    /// Send one request, bounded by the earlier of `request.deadline` and the
    /// provider's own timeout.
    pub async fn invoke(&self, request: &InvokeRequest) -> Result<ProviderReply, WaypointError> {
        let started = Instant::now();
        let deadline = request.deadline.min(started + self.descriptor.timeout);
        let budget = deadline.saturating_duration_since(started);

        match tokio::time::timeout_at(deadline, self.send(request)).await {
            Ok(Err(WaypointError::ProviderTimeout { provider, .. })) => {
                Err(WaypointError::ProviderTimeout {
                    provider,
                    timeout: budget,
                })
            }
            Ok(result) => result,
            Err(_) => Err(WaypointError::ProviderTimeout {
                provider: self.descriptor.name.clone(),
                timeout: budget,
            }),
        }
    }

    async fn send(&self, request: &InvokeRequest) -> Result<ProviderReply, WaypointError> {
        let name = &self.descriptor.name;
        let body = GenerateRequest {
            prompt: &request.prompt,
            max_tokens: request.token_budget,
            model: &self.descriptor.model,
        };

        let response = self
            .client
            .post(&self.descriptor.endpoint)
            .header("x-request-id", &request.request_id)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        debug!(provider = %name, status = %status, "provider response received");

        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ErrorResponse>(&text) {
                Ok(err) => match err.error.type_ {
                    Some(kind) => format!("{kind}: {}", err.error.message),
                    None => err.error.message,
                },
                Err(_) => truncate(&text, 200),
            };
            return Err(WaypointError::Provider {
                provider: name.clone(),
                message,
                status: Some(status.as_u16()),
                source: None,
            });
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| WaypointError::Provider {
                provider: name.clone(),
                message: format!("malformed response body: {e}"),
                status: Some(status.as_u16()),
                source: Some(Box::new(e)),
            })?;

        Ok(ProviderReply {
            text: parsed.text,
            usage: parsed.usage.unwrap_or_default(),
            cost: resolve_cost(parsed.cost, self.descriptor.cost_per_request),
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> WaypointError {
        if e.is_timeout() {
            return WaypointError::ProviderTimeout {
                provider: self.descriptor.name.clone(),
                timeout: self.descriptor.timeout,
            };
        }
        WaypointError::Provider {
            provider: self.descriptor.name.clone(),
            message: format!("HTTP request failed: {e}"),
            status: e.status().map(|s| s.as_u16()),
            source: Some(Box::new(e)),
        }
    }
}

/// Reported cost when it is a sane number, otherwise the static price.
pub fn resolve_cost(reported: Option<f64>, cost_per_request: f64) -> f64 {
    reported
        .filter(|c| c.is_finite() && *c >= 0.0)
        .unwrap_or(cost_per_request)
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
