// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Waypoint router.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Why a single provider in the fallback chain did not produce a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// Breaker was OPEN (or its HALF_OPEN trial was taken); no network call was made.
    CircuitOpen,
    /// The provider did not answer within its timeout.
    Timeout,
    /// The provider answered with a non-success status or an unusable body.
    Error(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::CircuitOpen => write!(f, "circuit open"),
            FailureReason::Timeout => write!(f, "timeout"),
            FailureReason::Error(msg) => write!(f, "{msg}"),
        }
    }
}

/// One entry of the per-provider failure list carried by [`WaypointError::RoutingExhausted`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderFailure {
    pub provider: String,
    pub reason: FailureReason,
}

/// The primary error type used across the Waypoint crates.
#[derive(Debug, Error)]
pub enum WaypointError {
    /// Configuration errors (invalid values, missing providers).
    #[error("configuration error: {0}")]
    Config(String),

    /// A provider call exceeded its timeout.
    #[error("provider `{provider}` timed out after {timeout:?}")]
    ProviderTimeout { provider: String, timeout: Duration },

    /// A provider returned a non-success response or a malformed body.
    #[error("provider `{provider}` failed: {message}")]
    Provider {
        provider: String,
        message: String,
        status: Option<u16>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Every provider in the chain was skipped or failed.
    #[error("all providers exhausted ({} attempted)", attempts.len())]
    RoutingExhausted { attempts: Vec<ProviderFailure> },

    /// The request's own deadline elapsed before a provider answered.
    #[error("request deadline of {budget:?} exceeded")]
    DeadlineExceeded { budget: Duration },

    /// The cache backend could not be reached.
    #[error("cache unavailable: {message}")]
    CacheUnavailable { message: String },

    /// The inbound request was rejected before routing.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl WaypointError {
    /// Stable snake_case identifier, used as the `error_kind` log field and metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            WaypointError::Config(_) => "config",
            WaypointError::ProviderTimeout { .. } => "provider_timeout",
            WaypointError::Provider { .. } => "provider_error",
            WaypointError::RoutingExhausted { .. } => "routing_exhausted",
            WaypointError::DeadlineExceeded { .. } => "deadline_exceeded",
            WaypointError::CacheUnavailable { .. } => "cache_unavailable",
            WaypointError::InvalidRequest(_) => "invalid_request",
            WaypointError::Internal(_) => "internal",
        }
    }

    /// True for failures the orchestrator recovers from by advancing the chain.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            WaypointError::ProviderTimeout { .. } | WaypointError::Provider { .. }
        )
    }

    /// Convert a provider-level failure into the reason recorded for the chain.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            WaypointError::ProviderTimeout { .. } => FailureReason::Timeout,
            WaypointError::Provider {
                message, status, ..
            } => match status {
                Some(code) => FailureReason::Error(format!("HTTP {code}: {message}")),
                None => FailureReason::Error(message.clone()),
            },
            other => FailureReason::Error(other.to_string()),
        }
    }
}
