// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared data model used across the routing, caching, and provider crates.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::time::Instant;

/// Static description of one backend model provider.
///
/// Immutable after startup. Breaker state for the provider lives in the
/// resilience crate, keyed by `name`.
#[derive(Clone, PartialEq)]
pub struct ProviderDescriptor {
    /// Unique provider name (also the breaker key).
    pub name: String,
    /// HTTP endpoint accepting `{prompt, max_tokens}`.
    pub endpoint: String,
    /// Model identifier forwarded to the provider.
    pub model: String,
    /// Static cost in USD, used when the provider reports none.
    pub cost_per_request: f64,
    /// Lower is tried first.
    pub priority: u32,
    /// Hard per-call timeout.
    pub timeout: Duration,
    /// Optional bearer token sent to the provider.
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("cost_per_request", &self.cost_per_request)
            .field("priority", &self.priority)
            .field("timeout", &self.timeout)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Sort descriptors into fallback-chain order.
///
/// Priorities are validated to be distinct at config load; if two ever tie,
/// the name breaks the tie so the order stays deterministic.
pub fn sort_by_priority(providers: &mut [ProviderDescriptor]) {
    providers.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
}

/// Coarse prompt classification used to pick a token budget.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ComplexityTier {
    Simple,
    Complex,
}

/// The classification a cached response was produced under. Cached answers
/// are only reused within the same scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheScope {
    pub tier: ComplexityTier,
    pub token_budget: u32,
}

impl CacheScope {
    pub fn new(tier: ComplexityTier, token_budget: u32) -> Self {
        Self { tier, token_budget }
    }
}

/// Ephemeral per-call context. Never persisted.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub tenant_id: String,
    pub prompt: String,
    /// Caller-supplied ceiling on output tokens.
    pub requested_max_tokens: Option<u32>,
    /// Absolute point after which no further provider attempts are made.
    pub deadline: Instant,
}

impl RequestContext {
    /// Build a context with a fresh deadline `timeout` from now.
    pub fn new(
        request_id: impl Into<String>,
        tenant_id: impl Into<String>,
        prompt: impl Into<String>,
        requested_max_tokens: Option<u32>,
        timeout: Duration,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            tenant_id: tenant_id.into(),
            prompt: prompt.into(),
            requested_max_tokens,
            deadline: Instant::now() + timeout,
        }
    }

    /// Time left before the deadline (zero once elapsed).
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// Token accounting reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

/// A single outbound call handed to a [`ProviderAdapter`](crate::ProviderAdapter).
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    pub request_id: String,
    pub prompt: String,
    pub token_budget: u32,
    /// Attempt deadline: the earlier of the request deadline and the provider timeout.
    pub deadline: Instant,
}

/// What a provider returned for a successful call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReply {
    pub text: String,
    pub usage: TokenUsage,
    /// Actual cost charged in USD.
    pub cost: f64,
}

/// The value stored in the cache for a successful generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePayload {
    pub text: String,
    pub provider: String,
    pub model: String,
    pub cost: f64,
    #[serde(default)]
    pub usage: TokenUsage,
}

/// Token budget metadata returned with every routed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenOptimization {
    pub requested: u32,
    pub used: u32,
    pub saved: u32,
}

impl TokenOptimization {
    pub fn new(requested: u32, used: u32) -> Self {
        Self {
            requested,
            used,
            saved: requested.saturating_sub(used),
        }
    }
}

/// Outcome of a successful `route` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedResponse {
    pub request_id: String,
    pub text: String,
    pub provider: String,
    /// Cost of this call in USD (zero when served from cache).
    pub cost: f64,
    pub cache_hit: bool,
    pub tier: ComplexityTier,
    pub token_optimization: TokenOptimization,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Fully operational.
    Healthy,
    /// Operational but experiencing issues.
    Degraded(String),
    /// Not operational.
    Unhealthy(String),
}
