// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Waypoint router.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use waypoint_core::{ProviderDescriptor, sort_by_priority};

/// Top-level Waypoint configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WaypointConfig {
    /// HTTP server and request settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Global circuit breaker defaults.
    #[serde(default)]
    pub breaker: BreakerConfig,

    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Prompt complexity classification and token budgets.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Backend providers, in any order; `priority` decides the chain.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// Prometheus metrics settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

impl WaypointConfig {
    /// Provider descriptors sorted into fallback-chain order.
    pub fn provider_chain(&self) -> Vec<ProviderDescriptor> {
        let mut chain: Vec<_> = self.providers.iter().map(ProviderConfig::descriptor).collect();
        sort_by_priority(&mut chain);
        chain
    }

    /// Effective breaker settings for one provider (per-provider overrides win).
    pub fn breaker_for(&self, provider: &ProviderConfig) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: provider
                .failure_threshold
                .unwrap_or(self.breaker.failure_threshold),
            reset_timeout_secs: provider
                .reset_timeout_secs
                .unwrap_or(self.breaker.reset_timeout_secs),
        }
    }
}

/// HTTP server configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Per-request deadline in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Bearer token protecting the cache admin routes. `None` leaves them open.
    #[serde(default)]
    pub admin_token: Option<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("admin_token", &self.admin_token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            request_timeout_secs: default_request_timeout_secs(),
            admin_token: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds an open circuit waits before admitting a trial request.
    #[serde(default = "default_reset_timeout_secs")]
    pub reset_timeout_secs: u64,
}

impl BreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_secs)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_secs: default_reset_timeout_secs(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_reset_timeout_secs() -> u64 {
    60
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// TTL for generated AI responses.
    #[serde(default = "default_ai_response_ttl_secs")]
    pub ai_response_ttl_secs: u64,

    /// TTL for entries loaded through `/cache/warm`.
    #[serde(default = "default_warm_ttl_secs")]
    pub warm_ttl_secs: u64,

    /// Interval of the background expiry sweep.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Upper bound on exact-tier entries.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Optional similarity tier.
    #[serde(default)]
    pub similarity: SimilarityConfig,
}

impl CacheConfig {
    pub fn ai_response_ttl(&self) -> Duration {
        Duration::from_secs(self.ai_response_ttl_secs)
    }

    pub fn warm_ttl(&self) -> Duration {
        Duration::from_secs(self.warm_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ai_response_ttl_secs: default_ai_response_ttl_secs(),
            warm_ttl_secs: default_warm_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_entries: default_max_entries(),
            similarity: SimilarityConfig::default(),
        }
    }
}

fn default_ai_response_ttl_secs() -> u64 {
    3600
}

fn default_warm_ttl_secs() -> u64 {
    86_400
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_max_entries() -> usize {
    10_000
}

/// Similarity ("semantic") cache tier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SimilarityConfig {
    /// Enable the similarity tier. Disabled means exact-match only.
    #[serde(default)]
    pub enabled: bool,

    /// Minimum cosine similarity (0.0-1.0] for a hit.
    #[serde(default = "default_similarity_threshold")]
    pub threshold: f32,

    /// Upper bound on similarity-tier entries.
    #[serde(default = "default_similarity_max_entries")]
    pub max_entries: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: default_similarity_threshold(),
            max_entries: default_similarity_max_entries(),
        }
    }
}

fn default_similarity_threshold() -> f32 {
    0.92
}

fn default_similarity_max_entries() -> usize {
    1000
}

/// Complexity classifier and token budget configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierConfig {
    /// Words that mark a prompt as complex (matched case-insensitively, whole words).
    #[serde(default = "default_complex_keywords")]
    pub complex_keywords: Vec<String>,

    /// Prompts longer than this many characters are complex.
    #[serde(default = "default_complex_length_threshold")]
    pub complex_length_threshold: usize,

    /// Simple prompts up to this many characters get `min_budget`.
    #[serde(default = "default_short_prompt_chars")]
    pub short_prompt_chars: usize,

    /// Budget for short simple prompts.
    #[serde(default = "default_min_budget")]
    pub min_budget: u32,

    /// Budget for longer simple prompts.
    #[serde(default = "default_mid_budget")]
    pub mid_budget: u32,

    /// Budget for complex prompts, and the full configured ceiling.
    #[serde(default = "default_max_budget")]
    pub max_budget: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            complex_keywords: default_complex_keywords(),
            complex_length_threshold: default_complex_length_threshold(),
            short_prompt_chars: default_short_prompt_chars(),
            min_budget: default_min_budget(),
            mid_budget: default_mid_budget(),
            max_budget: default_max_budget(),
        }
    }
}

fn default_complex_keywords() -> Vec<String> {
    [
        "current", "latest", "today", "news", "research", "recent", "trending", "breaking",
        "update", "updates",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_complex_length_threshold() -> usize {
    500
}

fn default_short_prompt_chars() -> usize {
    120
}

fn default_min_budget() -> u32 {
    500
}

fn default_mid_budget() -> u32 {
    1500
}

fn default_max_budget() -> u32 {
    4096
}

/// One backend provider.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Unique provider name.
    pub name: String,

    /// HTTP endpoint URL.
    pub endpoint: String,

    /// Model identifier forwarded to the provider.
    #[serde(default = "default_provider_model")]
    pub model: String,

    /// Static cost per request in USD.
    #[serde(default)]
    pub cost_per_request: f64,

    /// Chain position; lower is tried first. Must be unique.
    pub priority: u32,

    /// Per-call timeout in seconds.
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,

    /// Bearer token for the provider.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Override of `breaker.failure_threshold`.
    #[serde(default)]
    pub failure_threshold: Option<u32>,

    /// Override of `breaker.reset_timeout_secs`.
    #[serde(default)]
    pub reset_timeout_secs: Option<u64>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("cost_per_request", &self.cost_per_request)
            .field("priority", &self.priority)
            .field("timeout_secs", &self.timeout_secs)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("failure_threshold", &self.failure_threshold)
            .field("reset_timeout_secs", &self.reset_timeout_secs)
            .finish()
    }
}

impl ProviderConfig {
    /// Runtime descriptor for this provider.
    pub fn descriptor(&self) -> ProviderDescriptor {
        ProviderDescriptor {
            name: self.name.clone(),
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            cost_per_request: self.cost_per_request,
            priority: self.priority,
            timeout: Duration::from_secs(self.timeout_secs),
            api_key: self.api_key.clone(),
        }
    }
}

fn default_provider_model() -> String {
    "default".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    30
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    /// Install the Prometheus recorder and serve `/metrics`.
    #[serde(default = "default_prometheus_enabled")]
    pub enabled: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: default_prometheus_enabled(),
        }
    }
}

fn default_prometheus_enabled() -> bool {
    true
}
