// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder can collect these metrics.
//! With no recorder installed every call is a no-op.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all Waypoint metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "waypoint_requests_total",
        "Routed requests by outcome (cache_hit, provider, exhausted, deadline, invalid)"
    );
    describe_counter!(
        "waypoint_cache_lookups_total",
        "Cache lookups by result (hit, miss)"
    );
    describe_counter!(
        "waypoint_provider_attempts_total",
        "Provider attempts by provider and outcome"
    );
    describe_gauge!(
        "waypoint_cost_usd_total",
        "Accumulated provider cost in USD"
    );
    describe_gauge!(
        "waypoint_breaker_state",
        "Circuit breaker state per provider (0 closed, 1 half-open, 2 open)"
    );
    describe_histogram!(
        "waypoint_route_latency_seconds",
        "End-to-end routing latency in seconds"
    );
}

/// Record a finished `route` call.
pub fn record_request(outcome: &'static str) {
    metrics::counter!("waypoint_requests_total", "outcome" => outcome).increment(1);
}

/// Record a cache lookup.
pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!("waypoint_cache_lookups_total", "result" => result).increment(1);
}

/// Record one provider attempt (`success`, `timeout`, `error`, `skipped`).
pub fn record_provider_attempt(provider: &str, outcome: &'static str) {
    metrics::counter!(
        "waypoint_provider_attempts_total",
        "provider" => provider.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Add the cost of a served request. Fractional USD, so a gauge.
pub fn record_cost(provider: &str, usd: f64) {
    metrics::gauge!("waypoint_cost_usd_total", "provider" => provider.to_string()).increment(usd);
}

/// Publish a breaker's state.
pub fn set_breaker_state(provider: &str, value: f64) {
    metrics::gauge!("waypoint_breaker_state", "provider" => provider.to_string()).set(value);
}

/// Record routing latency.
pub fn record_route_latency(seconds: f64) {
    metrics::histogram!("waypoint_route_latency_seconds").record(seconds);
}
