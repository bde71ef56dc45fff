// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics for the Waypoint router.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. Metrics are
//! rendered as Prometheus text via [`PrometheusAdapter::render`], which the
//! gateway exposes at `/metrics`.

pub mod recording;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use waypoint_core::WaypointError;

pub use recording::{
    record_cache_lookup, record_cost, record_provider_attempt, record_request,
    record_route_latency, register_metrics, set_breaker_state,
};

/// Installed Prometheus recorder plus the handle used to render it.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Install the Prometheus recorder globally.
    ///
    /// Only one recorder can be installed per process; a second call fails.
    pub fn new() -> Result<Self, WaypointError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            WaypointError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Wrap an existing handle without installing anything.
    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl std::fmt::Debug for PrometheusAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusAdapter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The global recorder can only be installed once per process, so these
    // tests scope a recorder to the current thread instead.
    fn render_with(record: impl FnOnce()) -> String {
        let recorder = PrometheusBuilder::new().build_recorder();
        let adapter = PrometheusAdapter::from_handle(recorder.handle());
        metrics::with_local_recorder(&recorder, || {
            register_metrics();
            record();
        });
        adapter.render()
    }

    #[test]
    fn request_and_cache_counters_render() {
        let text = render_with(|| {
            record_request("cache_hit");
            record_request("cache_hit");
            record_cache_lookup(true);
            record_cache_lookup(false);
        });
        assert!(text.contains(r#"waypoint_requests_total{outcome="cache_hit"} 2"#), "{text}");
        assert!(text.contains(r#"waypoint_cache_lookups_total{result="miss"} 1"#), "{text}");
    }

    #[test]
    fn provider_attempts_are_labelled() {
        let text = render_with(|| {
            record_provider_attempt("openai", "success");
            record_provider_attempt("perplexity", "timeout");
        });
        assert!(text.contains("waypoint_provider_attempts_total"));
        assert!(text.contains(r#"provider="perplexity""#));
        assert!(text.contains(r#"outcome="timeout""#));
    }

    #[test]
    fn cost_accumulates_and_breaker_gauge_sets() {
        let text = render_with(|| {
            record_cost("openai", 0.025);
            record_cost("openai", 0.025);
            set_breaker_state("openai", 2.0);
        });
        assert!(text.contains(r#"waypoint_cost_usd_total{provider="openai"} 0.05"#), "{text}");
        assert!(text.contains(r#"waypoint_breaker_state{provider="openai"} 2"#), "{text}");
    }

    #[test]
    fn latency_histogram_renders() {
        let text = render_with(|| record_route_latency(0.25));
        assert!(text.contains("waypoint_route_latency_seconds"));
    }
}
