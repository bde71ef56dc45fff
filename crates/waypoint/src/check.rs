// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `waypoint check`: print the validated provider chain.

use std::fmt::Write as _;

use waypoint_config::WaypointConfig;
use waypoint_config::model::ProviderConfig;

/// Render the fallback chain in the order requests will walk it.
pub fn render_chain(config: &WaypointConfig) -> String {
    let mut out = String::new();
    let providers = sorted_configs(config);
    if providers.is_empty() {
        out.push_str("config ok, but no providers are configured; `waypoint serve` will refuse to start\n");
        return out;
    }

    let _ = writeln!(out, "config ok: {} provider(s) in chain order", providers.len());
    let _ = writeln!(
        out,
        "{:<9} {:<16} {:>10} {:>8} {:>10}  endpoint",
        "priority", "name", "cost_usd", "timeout", "breaker"
    );
    for provider in providers {
        let descriptor = provider.descriptor();
        let breaker = config.breaker_for(provider);
        let _ = writeln!(
            out,
            "{:<9} {:<16} {:>10.4} {:>7}s {:>6}/{:<3}  {}",
            descriptor.priority,
            descriptor.name,
            descriptor.cost_per_request,
            descriptor.timeout.as_secs(),
            breaker.failure_threshold,
            breaker.reset_timeout_secs,
            descriptor.endpoint,
        );
    }
    out
}

fn sorted_configs(config: &WaypointConfig) -> Vec<&ProviderConfig> {
    let mut providers: Vec<_> = config.providers.iter().collect();
    providers.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
    providers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_chain_warns() {
        let config = waypoint_config::load_and_validate_str("").unwrap();
        assert!(render_chain(&config).contains("no providers"));
    }

    #[test]
    fn chain_is_printed_in_priority_order() {
        let config = waypoint_config::load_and_validate_str(
            r#"
            [[providers]]
            name = "gemini"
            endpoint = "https://gemini.example/v1/generate"
            model = "flash"
            cost_per_request = 0.001
            priority = 3

            [[providers]]
            name = "perplexity"
            endpoint = "https://perplexity.example/v1/generate"
            model = "sonar"
            cost_per_request = 0.015
            priority = 1
            failure_threshold = 2
            "#,
        )
        .unwrap();

        let out = render_chain(&config);
        let perplexity = out.find("perplexity").unwrap();
        let gemini = out.find("gemini").unwrap();
        assert!(perplexity < gemini, "{out}");
        assert!(out.contains("2/60"), "{out}");
        assert!(out.contains("5/60"), "{out}");
    }
}
