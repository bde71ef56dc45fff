// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde cannot express: distinct provider
//! priorities, sane thresholds, monotonic token budgets.

use std::collections::{HashMap, HashSet};

use crate::diagnostic::ConfigError;
use crate::model::WaypointConfig;

/// Validate a deserialized configuration.
///
/// Collects every violation instead of stopping at the first one.
pub fn validate_config(config: &WaypointConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    validate_server(config, &mut errors);
    validate_breaker(config, &mut errors);
    validate_cache(config, &mut errors);
    validate_classifier(config, &mut errors);
    validate_providers(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_server(config: &WaypointConfig, errors: &mut Vec<ConfigError>) {
    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("server.host must not be empty"));
    } else {
        let is_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_ip && !is_hostname {
            errors.push(ConfigError::validation(format!(
                "server.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }

    if config.server.port == 0 {
        errors.push(ConfigError::validation("server.port must be greater than 0"));
    }

    if config.server.request_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "server.request_timeout_secs must be greater than 0",
        ));
    }
}

fn validate_breaker(config: &WaypointConfig, errors: &mut Vec<ConfigError>) {
    if config.breaker.failure_threshold < 1 {
        errors.push(ConfigError::validation(
            "breaker.failure_threshold must be at least 1",
        ));
    }
}

fn validate_cache(config: &WaypointConfig, errors: &mut Vec<ConfigError>) {
    let cache = &config.cache;
    if cache.sweep_interval_secs == 0 {
        errors.push(ConfigError::validation(
            "cache.sweep_interval_secs must be greater than 0",
        ));
    }
    if cache.max_entries == 0 {
        errors.push(ConfigError::validation(
            "cache.max_entries must be greater than 0",
        ));
    }
    let threshold = cache.similarity.threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        errors.push(ConfigError::validation(format!(
            "cache.similarity.threshold must be in (0, 1], got {threshold}"
        )));
    }
    if cache.similarity.enabled && cache.similarity.max_entries == 0 {
        errors.push(ConfigError::validation(
            "cache.similarity.max_entries must be greater than 0 when enabled",
        ));
    }
}

fn validate_classifier(config: &WaypointConfig, errors: &mut Vec<ConfigError>) {
    let c = &config.classifier;
    if c.min_budget == 0 {
        errors.push(ConfigError::validation(
            "classifier.min_budget must be greater than 0",
        ));
    }
    if c.min_budget > c.mid_budget || c.mid_budget > c.max_budget {
        errors.push(ConfigError::validation(format!(
            "classifier budgets must satisfy min <= mid <= max, got {} / {} / {}",
            c.min_budget, c.mid_budget, c.max_budget
        )));
    }
    if c.complex_length_threshold == 0 {
        errors.push(ConfigError::validation(
            "classifier.complex_length_threshold must be greater than 0",
        ));
    }
    if c.short_prompt_chars == 0 {
        errors.push(ConfigError::validation(
            "classifier.short_prompt_chars must be greater than 0",
        ));
    }
    for (i, keyword) in c.complex_keywords.iter().enumerate() {
        if keyword.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "classifier.complex_keywords[{i}] must not be empty"
            )));
        }
    }
}

fn validate_providers(config: &WaypointConfig, errors: &mut Vec<ConfigError>) {
    let mut seen_names = HashSet::new();
    let mut seen_priorities: HashMap<u32, &str> = HashMap::new();

    for (i, p) in config.providers.iter().enumerate() {
        if p.name.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "providers[{i}].name must not be empty"
            )));
        } else if !seen_names.insert(p.name.as_str()) {
            errors.push(ConfigError::validation(format!(
                "duplicate provider name `{}` in [[providers]] array",
                p.name
            )));
        }

        if let Some(other) = seen_priorities.insert(p.priority, p.name.as_str()) {
            errors.push(ConfigError::validation(format!(
                "providers `{other}` and `{}` share priority {}; priorities must be distinct",
                p.name, p.priority
            )));
        }

        if !(p.endpoint.starts_with("http://") || p.endpoint.starts_with("https://")) {
            errors.push(ConfigError::validation(format!(
                "providers[{i}].endpoint `{}` must be an http:// or https:// URL",
                p.endpoint
            )));
        }

        if p.timeout_secs == 0 {
            errors.push(ConfigError::validation(format!(
                "providers[{i}].timeout_secs must be greater than 0"
            )));
        }

        if !p.cost_per_request.is_finite() || p.cost_per_request < 0.0 {
            errors.push(ConfigError::validation(format!(
                "providers[{i}].cost_per_request must be non-negative, got {}",
                p.cost_per_request
            )));
        }

        if p.failure_threshold == Some(0) {
            errors.push(ConfigError::validation(format!(
                "providers[{i}].failure_threshold must be at least 1"
            )));
        }
    }
}
