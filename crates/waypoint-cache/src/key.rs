// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cache key derivation and key pattern matching.
//!
//! Keys look like `ai:{tier}:{budget}:{sha256-hex}`. The readable prefix lets
//! operators invalidate a whole tier or budget with a glob such as
//! `ai:complex:*`; the hash covers the normalized prompt, provider, model and
//! budget.

use sha2::{Digest, Sha256};
use waypoint_core::{ComplexityTier, WaypointError};

/// Namespace prefix for AI response keys.
pub const KEY_NAMESPACE: &str = "ai";

/// Stand-in for provider and model in provider-agnostic keys.
pub const ANY: &str = "*";

/// Trim, lowercase, and collapse runs of whitespace to a single space.
pub fn normalize_prompt(prompt: &str) -> String {
    prompt
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Key for a response produced by a specific provider and model.
pub fn exact_key(
    prompt: &str,
    provider: &str,
    model: &str,
    tier: ComplexityTier,
    token_budget: u32,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_prompt(prompt).as_bytes());
    hasher.update(b"|");
    hasher.update(provider.as_bytes());
    hasher.update(b"|");
    hasher.update(model.as_bytes());
    hasher.update(b"|");
    hasher.update(token_budget.to_string().as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{KEY_NAMESPACE}:{tier}:{token_budget}:{digest}")
}

/// Key probed before any provider is chosen. Depends only on the prompt and
/// its budget, so any provider's answer satisfies it.
pub fn agnostic_key(prompt: &str, tier: ComplexityTier, token_budget: u32) -> String {
    exact_key(prompt, ANY, ANY, tier, token_budget)
}

/// Compiled invalidation pattern.
///
/// Patterns containing glob metacharacters (`*`, `?`, `[`) are matched with
/// `glob::Pattern`; anything else is a literal key prefix.
#[derive(Debug, Clone)]
pub enum KeyMatcher {
    Prefix(String),
    Glob(glob::Pattern),
}

impl KeyMatcher {
    pub fn parse(pattern: &str) -> Result<Self, WaypointError> {
        if pattern.is_empty() {
            return Err(WaypointError::InvalidRequest(
                "invalidation pattern must not be empty".into(),
            ));
        }
        if pattern.contains(['*', '?', '[']) {
            glob::Pattern::new(pattern)
                .map(KeyMatcher::Glob)
                .map_err(|e| {
                    WaypointError::InvalidRequest(format!(
                        "invalid invalidation pattern `{pattern}`: {e}"
                    ))
                })
        } else {
            Ok(KeyMatcher::Prefix(pattern.to_string()))
        }
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyMatcher::Prefix(prefix) => key.starts_with(prefix.as_str()),
            KeyMatcher::Glob(pattern) => pattern.matches(key),
        }
    }
}
