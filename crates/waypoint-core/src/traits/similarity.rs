// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Optional similarity ("semantic") cache tier.

use std::time::Duration;

use async_trait::async_trait;

use crate::types::{CacheScope, ResponsePayload};

/// A cache tier that matches prompts by similarity rather than exact key.
///
/// Consulted before the exact tier. A disabled implementation answers every
/// lookup with `None`, so callers never branch on whether the tier exists.
#[async_trait]
pub trait SimilarityCache: Send + Sync {
    /// Whether this tier is active.
    fn enabled(&self) -> bool;

    /// Find a stored response for a prompt similar enough to `prompt`,
    /// generated under the same tier and token budget.
    async fn lookup(&self, prompt: &str, scope: CacheScope) -> Option<ResponsePayload>;

    /// Remember `value` for `prompt`. `key` is the exact-tier key of the same
    /// entry, kept so pattern invalidation reaches both tiers.
    async fn store(
        &self,
        key: &str,
        prompt: &str,
        scope: CacheScope,
        value: ResponsePayload,
        ttl: Duration,
    );

    /// Remove entries whose exact-tier key satisfies `matches`.
    async fn invalidate(&self, matches: &(dyn for<'k> Fn(&'k str) -> bool + Send + Sync)) -> usize;
}
