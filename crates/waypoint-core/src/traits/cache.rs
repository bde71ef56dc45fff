// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exact-match cache backend trait.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::WaypointError;
use crate::types::{HealthStatus, ResponsePayload};

/// Key-value store with per-entry TTL.
///
/// Backends are TTL-agnostic: they honor whatever TTL the caller passes.
/// Any method may return [`WaypointError::CacheUnavailable`]; callers treat
/// that as a miss rather than failing the request.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Backend name for logs and health output.
    fn name(&self) -> &str;

    /// Returns `None` when the key is absent or its TTL has expired.
    async fn get(&self, key: &str) -> Result<Option<ResponsePayload>, WaypointError>;

    /// Upsert; overwrites any existing value and resets its TTL.
    async fn set(
        &self,
        key: &str,
        value: ResponsePayload,
        ttl: Duration,
    ) -> Result<(), WaypointError>;

    /// Remove every key matching a glob pattern. Returns the number removed.
    async fn invalidate(&self, pattern: &str) -> Result<usize, WaypointError>;

    /// Number of live entries.
    async fn len(&self) -> Result<usize, WaypointError>;

    /// Drop expired entries. Returns the number removed.
    async fn purge_expired(&self) -> Result<usize, WaypointError>;

    /// Reachability probe used by `/health`.
    async fn health_check(&self) -> Result<HealthStatus, WaypointError>;
}
