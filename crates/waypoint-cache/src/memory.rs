// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process exact-match cache backend.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;
use waypoint_core::{CacheBackend, HealthStatus, ResponsePayload, WaypointError};

use crate::key::KeyMatcher;

/// Share of capacity evicted at once when the cache is full of live entries.
const EVICTION_DIVISOR: usize = 10;

#[derive(Debug, Clone)]
struct Entry {
    value: ResponsePayload,
    created_at: Instant,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Sharded in-memory cache.
///
/// Each key lives in one `DashMap` shard, so unrelated keys never contend on
/// the same lock. Expired entries are dropped lazily on read and in bulk by
/// [`purge_expired`](CacheBackend::purge_expired).
#[derive(Debug)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
    max_entries: usize,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    fn purge_expired_now(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    /// Make room for one new key: drop expired entries, then the oldest
    /// tenth of the cache. A full cache scans once per batch, not per insert.
    fn make_room(&self) {
        if self.entries.len() < self.max_entries {
            return;
        }
        let purged = self.purge_expired_now();
        if purged > 0 && self.entries.len() < self.max_entries {
            return;
        }

        let batch = (self.max_entries / EVICTION_DIVISOR).max(1);
        let mut by_age: Vec<(Instant, String)> = self
            .entries
            .iter()
            .map(|e| (e.value().created_at, e.key().clone()))
            .collect();
        if by_age.len() > batch {
            by_age.select_nth_unstable(batch - 1);
            by_age.truncate(batch);
        }
        let evicted = by_age
            .iter()
            .filter(|(_, key)| self.entries.remove(key.as_str()).is_some())
            .count();
        debug!(evicted, "cache full, evicted oldest entries");
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<ResponsePayload>, WaypointError> {
        let now = Instant::now();
        let found = self
            .entries
            .get(key)
            .map(|entry| entry.is_live(now).then(|| entry.value.clone()));
        match found {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                self.entries.remove_if(key, |_, entry| !entry.is_live(now));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: ResponsePayload,
        ttl: Duration,
    ) -> Result<(), WaypointError> {
        if !self.entries.contains_key(key) {
            self.make_room();
        }
        let now = Instant::now();
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                created_at: now,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn invalidate(&self, pattern: &str) -> Result<usize, WaypointError> {
        let matcher = KeyMatcher::parse(pattern)?;
        // Collect first so no shard lock is held while removing.
        let doomed: Vec<String> = self
            .entries
            .iter()
            .filter(|e| matcher.matches(e.key()))
            .map(|e| e.key().clone())
            .collect();
        let removed = doomed
            .iter()
            .filter(|key| self.entries.remove(key.as_str()).is_some())
            .count();
        Ok(removed)
    }

    async fn len(&self) -> Result<usize, WaypointError> {
        let now = Instant::now();
        Ok(self.entries.iter().filter(|e| e.is_live(now)).count())
    }

    async fn purge_expired(&self) -> Result<usize, WaypointError> {
        Ok(self.purge_expired_now())
    }

    async fn health_check(&self) -> Result<HealthStatus, WaypointError> {
        Ok(HealthStatus::Healthy)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use waypoint_core::TokenUsage;

    fn payload(text: &str) -> ResponsePayload {
        ResponsePayload {
            text: text.into(),
            provider: "openai".into(),
            model: "gpt".into(),
            cost: 0.025,
            usage: TokenUsage::default(),
        }
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn get_missing_key_is_none() {
        let cache = MemoryCache::default();
        assert_eq!(cache.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_then_get() {
        let cache = MemoryCache::default();
        cache.set("k", payload("hello"), HOUR).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(payload("hello")));
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = MemoryCache::default();
        cache
            .set("k", payload("v"), Duration::from_secs(10))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(cache.get("k").await.unwrap().is_some());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get("k").await.unwrap().is_none());
        assert!(cache.entries.is_empty(), "expired entry dropped on read");
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_resets_ttl() {
        let cache = MemoryCache::default();
        cache
            .set("k", payload("old"), Duration::from_secs(10))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        cache
            .set("k", payload("new"), Duration::from_secs(10))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get("k").await.unwrap(), Some(payload("new")));
    }

    #[tokio::test]
    async fn invalidate_glob_and_prefix() {
        let cache = MemoryCache::default();
        for key in [
            "ai:simple:500:aa",
            "ai:simple:1500:bb",
            "ai:complex:4096:cc",
        ] {
            cache.set(key, payload(key), HOUR).await.unwrap();
        }

        assert_eq!(cache.invalidate("ai:complex:*").await.unwrap(), 1);
        assert_eq!(cache.len().await.unwrap(), 2);

        assert_eq!(cache.invalidate("ai:simple:5").await.unwrap(), 1);
        assert!(cache.get("ai:simple:1500:bb").await.unwrap().is_some());

        assert_eq!(cache.invalidate("nothing*").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn invalidate_rejects_bad_pattern() {
        let cache = MemoryCache::default();
        let err = cache.invalidate("ai:[").await.unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_expired() {
        let cache = MemoryCache::default();
        cache
            .set("short", payload("a"), Duration::from_secs(5))
            .await
            .unwrap();
        cache.set("long", payload("b"), HOUR).await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert_eq!(cache.len().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn full_cache_evicts_oldest() {
        let cache = MemoryCache::new(2);
        cache.set("a", payload("a"), HOUR).await.unwrap();
        tokio::time::advance(Duration::from_millis(1)).await;
        cache.set("b", payload("b"), HOUR).await.unwrap();
        tokio::time::advance(Duration::from_millis(1)).await;
        cache.set("c", payload("c"), HOUR).await.unwrap();

        assert!(cache.get("a").await.unwrap().is_none());
        assert!(cache.get("b").await.unwrap().is_some());
        assert!(cache.get("c").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn full_cache_evicts_a_batch_then_fills_without_scanning() {
        let cache = MemoryCache::new(20);
        for i in 0..20 {
            cache.set(&format!("k{i:02}"), payload("v"), HOUR).await.unwrap();
            tokio::time::advance(Duration::from_millis(1)).await;
        }

        cache.set("k20", payload("v"), HOUR).await.unwrap();
        assert_eq!(cache.entries.len(), 19);
        assert!(!cache.entries.contains_key("k00"));
        assert!(!cache.entries.contains_key("k01"));
        assert!(cache.entries.contains_key("k02"));

        cache.set("k21", payload("v"), HOUR).await.unwrap();
        assert_eq!(cache.entries.len(), 20);
        assert!(cache.entries.contains_key("k02"));
    }

    #[tokio::test(start_paused = true)]
    async fn full_cache_prefers_purging_expired() {
        let cache = MemoryCache::new(2);
        cache.set("old", payload("a"), HOUR).await.unwrap();
        cache
            .set("stale", payload("b"), Duration::from_secs(1))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        cache.set("new", payload("c"), HOUR).await.unwrap();

        assert!(cache.get("old").await.unwrap().is_some());
        assert!(cache.get("new").await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_to_one_key_leave_a_whole_value() {
        let cache = Arc::new(MemoryCache::default());
        let writers = (0..32).map(|i| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .set("shared", payload(&format!("v{i}")), HOUR)
                    .await
                    .unwrap();
            })
        });
        futures::future::join_all(writers).await;

        let value = cache.get("shared").await.unwrap().unwrap();
        assert!(value.text.starts_with('v'));
        assert_eq!(value.provider, "openai");
        assert_eq!(cache.len().await.unwrap(), 1);
    }
}
