// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two-tier cache facade used by the orchestrator.
//!
//! `CacheStore` owns an exact-match [`CacheBackend`] and a [`SimilarityCache`]
//! (possibly the no-op tier). Backend failures never escape as request
//! errors: they are logged, recorded as unavailability for `/health`, and
//! treated as misses.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::warn;
use waypoint_core::{
    CacheBackend, CacheScope, HealthStatus, ResponsePayload, SimilarityCache, WaypointError,
};

use crate::key::KeyMatcher;
use crate::similarity::NoopSimilarityCache;

/// Which tier answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    Similarity,
    Exact,
}

/// Hit/miss counters plus the live entry count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hit_count: u64,
    pub miss_count: u64,
    pub entry_count: usize,
    pub similarity_hit_count: u64,
}

/// Cache reachability as reported by `/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheHealth {
    pub reachable: bool,
    pub similarity_enabled: bool,
    pub entries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    similarity: Arc<dyn SimilarityCache>,
    hits: AtomicU64,
    misses: AtomicU64,
    similarity_hits: AtomicU64,
    unavailable: AtomicBool,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("backend", &self.backend.name())
            .field("similarity_enabled", &self.similarity.enabled())
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish()
    }
}

impl CacheStore {
    /// Exact tier only.
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self::with_similarity(backend, Arc::new(NoopSimilarityCache))
    }

    pub fn with_similarity(
        backend: Arc<dyn CacheBackend>,
        similarity: Arc<dyn SimilarityCache>,
    ) -> Self {
        Self {
            backend,
            similarity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            similarity_hits: AtomicU64::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn similarity_enabled(&self) -> bool {
        self.similarity.enabled()
    }

    fn note_backend_error(&self, op: &str, key: &str, err: &WaypointError) {
        self.unavailable.store(true, Ordering::Relaxed);
        warn!(op, key, error_kind = err.kind(), error = %err, "cache backend error, degrading to miss");
    }

    fn note_backend_ok(&self) {
        self.unavailable.store(false, Ordering::Relaxed);
    }

    /// Exact-tier lookup. Expired or absent keys, and backend errors, are misses.
    pub async fn get(&self, key: &str) -> Option<ResponsePayload> {
        let found = match self.backend.get(key).await {
            Ok(found) => {
                self.note_backend_ok();
                found
            }
            Err(e) => {
                self.note_backend_error("get", key, &e);
                None
            }
        };
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Upsert into the exact tier. Returns whether the write landed.
    pub async fn set(&self, key: &str, value: ResponsePayload, ttl: Duration) -> bool {
        match self.backend.set(key, value, ttl).await {
            Ok(()) => {
                self.note_backend_ok();
                true
            }
            Err(e) => {
                self.note_backend_error("set", key, &e);
                false
            }
        }
    }

    /// Consult the similarity tier, then the exact tier. Counts one hit or
    /// one miss per call.
    pub async fn lookup(
        &self,
        key: &str,
        prompt: &str,
        scope: CacheScope,
    ) -> Option<(ResponsePayload, CacheTier)> {
        if self.similarity.enabled()
            && let Some(value) = self.similarity.lookup(prompt, scope).await
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            self.similarity_hits.fetch_add(1, Ordering::Relaxed);
            return Some((value, CacheTier::Similarity));
        }
        self.get(key).await.map(|v| (v, CacheTier::Exact))
    }

    /// Write to both tiers.
    pub async fn store(
        &self,
        key: &str,
        prompt: &str,
        scope: CacheScope,
        value: ResponsePayload,
        ttl: Duration,
    ) -> bool {
        if self.similarity.enabled() {
            self.similarity
                .store(key, prompt, scope, value.clone(), ttl)
                .await;
        }
        self.set(key, value, ttl).await
    }

    /// Remove every key matching `pattern` from both tiers.
    ///
    /// Returns the number of exact-tier keys removed. A malformed pattern is
    /// an [`InvalidRequest`](WaypointError::InvalidRequest); an unreachable
    /// backend is reported as [`CacheUnavailable`](WaypointError::CacheUnavailable).
    pub async fn invalidate(&self, pattern: &str) -> Result<usize, WaypointError> {
        let matcher = KeyMatcher::parse(pattern)?;
        self.similarity
            .invalidate(&|key: &str| matcher.matches(key))
            .await;
        match self.backend.invalidate(pattern).await {
            Ok(removed) => {
                self.note_backend_ok();
                Ok(removed)
            }
            Err(WaypointError::InvalidRequest(msg)) => Err(WaypointError::InvalidRequest(msg)),
            Err(e) => {
                self.note_backend_error("invalidate", pattern, &e);
                Err(WaypointError::CacheUnavailable {
                    message: e.to_string(),
                })
            }
        }
    }

    /// Drop expired exact-tier entries. Errors count as zero purged.
    pub async fn purge_expired(&self) -> usize {
        match self.backend.purge_expired().await {
            Ok(n) => n,
            Err(e) => {
                self.note_backend_error("purge", "*", &e);
                0
            }
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let entry_count = match self.backend.len().await {
            Ok(n) => n,
            Err(e) => {
                self.note_backend_error("len", "*", &e);
                0
            }
        };
        CacheStats {
            hit_count: self.hits.load(Ordering::Relaxed),
            miss_count: self.misses.load(Ordering::Relaxed),
            entry_count,
            similarity_hit_count: self.similarity_hits.load(Ordering::Relaxed),
        }
    }

    /// Probe the backend and report reachability.
    ///
    /// A backend that answers but recently failed an operation is still
    /// reported reachable; the probe result wins.
    pub async fn health(&self) -> CacheHealth {
        let similarity_enabled = self.similarity.enabled();
        let probe = self.backend.health_check().await;
        let (reachable, detail) = match probe {
            Ok(HealthStatus::Healthy) => (true, None),
            Ok(HealthStatus::Degraded(why)) => (true, Some(why)),
            Ok(HealthStatus::Unhealthy(why)) => (false, Some(why)),
            Err(e) => (false, Some(e.to_string())),
        };
        if reachable {
            self.note_backend_ok();
        } else {
            self.unavailable.store(true, Ordering::Relaxed);
        }
        let entries = if reachable {
            self.backend.len().await.unwrap_or(0)
        } else {
            0
        };
        CacheHealth {
            reachable,
            similarity_enabled,
            entries,
            detail,
        }
    }

    /// Whether the most recent backend operation failed.
    pub fn is_degraded(&self) -> bool {
        self.unavailable.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use waypoint_core::{ComplexityTier, TokenUsage};

    use super::*;
    use crate::memory::MemoryCache;
    use crate::similarity::LexicalSimilarityCache;

    const HOUR: Duration = Duration::from_secs(3600);
    const SIMPLE: CacheScope = CacheScope {
        tier: ComplexityTier::Simple,
        token_budget: 500,
    };
    const COMPLEX: CacheScope = CacheScope {
        tier: ComplexityTier::Complex,
        token_budget: 4096,
    };

    fn payload(text: &str) -> ResponsePayload {
        ResponsePayload {
            text: text.into(),
            provider: "openai".into(),
            model: "gpt".into(),
            cost: 0.025,
            usage: TokenUsage::default(),
        }
    }

    struct DownBackend;

    #[async_trait]
    impl CacheBackend for DownBackend {
        fn name(&self) -> &str {
            "down"
        }
        async fn get(&self, _key: &str) -> Result<Option<ResponsePayload>, WaypointError> {
            Err(unavailable())
        }
        async fn set(
            &self,
            _key: &str,
            _value: ResponsePayload,
            _ttl: Duration,
        ) -> Result<(), WaypointError> {
            Err(unavailable())
        }
        async fn invalidate(&self, _pattern: &str) -> Result<usize, WaypointError> {
            Err(unavailable())
        }
        async fn len(&self) -> Result<usize, WaypointError> {
            Err(unavailable())
        }
        async fn purge_expired(&self) -> Result<usize, WaypointError> {
            Err(unavailable())
        }
        async fn health_check(&self) -> Result<HealthStatus, WaypointError> {
            Ok(HealthStatus::Unhealthy("connection refused".into()))
        }
    }

    fn unavailable() -> WaypointError {
        WaypointError::CacheUnavailable {
            message: "connection refused".into(),
        }
    }

    fn memory_store() -> CacheStore {
        CacheStore::new(Arc::new(MemoryCache::default()))
    }

    #[tokio::test]
    async fn stats_count_hits_and_misses() {
        let store = memory_store();
        assert!(store.get("k").await.is_none());
        store.set("k", payload("v"), HOUR).await;
        assert!(store.get("k").await.is_some());
        assert!(store.get("k").await.is_some());

        let stats = store.stats().await;
        assert_eq!(stats.hit_count, 2);
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.entry_count, 1);
    }

    #[tokio::test]
    async fn stats_serialize_camel_case() {
        let store = memory_store();
        let json = serde_json::to_value(store.stats().await).unwrap();
        assert_eq!(json["hitCount"], 0);
        assert_eq!(json["missCount"], 0);
        assert_eq!(json["entryCount"], 0);
    }

    #[tokio::test]
    async fn disabled_similarity_falls_through_to_exact() {
        let store = memory_store();
        assert!(!store.similarity_enabled());
        store.store("k", "what is seo", SIMPLE, payload("v"), HOUR).await;
        let (value, tier) = store.lookup("k", "what is seo", SIMPLE).await.unwrap();
        assert_eq!(value.text, "v");
        assert_eq!(tier, CacheTier::Exact);
        assert!(store.lookup("other", "what is seo", SIMPLE).await.is_none());
    }

    #[tokio::test]
    async fn similarity_tier_answers_first() {
        let store = CacheStore::with_similarity(
            Arc::new(MemoryCache::default()),
            Arc::new(LexicalSimilarityCache::new(0.9, 100)),
        );
        store
            .store("k1", "latest stock market trends", COMPLEX, payload("v"), HOUR)
            .await;
        let (value, tier) = store
            .lookup("k2", "Latest stock market trends!", COMPLEX)
            .await
            .unwrap();
        assert_eq!(value.text, "v");
        assert_eq!(tier, CacheTier::Similarity);
        assert_eq!(store.stats().await.similarity_hit_count, 1);
    }

    #[tokio::test]
    async fn invalidate_reaches_both_tiers() {
        let store = CacheStore::with_similarity(
            Arc::new(MemoryCache::default()),
            Arc::new(LexicalSimilarityCache::new(0.9, 100)),
        );
        store
            .store("ai:complex:4096:x", "latest news", COMPLEX, payload("v"), HOUR)
            .await;
        assert_eq!(store.invalidate("ai:complex:*").await.unwrap(), 1);
        assert!(store.lookup("ai:complex:4096:x", "latest news", COMPLEX).await.is_none());
    }

    #[tokio::test]
    async fn invalid_pattern_is_rejected() {
        let store = memory_store();
        let err = store.invalidate("[").await.unwrap_err();
        assert!(matches!(err, WaypointError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn unavailable_backend_degrades_to_miss() {
        let store = CacheStore::new(Arc::new(DownBackend));
        assert!(store.get("k").await.is_none());
        assert!(!store.set("k", payload("v"), HOUR).await);
        assert!(store.is_degraded());
        assert_eq!(store.stats().await.miss_count, 1);
        assert_eq!(store.purge_expired().await, 0);

        let err = store.invalidate("ai:*").await.unwrap_err();
        assert!(matches!(err, WaypointError::CacheUnavailable { .. }));
    }

    #[tokio::test]
    async fn health_reports_reachability() {
        let healthy = memory_store();
        healthy.set("k", payload("v"), HOUR).await;
        let report = healthy.health().await;
        assert!(report.reachable);
        assert_eq!(report.entries, 1);
        assert!(!report.similarity_enabled);

        let down = CacheStore::new(Arc::new(DownBackend));
        let report = down.health().await;
        assert!(!report.reachable);
        assert_eq!(report.detail.as_deref(), Some("connection refused"));
    }
}
