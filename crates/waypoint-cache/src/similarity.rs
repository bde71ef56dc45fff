// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Similarity cache tier implementations.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;
use waypoint_core::{CacheScope, ResponsePayload, SimilarityCache};

/// Disabled similarity tier: never matches, stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSimilarityCache;

#[async_trait]
impl SimilarityCache for NoopSimilarityCache {
    fn enabled(&self) -> bool {
        false
    }

    async fn lookup(&self, _prompt: &str, _scope: CacheScope) -> Option<ResponsePayload> {
        None
    }

    async fn store(
        &self,
        _key: &str,
        _prompt: &str,
        _scope: CacheScope,
        _value: ResponsePayload,
        _ttl: Duration,
    ) {
    }

    async fn invalidate(
        &self,
        _matches: &(dyn for<'k> Fn(&'k str) -> bool + Send + Sync),
    ) -> usize {
        0
    }
}

/// Unit-length term-frequency vector over lowercase alphanumeric words.
pub type TermVector = HashMap<String, f32>;

pub fn term_vector(text: &str) -> TermVector {
    let mut counts: TermVector = HashMap::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        *counts.entry(word.to_lowercase()).or_default() += 1.0;
    }
    let norm = counts.values().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in counts.values_mut() {
            *v /= norm;
        }
    }
    counts
}

/// Cosine similarity of two unit vectors (their dot product).
pub fn cosine_similarity(a: &TermVector, b: &TermVector) -> f32 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(term, x)| large.get(term).map(|y| x * y))
        .sum()
}

#[derive(Debug)]
struct SimilarEntry {
    key: String,
    scope: CacheScope,
    vector: TermVector,
    value: ResponsePayload,
    inserted_at: Instant,
    expires_at: Instant,
}

/// Bag-of-words similarity tier.
///
/// Matches a prompt against stored prompts by cosine similarity of their term
/// frequencies. Only entries generated under the same tier and token budget
/// are candidates. Capacity is bounded; the oldest entry goes first.
#[derive(Debug)]
pub struct LexicalSimilarityCache {
    threshold: f32,
    max_entries: usize,
    entries: RwLock<Vec<SimilarEntry>>,
}

impl LexicalSimilarityCache {
    pub fn new(threshold: f32, max_entries: usize) -> Self {
        Self {
            threshold,
            max_entries: max_entries.max(1),
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SimilarityCache for LexicalSimilarityCache {
    fn enabled(&self) -> bool {
        true
    }

    async fn lookup(&self, prompt: &str, scope: CacheScope) -> Option<ResponsePayload> {
        let probe = term_vector(prompt);
        if probe.is_empty() {
            return None;
        }
        let now = Instant::now();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let (score, entry) = entries
            .iter()
            .filter(|e| e.scope == scope && e.expires_at > now)
            .map(|e| (cosine_similarity(&probe, &e.vector), e))
            .max_by(|a, b| a.0.total_cmp(&b.0))?;
        if score >= self.threshold {
            debug!(score, key = %entry.key, "similarity cache hit");
            Some(entry.value.clone())
        } else {
            None
        }
    }

    async fn store(
        &self,
        key: &str,
        prompt: &str,
        scope: CacheScope,
        value: ResponsePayload,
        ttl: Duration,
    ) {
        let vector = term_vector(prompt);
        if vector.is_empty() {
            return;
        }
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|e| e.key != key && e.expires_at > now);
        if entries.len() >= self.max_entries
            && let Some(oldest) = entries
                .iter()
                .enumerate()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(i, _)| i)
        {
            entries.swap_remove(oldest);
        }
        entries.push(SimilarEntry {
            key: key.to_string(),
            scope,
            vector,
            value,
            inserted_at: now,
            expires_at: now + ttl,
        });
    }

    async fn invalidate(
        &self,
        matches: &(dyn for<'k> Fn(&'k str) -> bool + Send + Sync),
    ) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|e| !matches(&e.key));
        before - entries.len()
    }
}
