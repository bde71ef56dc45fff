// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end request routing.
//!
//! Flow per request: validate, classify, probe the cache, then walk the
//! priority-ordered provider chain. Each provider's breaker is consulted
//! immediately before its attempt; OPEN breakers are skipped without I/O.
//! The first success is cached and returned. If every provider is skipped
//! or fails, the caller gets [`WaypointError::RoutingExhausted`] with one
//! reason per provider.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use strum::Display;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use waypoint_cache::{CacheHealth, CacheStats, CacheStore, agnostic_key, normalize_prompt};
use waypoint_config::WaypointConfig;
use waypoint_core::{
    CacheScope, FailureReason, InvokeRequest, ProviderAdapter, ProviderDescriptor, ProviderFailure,
    ProviderReply, RequestContext, ResponsePayload, RoutedResponse, TokenOptimization, TokenUsage,
    WaypointError, sort_by_priority,
};
use waypoint_prometheus as metrics;
use waypoint_resilience::{BreakerRegistry, BreakerSettings, CircuitState};

use crate::classifier::{Classification, ComplexityClassifier};

/// Provider name recorded on entries written by [`Orchestrator::warm`].
pub const WARM_PROVIDER: &str = "cache-warm";

/// TTLs applied to cache writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    /// Responses produced by a provider.
    pub response: Duration,
    /// Entries loaded through `warm`.
    pub warm: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            response: Duration::from_secs(3600),
            warm: Duration::from_secs(86_400),
        }
    }
}

/// One `(prompt, expected response)` pair for [`Orchestrator::warm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmEntry {
    pub prompt: String,
    pub response: String,
}

/// Overall service status for `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealth {
    pub name: String,
    pub priority: u32,
    pub state: CircuitState,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterHealth {
    pub status: ServiceStatus,
    pub providers: Vec<ProviderHealth>,
    pub cache: CacheHealth,
}

/// The routing aggregate: one breaker registry, one cache store, one
/// provider adapter, shared by every request it serves.
///
/// Independent instances share nothing, so tests can build as many as they
/// like.
pub struct Orchestrator {
    providers: Vec<ProviderDescriptor>,
    breakers: BreakerRegistry,
    cache: CacheStore,
    adapter: Arc<dyn ProviderAdapter>,
    classifier: ComplexityClassifier,
    ttls: CacheTtls,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("providers", &self.providers)
            .field("breakers", &self.breakers)
            .field("cache", &self.cache)
            .field("classifier", &self.classifier)
            .field("ttls", &self.ttls)
            .finish_non_exhaustive()
    }
}

/// What happened to one attempt, after the breaker has been settled.
enum Attempt {
    Served(ProviderReply),
    Failed(FailureReason),
    DeadlineCut,
}

impl Orchestrator {
    /// Assemble an orchestrator from parts.
    ///
    /// Providers are sorted into chain order. Every provider must have a
    /// breaker in `breakers`; one without is never attempted.
    pub fn new(
        mut providers: Vec<ProviderDescriptor>,
        breakers: BreakerRegistry,
        cache: CacheStore,
        adapter: Arc<dyn ProviderAdapter>,
        classifier: ComplexityClassifier,
        ttls: CacheTtls,
    ) -> Self {
        sort_by_priority(&mut providers);
        let orchestrator = Self {
            providers,
            breakers,
            cache,
            adapter,
            classifier,
            ttls,
        };
        orchestrator.publish_breaker_states();
        orchestrator
    }

    /// Build breakers, classifier, and TTLs from configuration.
    pub fn from_config(
        config: &WaypointConfig,
        adapter: Arc<dyn ProviderAdapter>,
        cache: CacheStore,
    ) -> Self {
        let breakers = config
            .providers
            .iter()
            .map(|p| {
                let b = config.breaker_for(p);
                (
                    p.name.clone(),
                    BreakerSettings {
                        failure_threshold: b.failure_threshold,
                        reset_timeout: b.reset_timeout(),
                    },
                )
            })
            .collect();
        Self::new(
            config.provider_chain(),
            breakers,
            cache,
            adapter,
            ComplexityClassifier::new(&config.classifier),
            CacheTtls {
                response: config.cache.ai_response_ttl(),
                warm: config.cache.warm_ttl(),
            },
        )
    }

    /// Providers in chain order.
    pub fn providers(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    pub fn classifier(&self) -> &ComplexityClassifier {
        &self.classifier
    }

    /// Route one request.
    pub async fn route(&self, ctx: RequestContext) -> Result<RoutedResponse, WaypointError> {
        let started = Instant::now();
        let result = self.route_inner(&ctx, started).await;

        metrics::record_route_latency(started.elapsed().as_secs_f64());
        let outcome = match &result {
            Ok(r) if r.cache_hit => "cache_hit",
            Ok(_) => "provider",
            Err(WaypointError::RoutingExhausted { .. }) => "exhausted",
            Err(WaypointError::DeadlineExceeded { .. }) => "deadline",
            Err(WaypointError::InvalidRequest(_)) => "invalid",
            Err(_) => "error",
        };
        metrics::record_request(outcome);

        if let Err(e) = &result {
            warn!(
                request_id = %ctx.request_id,
                tenant_id = %ctx.tenant_id,
                error_kind = e.kind(),
                error = %e,
                "request failed"
            );
        }
        result
    }

    async fn route_inner(
        &self,
        ctx: &RequestContext,
        started: Instant,
    ) -> Result<RoutedResponse, WaypointError> {
        if ctx.prompt.trim().is_empty() {
            return Err(WaypointError::InvalidRequest(
                "prompt must not be empty".into(),
            ));
        }
        if ctx.requested_max_tokens == Some(0) {
            return Err(WaypointError::InvalidRequest(
                "maxTokens must be greater than 0".into(),
            ));
        }

        let classification = self.classify(&ctx.prompt);
        let token_budget = effective_budget(&classification, ctx.requested_max_tokens);
        let optimization = TokenOptimization::new(
            ctx.requested_max_tokens
                .unwrap_or(self.classifier.max_budget()),
            token_budget,
        );
        let key = agnostic_key(&ctx.prompt, classification.tier, token_budget);
        let scope = CacheScope::new(classification.tier, token_budget);

        debug!(
            request_id = %ctx.request_id,
            tier = %classification.tier,
            token_budget,
            reason = classification.reason,
            "prompt classified"
        );

        if let Some((payload, cache_tier)) =
            self.cache.lookup(&key, &ctx.prompt, scope).await
        {
            metrics::record_cache_lookup(true);
            info!(
                request_id = %ctx.request_id,
                tenant_id = %ctx.tenant_id,
                provider = %payload.provider,
                cache_tier = ?cache_tier,
                "served from cache"
            );
            return Ok(RoutedResponse {
                request_id: ctx.request_id.clone(),
                text: payload.text,
                provider: payload.provider,
                cost: 0.0,
                cache_hit: true,
                tier: classification.tier,
                token_optimization: optimization,
            });
        }
        metrics::record_cache_lookup(false);

        let mut attempts = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            if ctx.remaining().is_zero() {
                return Err(deadline_exceeded(started));
            }

            match self.attempt(ctx, provider, token_budget).await {
                Attempt::Served(reply) => {
                    let payload = ResponsePayload {
                        text: reply.text,
                        provider: provider.name.clone(),
                        model: provider.model.clone(),
                        cost: reply.cost,
                        usage: reply.usage,
                    };
                    self.cache
                        .store(
                            &key,
                            &ctx.prompt,
                            scope,
                            payload.clone(),
                            self.ttls.response,
                        )
                        .await;
                    metrics::record_cost(&provider.name, reply.cost);
                    info!(
                        request_id = %ctx.request_id,
                        tenant_id = %ctx.tenant_id,
                        provider = %provider.name,
                        tier = %classification.tier,
                        token_budget,
                        cost = reply.cost,
                        attempts = attempts.len() + 1,
                        "request served by provider"
                    );
                    return Ok(RoutedResponse {
                        request_id: ctx.request_id.clone(),
                        text: payload.text,
                        provider: payload.provider,
                        cost: payload.cost,
                        cache_hit: false,
                        tier: classification.tier,
                        token_optimization: optimization,
                    });
                }
                Attempt::Failed(reason) => attempts.push(ProviderFailure {
                    provider: provider.name.clone(),
                    reason,
                }),
                Attempt::DeadlineCut => return Err(deadline_exceeded(started)),
            }
        }

        Err(WaypointError::RoutingExhausted { attempts })
    }

    /// Try one provider, settling its breaker before returning.
    async fn attempt(
        &self,
        ctx: &RequestContext,
        provider: &ProviderDescriptor,
        token_budget: u32,
    ) -> Attempt {
        let Some(admission) = self.breakers.admit(&provider.name) else {
            debug!(
                request_id = %ctx.request_id,
                provider = %provider.name,
                "circuit open, skipping provider"
            );
            metrics::record_provider_attempt(&provider.name, "skipped");
            return Attempt::Failed(FailureReason::CircuitOpen);
        };

        let now = Instant::now();
        let own_deadline = now + provider.timeout;
        let deadline_binds = ctx.deadline <= own_deadline;
        let attempt_deadline = if deadline_binds {
            ctx.deadline
        } else {
            own_deadline
        };
        let request = InvokeRequest {
            request_id: ctx.request_id.clone(),
            prompt: ctx.prompt.clone(),
            token_budget,
            deadline: attempt_deadline,
        };

        // If this future is dropped mid-call, the admission's Drop releases
        // any HALF_OPEN trial it holds.
        let outcome = tokio::time::timeout_at(
            attempt_deadline,
            self.adapter.invoke(provider, &request),
        )
        .await
        .unwrap_or_else(|_| {
            Err(WaypointError::ProviderTimeout {
                provider: provider.name.clone(),
                timeout: attempt_deadline.saturating_duration_since(now),
            })
        });

        match outcome {
            Ok(reply) => {
                let state = admission.succeed();
                metrics::set_breaker_state(&provider.name, state.as_gauge());
                metrics::record_provider_attempt(&provider.name, "success");
                Attempt::Served(reply)
            }
            Err(e @ WaypointError::ProviderTimeout { .. })
                if deadline_binds && ctx.remaining().is_zero() =>
            {
                // The request ran out of time, not the provider.
                admission.abandon();
                metrics::record_provider_attempt(&provider.name, "deadline");
                debug!(
                    request_id = %ctx.request_id,
                    provider = %provider.name,
                    error = %e,
                    "request deadline reached during provider call"
                );
                Attempt::DeadlineCut
            }
            Err(e) if e.is_provider_failure() => {
                let state = admission.fail();
                metrics::set_breaker_state(&provider.name, state.as_gauge());
                let label = if matches!(e, WaypointError::ProviderTimeout { .. }) {
                    "timeout"
                } else {
                    "error"
                };
                metrics::record_provider_attempt(&provider.name, label);
                warn!(
                    request_id = %ctx.request_id,
                    tenant_id = %ctx.tenant_id,
                    provider = %provider.name,
                    error_kind = e.kind(),
                    error = %e,
                    breaker = %state,
                    "provider attempt failed, trying next provider"
                );
                Attempt::Failed(e.failure_reason())
            }
            Err(e) => {
                // Not the provider's fault; leave its breaker alone.
                admission.abandon();
                metrics::record_provider_attempt(&provider.name, "error");
                warn!(
                    request_id = %ctx.request_id,
                    provider = %provider.name,
                    error_kind = e.kind(),
                    error = %e,
                    "provider attempt aborted"
                );
                Attempt::Failed(FailureReason::Error(e.to_string()))
            }
        }
    }

    /// Classify the prompt as the cache key sees it, so prompts that share a
    /// key always share a tier and budget.
    fn classify(&self, prompt: &str) -> Classification {
        self.classifier.classify(&normalize_prompt(prompt))
    }

    /// Pre-populate the cache under the keys `route` would probe.
    ///
    /// Every prompt is validated before anything is written. Returns the
    /// number of entries stored.
    pub async fn warm(&self, entries: Vec<WarmEntry>) -> Result<usize, WaypointError> {
        if let Some(i) = entries.iter().position(|e| e.prompt.trim().is_empty()) {
            return Err(WaypointError::InvalidRequest(format!(
                "entries[{i}].prompt must not be empty"
            )));
        }

        let mut stored = 0;
        for entry in entries {
            let classification = self.classify(&entry.prompt);
            let key = agnostic_key(
                &entry.prompt,
                classification.tier,
                classification.token_budget,
            );
            let payload = ResponsePayload {
                text: entry.response,
                provider: WARM_PROVIDER.to_string(),
                model: WARM_PROVIDER.to_string(),
                cost: 0.0,
                usage: TokenUsage::default(),
            };
            if self
                .cache
                .store(
                    &key,
                    &entry.prompt,
                    CacheScope::new(classification.tier, classification.token_budget),
                    payload,
                    self.ttls.warm,
                )
                .await
            {
                stored += 1;
            }
        }
        info!(stored, "cache warmed");
        Ok(stored)
    }

    /// Remove cached responses whose keys match `pattern`.
    pub async fn invalidate(&self, pattern: &str) -> Result<usize, WaypointError> {
        let removed = self.cache.invalidate(pattern).await?;
        info!(pattern, removed, "cache invalidated");
        Ok(removed)
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Drop expired cache entries; used by the periodic sweeper.
    pub async fn purge_expired(&self) -> usize {
        self.cache.purge_expired().await
    }

    /// Breaker states and cache reachability.
    pub async fn health(&self) -> RouterHealth {
        let providers: Vec<ProviderHealth> = self
            .providers
            .iter()
            .filter_map(|p| {
                let breaker = self.breakers.get(&p.name)?;
                let snapshot = breaker.snapshot();
                Some(ProviderHealth {
                    name: p.name.clone(),
                    priority: p.priority,
                    state: snapshot.state,
                    consecutive_failures: snapshot.consecutive_failures,
                })
            })
            .collect();
        self.publish_breaker_states();

        let cache = self.cache.health().await;
        let status = if self.breakers.all_open() {
            ServiceStatus::Unhealthy
        } else if !cache.reachable || providers.iter().any(|p| p.state != CircuitState::Closed)
        {
            ServiceStatus::Degraded
        } else {
            ServiceStatus::Healthy
        };

        RouterHealth {
            status,
            providers,
            cache,
        }
    }

    fn publish_breaker_states(&self) {
        for snapshot in self.breakers.snapshots() {
            metrics::set_breaker_state(&snapshot.name, snapshot.state.as_gauge());
        }
    }
}

/// Classifier budget, capped by the caller's `maxTokens` when given.
fn effective_budget(classification: &Classification, requested: Option<u32>) -> u32 {
    requested.map_or(classification.token_budget, |r| {
        r.min(classification.token_budget)
    })
}

fn deadline_exceeded(started: Instant) -> WaypointError {
    WaypointError::DeadlineExceeded {
        budget: started.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use waypoint_cache::{LexicalSimilarityCache, MemoryCache};
    use waypoint_core::ComplexityTier;

    use super::*;

    #[derive(Debug, Clone)]
    enum Step {
        Reply(&'static str),
        Status(u16),
        Hang,
    }

    /// Adapter that plays back a per-provider script and logs calls.
    #[derive(Default)]
    struct Scripted {
        scripts: Mutex<HashMap<String, VecDeque<Step>>>,
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn with(steps: &[(&str, Step)]) -> Arc<Self> {
            let s = Self::default();
            {
                let mut scripts = s.scripts.lock().unwrap();
                for (name, step) in steps {
                    scripts
                        .entry(name.to_string())
                        .or_default()
                        .push_back(step.clone());
                }
            }
            Arc::new(s)
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProviderAdapter for Scripted {
        async fn invoke(
            &self,
            provider: &ProviderDescriptor,
            _request: &InvokeRequest,
        ) -> Result<ProviderReply, WaypointError> {
            self.calls.lock().unwrap().push(provider.name.clone());
            let step = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(&provider.name)
                .and_then(VecDeque::pop_front)
                .unwrap_or(Step::Status(500));
            match step {
                Step::Reply(text) => Ok(ProviderReply {
                    text: text.into(),
                    usage: TokenUsage::default(),
                    cost: provider.cost_per_request,
                }),
                Step::Status(code) => Err(WaypointError::Provider {
                    provider: provider.name.clone(),
                    message: "scripted failure".into(),
                    status: Some(code),
                    source: None,
                }),
                Step::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!("hang is always cut by a timeout")
                }
            }
        }
    }

    fn descriptor(name: &str, priority: u32, cost: f64) -> ProviderDescriptor {
        ProviderDescriptor {
            name: name.into(),
            endpoint: format!("http://{name}.test/generate"),
            model: format!("{name}-model"),
            cost_per_request: cost,
            priority,
            timeout: Duration::from_secs(5),
            api_key: None,
        }
    }

    fn three_providers() -> Vec<ProviderDescriptor> {
        vec![
            descriptor("gemini", 3, 0.001),
            descriptor("perplexity", 1, 0.015),
            descriptor("openai", 2, 0.025),
        ]
    }

    fn build(adapter: Arc<Scripted>, threshold: u32) -> Orchestrator {
        let providers = three_providers();
        let breakers = providers
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    BreakerSettings {
                        failure_threshold: threshold,
                        reset_timeout: Duration::from_secs(60),
                    },
                )
            })
            .collect();
        Orchestrator::new(
            providers,
            breakers,
            CacheStore::new(Arc::new(MemoryCache::default())),
            adapter,
            ComplexityClassifier::default(),
            CacheTtls::default(),
        )
    }

    fn ctx(prompt: &str) -> RequestContext {
        RequestContext::new("req-1", "tenant-a", prompt, None, Duration::from_secs(30))
    }

    #[test]
    fn providers_are_sorted_by_priority() {
        let o = build(Scripted::with(&[]), 5);
        let names: Vec<_> = o.providers().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["perplexity", "openai", "gemini"]);
    }

    #[tokio::test]
    async fn second_identical_request_is_a_cache_hit() {
        let adapter = Scripted::with(&[("perplexity", Step::Reply("answer"))]);
        let o = build(adapter.clone(), 5);

        let first = o.route(ctx("What is SEO?")).await.unwrap();
        assert!(!first.cache_hit);
        assert_eq!(first.provider, "perplexity");
        assert!((first.cost - 0.015).abs() < f64::EPSILON);

        let second = o.route(ctx("  what is   SEO? ")).await.unwrap();
        assert!(second.cache_hit);
        assert_eq!(second.text, first.text);
        assert_eq!(second.cost, 0.0);
        assert_eq!(adapter.calls(), vec!["perplexity"]);

        let stats = o.cache_stats().await;
        assert_eq!((stats.hit_count, stats.miss_count), (1, 1));
    }

    #[tokio::test]
    async fn failing_first_provider_falls_through_in_order() {
        let adapter = Scripted::with(&[
            ("perplexity", Step::Status(502)),
            ("openai", Step::Reply("from openai")),
            ("gemini", Step::Reply("never")),
        ]);
        let o = build(adapter.clone(), 5);

        let resp = o.route(ctx("What is SEO?")).await.unwrap();
        assert_eq!(resp.provider, "openai");
        assert_eq!(adapter.calls(), vec!["perplexity", "openai"]);
        assert_eq!(
            o.breakers().get("perplexity").unwrap().consecutive_failures(),
            1
        );
    }

    #[tokio::test]
    async fn exhausted_chain_reports_every_provider() {
        let adapter = Scripted::with(&[
            ("perplexity", Step::Status(500)),
            ("openai", Step::Status(503)),
            ("gemini", Step::Status(429)),
        ]);
        let o = build(adapter, 5);

        match o.route(ctx("What is SEO?")).await.unwrap_err() {
            WaypointError::RoutingExhausted { attempts } => {
                let names: Vec<_> = attempts.iter().map(|a| a.provider.as_str()).collect();
                assert_eq!(names, vec!["perplexity", "openai", "gemini"]);
                assert!(matches!(&attempts[1].reason, FailureReason::Error(m) if m.contains("503")));
            }
            other => panic!("expected RoutingExhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn open_breakers_are_skipped_without_calls() {
        let adapter = Scripted::with(&[]);
        let o = build(adapter.clone(), 1);
        for p in ["perplexity", "openai", "gemini"] {
            o.breakers().record_failure(p);
        }

        match o.route(ctx("What is SEO?")).await.unwrap_err() {
            WaypointError::RoutingExhausted { attempts } => {
                assert_eq!(attempts.len(), 3);
                assert!(attempts.iter().all(|a| a.reason == FailureReason::CircuitOpen));
            }
            other => panic!("expected RoutingExhausted, got {other:?}"),
        }
        assert!(adapter.calls().is_empty());
        assert_eq!(o.health().await.status, ServiceStatus::Unhealthy);
    }

    #[tokio::test(start_paused = true)]
    async fn provider_timeout_counts_as_failure_and_chain_continues() {
        let adapter = Scripted::with(&[
            ("perplexity", Step::Hang),
            ("openai", Step::Reply("ok")),
        ]);
        let o = build(adapter.clone(), 5);

        let resp = o.route(ctx("current stock market trends")).await.unwrap();
        assert_eq!(resp.provider, "openai");
        assert_eq!(resp.tier, ComplexityTier::Complex);
        let perplexity = o.breakers().get("perplexity").unwrap();
        assert_eq!(perplexity.consecutive_failures(), 1);
        assert_eq!(perplexity.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn request_deadline_stops_the_chain() {
        let adapter = Scripted::with(&[("perplexity", Step::Hang)]);
        let o = build(adapter.clone(), 5);
        let short = RequestContext::new("r", "t", "What is SEO?", None, Duration::from_secs(2));

        let err = o.route(short).await.unwrap_err();
        assert!(matches!(err, WaypointError::DeadlineExceeded { .. }));
        assert_eq!(adapter.calls(), vec!["perplexity"]);
        // Cut by the caller's deadline, so the provider is not blamed.
        assert_eq!(
            o.breakers().get("perplexity").unwrap().consecutive_failures(),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_trial_is_released_when_deadline_cuts_it() {
        let adapter = Scripted::with(&[
            ("perplexity", Step::Hang),
            ("perplexity", Step::Reply("recovered")),
        ]);
        let o = build(adapter.clone(), 1);
        o.breakers().record_failure("perplexity");
        tokio::time::advance(Duration::from_secs(60)).await;

        let short = RequestContext::new("r", "t", "What is SEO?", None, Duration::from_secs(1));
        assert!(o.route(short).await.is_err());
        assert_eq!(o.breakers().state("perplexity"), Some(CircuitState::HalfOpen));

        let resp = o.route(ctx("What is SEO?")).await.unwrap();
        assert_eq!(resp.provider, "perplexity");
        assert_eq!(o.breakers().state("perplexity"), Some(CircuitState::Closed));
    }

    #[tokio::test]
    async fn requested_max_tokens_caps_budget() {
        let adapter = Scripted::with(&[("perplexity", Step::Reply("ok"))]);
        let o = build(adapter, 5);
        let c = RequestContext::new(
            "r",
            "t",
            "latest news",
            Some(1000),
            Duration::from_secs(30),
        );
        let resp = o.route(c).await.unwrap();
        assert_eq!(resp.token_optimization.requested, 1000);
        assert_eq!(resp.token_optimization.used, 1000);

        let adapter = Scripted::with(&[("perplexity", Step::Reply("ok"))]);
        let o = build(adapter, 5);
        let resp = o.route(ctx("What is SEO?")).await.unwrap();
        assert_eq!(resp.token_optimization, TokenOptimization::new(4096, 500));
        assert_eq!(resp.token_optimization.saved, 3596);
    }

    #[tokio::test]
    async fn empty_prompt_and_zero_max_tokens_are_rejected() {
        let adapter = Scripted::with(&[]);
        let o = build(adapter.clone(), 5);
        assert!(matches!(
            o.route(ctx("   ")).await,
            Err(WaypointError::InvalidRequest(_))
        ));
        let zero = RequestContext::new("r", "t", "hi", Some(0), Duration::from_secs(30));
        assert!(matches!(
            o.route(zero).await,
            Err(WaypointError::InvalidRequest(_))
        ));
        assert!(adapter.calls().is_empty());
    }

    #[tokio::test]
    async fn warmed_prompt_is_served_without_provider() {
        let adapter = Scripted::with(&[]);
        let o = build(adapter.clone(), 5);
        let stored = o
            .warm(vec![WarmEntry {
                prompt: "What is SEO?".into(),
                response: "Search engine optimization".into(),
            }])
            .await
            .unwrap();
        assert_eq!(stored, 1);

        let resp = o.route(ctx("what is seo?")).await.unwrap();
        assert!(resp.cache_hit);
        assert_eq!(resp.provider, WARM_PROVIDER);
        assert_eq!(resp.text, "Search engine optimization");
        assert!(adapter.calls().is_empty());
    }

    #[tokio::test]
    async fn whitespace_variants_share_budget_and_cache_entry() {
        let adapter = Scripted::with(&[("perplexity", Step::Reply("answer"))]);
        let o = build(adapter.clone(), 5);
        // 111 chars once collapsed, 130 as written; short limit is 120.
        let tight = format!("{} {}", "a".repeat(50), "b".repeat(60));
        let padded = format!("{}{}{}", "a".repeat(50), " ".repeat(20), "b".repeat(60));

        let first = o.route(ctx(&tight)).await.unwrap();
        let second = o.route(ctx(&padded)).await.unwrap();
        assert_eq!(first.token_optimization.used, 500);
        assert_eq!(second.token_optimization.used, 500);
        assert!(second.cache_hit);
        assert_eq!(adapter.calls(), vec!["perplexity"]);
    }

    #[tokio::test]
    async fn warmed_entry_serves_whitespace_variant() {
        let adapter = Scripted::with(&[]);
        let o = build(adapter.clone(), 5);
        let padded = format!("{}{}{}", "a".repeat(50), " ".repeat(20), "b".repeat(60));
        o.warm(vec![WarmEntry {
            prompt: padded,
            response: "warmed".into(),
        }])
        .await
        .unwrap();

        let tight = format!("{} {}", "a".repeat(50), "b".repeat(60));
        let resp = o.route(ctx(&tight)).await.unwrap();
        assert!(resp.cache_hit);
        assert_eq!(resp.text, "warmed");
        assert!(adapter.calls().is_empty());
    }

    #[tokio::test]
    async fn warm_rejects_empty_prompt_before_writing() {
        let o = build(Scripted::with(&[]), 5);
        let err = o
            .warm(vec![
                WarmEntry {
                    prompt: "ok".into(),
                    response: "fine".into(),
                },
                WarmEntry {
                    prompt: " ".into(),
                    response: "bad".into(),
                },
            ])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("entries[1]"));
        assert_eq!(o.cache_stats().await.entry_count, 0);
    }

    #[tokio::test]
    async fn invalidation_forces_a_fresh_provider_call() {
        let adapter = Scripted::with(&[
            ("perplexity", Step::Reply("first")),
            ("perplexity", Step::Reply("second")),
        ]);
        let o = build(adapter.clone(), 5);
        o.route(ctx("What is SEO?")).await.unwrap();
        assert_eq!(o.invalidate("ai:simple:*").await.unwrap(), 1);

        let resp = o.route(ctx("What is SEO?")).await.unwrap();
        assert!(!resp.cache_hit);
        assert_eq!(resp.text, "second");
    }

    #[tokio::test]
    async fn similarity_tier_serves_near_duplicates() {
        let adapter = Scripted::with(&[("perplexity", Step::Reply("answer"))]);
        let providers = three_providers();
        let breakers = providers
            .iter()
            .map(|p| (p.name.clone(), BreakerSettings::default()))
            .collect();
        let o = Orchestrator::new(
            providers,
            breakers,
            CacheStore::with_similarity(
                Arc::new(MemoryCache::default()),
                Arc::new(LexicalSimilarityCache::new(0.8, 100)),
            ),
            adapter.clone(),
            ComplexityClassifier::default(),
            CacheTtls::default(),
        );
        o.route(ctx("What is SEO?")).await.unwrap();
        let resp = o.route(ctx("what is seo")).await.unwrap();
        assert!(resp.cache_hit);
        assert_eq!(adapter.calls().len(), 1);
    }

    #[tokio::test]
    async fn similar_prompts_in_different_tiers_do_not_share_answers() {
        let adapter = Scripted::with(&[
            ("perplexity", Step::Reply("simple answer")),
            ("perplexity", Step::Reply("complex answer")),
        ]);
        let providers = three_providers();
        let breakers = providers
            .iter()
            .map(|p| (p.name.clone(), BreakerSettings::default()))
            .collect();
        let o = Orchestrator::new(
            providers,
            breakers,
            CacheStore::with_similarity(
                Arc::new(MemoryCache::default()),
                Arc::new(LexicalSimilarityCache::new(0.8, 100)),
            ),
            adapter.clone(),
            ComplexityClassifier::default(),
            CacheTtls::default(),
        );
        let capped = |prompt: &str| {
            RequestContext::new("req-1", "tenant-a", prompt, Some(500), Duration::from_secs(30))
        };

        let simple = o.route(capped("summary of the tech scene")).await.unwrap();
        assert_eq!(simple.tier, ComplexityTier::Simple);
        let complex = o.route(capped("summary of the tech news scene")).await.unwrap();
        assert_eq!(complex.tier, ComplexityTier::Complex);
        assert_eq!(complex.token_optimization.used, simple.token_optimization.used);
        assert!(!complex.cache_hit);
        assert_eq!(complex.text, "complex answer");
        assert_eq!(adapter.calls().len(), 2);
    }

    #[tokio::test]
    async fn health_reports_providers_in_chain_order() {
        let o = build(Scripted::with(&[]), 1);
        let health = o.health().await;
        assert_eq!(health.status, ServiceStatus::Healthy);
        let names: Vec<_> = health.providers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["perplexity", "openai", "gemini"]);
        assert!(health.cache.reachable);

        o.breakers().record_failure("openai");
        let health = o.health().await;
        assert_eq!(health.status, ServiceStatus::Degraded);
        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["providers"][1]["state"], "OPEN");
        assert_eq!(json["providers"][1]["consecutiveFailures"], 1);
        assert_eq!(json["status"], "degraded");
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn failures_are_logged_with_request_context() {
        let adapter = Scripted::with(&[
            ("perplexity", Step::Status(500)),
            ("openai", Step::Reply("ok")),
        ]);
        let o = build(adapter, 5);
        o.route(ctx("What is SEO?")).await.unwrap();
        assert!(logs_contain("provider attempt failed"));
        assert!(logs_contain("req-1"));
        assert!(logs_contain("provider_error"));
    }
}
