// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end routing tests.
//!
//! `TestHarness` assembles an orchestrator over a [`MockProvider`], an
//! in-memory cache and fresh breakers. Nothing is shared between harnesses.

use std::sync::Arc;
use std::time::Duration;

use waypoint_cache::{CacheStore, LexicalSimilarityCache, MemoryCache};
use waypoint_core::{
    CacheBackend, ProviderDescriptor, RequestContext, RoutedResponse, WaypointError,
};
use waypoint_resilience::{BreakerRegistry, BreakerSettings};
use waypoint_router::{CacheTtls, ComplexityClassifier, Orchestrator};

use crate::mock_provider::MockProvider;

const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    providers: Vec<ProviderDescriptor>,
    breaker: BreakerSettings,
    request_timeout: Duration,
    similarity_threshold: Option<f32>,
    backend: Option<Arc<dyn CacheBackend>>,
    ttls: CacheTtls,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            providers: Vec::new(),
            breaker: BreakerSettings::default(),
            request_timeout: Duration::from_secs(30),
            similarity_threshold: None,
            backend: None,
            ttls: CacheTtls::default(),
        }
    }

    /// Add a provider with the default 5s timeout.
    pub fn provider(self, name: &str, priority: u32, cost: f64) -> Self {
        self.provider_with_timeout(name, priority, cost, DEFAULT_PROVIDER_TIMEOUT)
    }

    pub fn provider_with_timeout(
        mut self,
        name: &str,
        priority: u32,
        cost: f64,
        timeout: Duration,
    ) -> Self {
        self.providers.push(ProviderDescriptor {
            name: name.to_string(),
            endpoint: format!("http://{name}.test/v1/generate"),
            model: format!("{name}-model"),
            cost_per_request: cost,
            priority,
            timeout,
            api_key: None,
        });
        self
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.breaker.failure_threshold = threshold;
        self
    }

    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.breaker.reset_timeout = timeout;
        self
    }

    /// Deadline applied to contexts built by [`TestHarness::context`].
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enable the lexical similarity tier.
    pub fn with_similarity(mut self, threshold: f32) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    /// Replace the in-memory exact tier, e.g. with a failing backend.
    pub fn with_cache_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_ttls(mut self, ttls: CacheTtls) -> Self {
        self.ttls = ttls;
        self
    }

    pub fn build(self) -> TestHarness {
        let provider = Arc::new(MockProvider::new());
        let breakers: BreakerRegistry = self
            .providers
            .iter()
            .map(|p| (p.name.clone(), self.breaker))
            .collect();

        let backend: Arc<dyn CacheBackend> = match self.backend {
            Some(backend) => backend,
            None => Arc::new(MemoryCache::default()),
        };
        let cache = match self.similarity_threshold {
            Some(threshold) => CacheStore::with_similarity(
                backend,
                Arc::new(LexicalSimilarityCache::new(threshold, 1000)),
            ),
            None => CacheStore::new(backend),
        };

        let orchestrator = Orchestrator::new(
            self.providers,
            breakers,
            cache,
            provider.clone(),
            ComplexityClassifier::default(),
            self.ttls,
        );

        TestHarness {
            orchestrator: Arc::new(orchestrator),
            provider,
            request_timeout: self.request_timeout,
        }
    }
}

/// An isolated routing stack driven by a [`MockProvider`].
pub struct TestHarness {
    pub orchestrator: Arc<Orchestrator>,
    pub provider: Arc<MockProvider>,
    request_timeout: Duration,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Three providers at priorities 1, 2, 3: perplexity ($0.015),
    /// openai ($0.025), gemini ($0.001).
    pub fn three_providers() -> TestHarnessBuilder {
        Self::builder()
            .provider("perplexity", 1, 0.015)
            .provider("openai", 2, 0.025)
            .provider("gemini", 3, 0.001)
    }

    /// A fresh request context with a unique request id.
    pub fn context(&self, prompt: &str, max_tokens: Option<u32>) -> RequestContext {
        RequestContext::new(
            uuid::Uuid::new_v4().to_string(),
            "test-tenant",
            prompt,
            max_tokens,
            self.request_timeout,
        )
    }

    pub async fn route(&self, prompt: &str) -> Result<RoutedResponse, WaypointError> {
        self.orchestrator.route(self.context(prompt, None)).await
    }

    pub async fn route_with_max_tokens(
        &self,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<RoutedResponse, WaypointError> {
        self.orchestrator
            .route(self.context(prompt, Some(max_tokens)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use waypoint_resilience::CircuitState;

    use super::*;
    use crate::MockOutcome;

    #[tokio::test]
    async fn harness_routes_through_mock_provider() {
        let harness = TestHarness::three_providers().build();
        let response = harness.route("What is SEO?").await.unwrap();
        assert_eq!(response.provider, "perplexity");
        assert_eq!(response.text, "mock response from perplexity");
        assert_eq!(harness.provider.calls().await, vec!["perplexity"]);
    }

    #[tokio::test]
    async fn harnesses_share_no_state() {
        let a = TestHarness::three_providers().failure_threshold(1).build();
        let b = TestHarness::three_providers().failure_threshold(1).build();
        a.provider
            .script("perplexity", [MockOutcome::Fail(500)])
            .await;

        a.route("hello").await.unwrap();
        b.route("hello").await.unwrap();

        assert!(!a.orchestrator.breakers().all_open());
        assert_eq!(
            a.orchestrator.breakers().state("perplexity"),
            Some(CircuitState::Open)
        );
        assert_eq!(
            b.orchestrator.breakers().state("perplexity"),
            Some(CircuitState::Closed)
        );
    }
}
