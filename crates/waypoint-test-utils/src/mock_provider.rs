// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock provider adapter for deterministic testing.
//!
//! `MockProvider` implements `ProviderAdapter` for every provider name at
//! once. Each provider has its own FIFO of outcomes; when a queue is empty
//! the provider answers with a default reply.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use waypoint_core::{
    InvokeRequest, ProviderAdapter, ProviderDescriptor, ProviderReply, TokenUsage, WaypointError,
};

/// What a mock provider does on one call.
#[derive(Debug, Clone, PartialEq)]
pub enum MockOutcome {
    /// Answer immediately with this text at the provider's static cost.
    Reply(String),
    /// Answer with this text after a delay.
    Slow(Duration, String),
    /// Fail with a non-success HTTP status.
    Fail(u16),
    /// Never answer before the attempt deadline.
    Timeout,
}

impl MockOutcome {
    pub fn reply(text: impl Into<String>) -> Self {
        Self::Reply(text.into())
    }
}

/// A mock provider adapter with scripted, per-provider outcomes.
#[derive(Debug, Default)]
pub struct MockProvider {
    scripts: Mutex<HashMap<String, VecDeque<MockOutcome>>>,
    calls: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue outcomes for `provider`, played back in order.
    pub async fn script(&self, provider: &str, outcomes: impl IntoIterator<Item = MockOutcome>) {
        self.scripts
            .lock()
            .await
            .entry(provider.to_string())
            .or_default()
            .extend(outcomes);
    }

    /// Provider names in the order they were invoked.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self, provider: &str) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|name| *name == provider)
            .count()
    }

    pub async fn total_calls(&self) -> usize {
        self.calls.lock().await.len()
    }

    async fn next_outcome(&self, provider: &str) -> MockOutcome {
        self.scripts
            .lock()
            .await
            .get_mut(provider)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| MockOutcome::Reply(format!("mock response from {provider}")))
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn invoke(
        &self,
        provider: &ProviderDescriptor,
        request: &InvokeRequest,
    ) -> Result<ProviderReply, WaypointError> {
        let started = Instant::now();
        self.calls.lock().await.push(provider.name.clone());

        let reply = |text: String| ProviderReply {
            text,
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 20,
            },
            cost: provider.cost_per_request,
        };

        match self.next_outcome(&provider.name).await {
            MockOutcome::Reply(text) => Ok(reply(text)),
            MockOutcome::Slow(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(reply(text))
            }
            MockOutcome::Fail(status) => Err(WaypointError::Provider {
                provider: provider.name.clone(),
                message: "mock failure".into(),
                status: Some(status),
                source: None,
            }),
            MockOutcome::Timeout => {
                tokio::time::sleep_until(request.deadline).await;
                Err(WaypointError::ProviderTimeout {
                    provider: provider.name.clone(),
                    timeout: request.deadline.saturating_duration_since(started),
                })
            }
        }
    }
}
