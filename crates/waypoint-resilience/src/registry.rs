// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of one circuit breaker per provider.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::circuit_breaker::{
    BreakerSettings, BreakerSnapshot, CircuitBreaker, CircuitState, Permit,
};

/// Holds a breaker per provider name.
///
/// The set of breakers is fixed at construction; only breaker state mutates
/// afterwards, so the registry is shared as `Arc<BreakerRegistry>` without an
/// outer lock.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: HashMap<String, Arc<CircuitBreaker>>,
    order: Vec<String>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a breaker for `name`. Re-registering replaces the old breaker.
    pub fn register(&mut self, name: impl Into<String>, settings: BreakerSettings) {
        let name = name.into();
        let breaker = Arc::new(CircuitBreaker::new(name.clone(), settings));
        if self.breakers.insert(name.clone(), breaker).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).cloned()
    }

    /// Whether `name` may be called. Unknown providers are never allowed.
    pub fn allow(&self, name: &str) -> bool {
        match self.breakers.get(name) {
            Some(b) => b.allow(),
            None => {
                warn!(provider = name, "no circuit breaker registered for provider");
                false
            }
        }
    }

    /// Ask for admission and get a guard that settles the outcome.
    ///
    /// Returns `None` when the breaker rejects the call. The guard releases
    /// a HALF_OPEN trial if dropped without an explicit outcome.
    pub fn admit(&self, name: &str) -> Option<Admission> {
        let breaker = self.breakers.get(name)?;
        let permit = breaker.try_acquire()?;
        Some(Admission {
            breaker: Arc::clone(breaker),
            permit,
            settled: false,
        })
    }

    /// Record an outcome that was not admitted as a trial.
    pub fn record_success(&self, name: &str) {
        if let Some(b) = self.breakers.get(name) {
            b.record_success(Permit::Regular);
        }
    }

    /// Record a failure that was not admitted as a trial.
    pub fn record_failure(&self, name: &str) {
        if let Some(b) = self.breakers.get(name) {
            b.record_failure(Permit::Regular);
        }
    }

    pub fn state(&self, name: &str) -> Option<CircuitState> {
        self.breakers.get(name).map(|b| b.state())
    }

    /// Snapshots in registration order.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        self.order
            .iter()
            .filter_map(|name| self.breakers.get(name))
            .map(|b| b.snapshot())
            .collect()
    }

    /// True when every registered breaker is OPEN (and at least one exists).
    pub fn all_open(&self) -> bool {
        !self.breakers.is_empty()
            && self
                .breakers
                .values()
                .all(|b| b.state() == CircuitState::Open)
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

impl<N: Into<String>> FromIterator<(N, BreakerSettings)> for BreakerRegistry {
    fn from_iter<I: IntoIterator<Item = (N, BreakerSettings)>>(iter: I) -> Self {
        let mut registry = Self::new();
        for (name, settings) in iter {
            registry.register(name, settings);
        }
        registry
    }
}

/// An admitted call whose outcome has not been reported yet.
///
/// Exactly one of [`succeed`](Self::succeed), [`fail`](Self::fail) or
/// [`abandon`](Self::abandon) settles it. Dropping it unsettled (for example
/// when the request future is cancelled) behaves like `abandon`.
#[derive(Debug)]
#[must_use = "an admission must be settled or the trial slot is only freed on drop"]
pub struct Admission {
    breaker: Arc<CircuitBreaker>,
    permit: Permit,
    settled: bool,
}

impl Admission {
    pub fn provider(&self) -> &str {
        self.breaker.name()
    }

    /// Whether this call is the HALF_OPEN trial.
    pub fn is_trial(&self) -> bool {
        self.permit == Permit::Trial
    }

    pub fn succeed(mut self) -> CircuitState {
        self.settled = true;
        self.breaker.record_success(self.permit);
        self.breaker.state()
    }

    pub fn fail(mut self) -> CircuitState {
        self.settled = true;
        self.breaker.record_failure(self.permit);
        self.breaker.state()
    }

    pub fn abandon(mut self) {
        self.settled = true;
        self.breaker.release(self.permit);
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.release(self.permit);
        }
    }
}
