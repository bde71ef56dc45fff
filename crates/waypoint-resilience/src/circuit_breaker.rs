// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Circuit breaker for a single provider.
//!
//! ```text
//! CLOSED --(failure_threshold consecutive failures)--> OPEN
//! OPEN --(reset_timeout elapsed, next allow())--> HALF_OPEN (one trial)
//! HALF_OPEN --(trial succeeds)--> CLOSED
//! HALF_OPEN --(trial fails)--> OPEN
//! ```
//!
//! All transitions happen under one mutex per breaker, so concurrent callers
//! never double-admit a trial or lose a failure count.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use strum::Display;
use tokio::time::Instant;
use tracing::{info, warn};

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Healthy; requests pass through.
    Closed,
    /// Tripped; requests fail fast without network I/O.
    Open,
    /// Cooldown over; exactly one trial request allowed.
    HalfOpen,
}

impl CircuitState {
    /// Numeric encoding used for the breaker state gauge.
    pub fn as_gauge(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

/// What an admitted call is allowed to decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permit {
    /// Admitted while CLOSED. Its outcome feeds the failure count only.
    Regular,
    /// The single HALF_OPEN trial. Its outcome closes or re-opens the breaker.
    Trial,
}

/// Thresholds for one breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

/// Point-in-time view of a breaker, for health and metrics output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    /// Seconds since the most recent failure, if any.
    pub last_failure_secs_ago: Option<u64>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Circuit breaker guarding one provider.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a breaker in the CLOSED state.
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure_at: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> BreakerSettings {
        self.settings
    }

    // Critical sections never panic midway, so a poisoned lock still holds
    // consistent state.
    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a request may be sent to this provider right now.
    ///
    /// Shorthand for [`try_acquire`](Self::try_acquire) when the caller does
    /// not need to know which kind of permit it got.
    pub fn allow(&self) -> bool {
        self.try_acquire().is_some()
    }

    /// Ask for a permit to call this provider.
    ///
    /// In OPEN, the first call after `reset_timeout` moves the breaker to
    /// HALF_OPEN and gets the single [`Permit::Trial`]; every other caller
    /// gets `None` until that trial resolves.
    pub fn try_acquire(&self) -> Option<Permit> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Some(Permit::Regular),
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    None
                } else {
                    inner.trial_in_flight = true;
                    Some(Permit::Trial)
                }
            }
            CircuitState::Open => {
                let cooled = inner
                    .last_failure_at
                    .is_none_or(|at| at.elapsed() >= self.settings.reset_timeout);
                if cooled {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    info!(provider = %self.name, "circuit half-open, admitting trial request");
                    Some(Permit::Trial)
                } else {
                    None
                }
            }
        }
    }

    /// Record a successful call made under `permit`.
    ///
    /// Only the trial closes a HALF_OPEN breaker. A late success from a
    /// regular permit, issued before the breaker tripped, changes nothing
    /// outside CLOSED.
    pub fn record_success(&self, permit: Permit) {
        let mut inner = self.lock();
        match (inner.state, permit) {
            (CircuitState::Closed, _) => inner.consecutive_failures = 0,
            (CircuitState::HalfOpen, Permit::Trial) => {
                inner.state = CircuitState::Closed;
                inner.consecutive_failures = 0;
                inner.trial_in_flight = false;
                info!(provider = %self.name, "circuit closed after successful trial");
            }
            (CircuitState::HalfOpen | CircuitState::Open, _) => {}
        }
    }

    /// Record a failed call made under `permit`.
    ///
    /// Outside CLOSED, only the trial's failure changes state. Late regular
    /// failures are counted but neither re-open the breaker nor extend the
    /// cooldown.
    pub fn record_failure(&self, permit: Permit) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        match (inner.state, permit) {
            (CircuitState::Closed, _) => {
                inner.last_failure_at = Some(Instant::now());
                if inner.consecutive_failures >= self.settings.failure_threshold {
                    inner.state = CircuitState::Open;
                    warn!(
                        provider = %self.name,
                        failures = inner.consecutive_failures,
                        "circuit opened"
                    );
                }
            }
            (CircuitState::HalfOpen, Permit::Trial) => {
                inner.state = CircuitState::Open;
                inner.last_failure_at = Some(Instant::now());
                inner.trial_in_flight = false;
                warn!(provider = %self.name, "trial request failed, circuit re-opened");
            }
            (CircuitState::HalfOpen | CircuitState::Open, _) => {}
        }
    }

    /// Give a permit back without judging the provider.
    ///
    /// Used when an admitted attempt is cancelled or cut short by the
    /// request's own deadline. Only a trial permit frees anything.
    pub fn release(&self, permit: Permit) {
        if permit != Permit::Trial {
            return;
        }
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen && inner.trial_in_flight {
            inner.trial_in_flight = false;
            info!(provider = %self.name, "trial request abandoned, slot released");
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            failure_threshold: self.settings.failure_threshold,
            last_failure_secs_ago: inner.last_failure_at.map(|at| at.elapsed().as_secs()),
        }
    }
}
