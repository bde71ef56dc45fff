// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives for the Waypoint router.
//!
//! One [`CircuitBreaker`] per provider, collected in a [`BreakerRegistry`].
//! Callers ask the registry for an [`Admission`] immediately before each
//! provider attempt and settle it with the outcome.

pub mod circuit_breaker;
pub mod registry;

pub use circuit_breaker::{
    BreakerSettings, BreakerSnapshot, CircuitBreaker, CircuitState, Permit,
};
pub use registry::{Admission, BreakerRegistry};
