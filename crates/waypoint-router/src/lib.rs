// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt classification and request routing for Waypoint.
//!
//! This crate provides:
//! - [`ComplexityClassifier`]: keyword and length heuristics that pick a tier
//!   and token budget (zero-cost, zero-latency)
//! - [`Orchestrator`]: cache probe, priority fallback chain with circuit
//!   breakers, cache population, warm/invalidate/health operations

pub mod classifier;
pub mod orchestrator;

pub use classifier::{Classification, ComplexityClassifier};
pub use orchestrator::{
    CacheTtls, Orchestrator, ProviderHealth, RouterHealth, ServiceStatus, WARM_PROVIDER, WarmEntry,
};
