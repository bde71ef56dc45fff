// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Waypoint integration tests.
//!
//! Provides a scripted provider adapter and a harness that assembles an
//! isolated [`Orchestrator`](waypoint_router::Orchestrator), so routing can
//! be exercised deterministically without any network.
//!
//! # Components
//!
//! - [`MockProvider`] - per-provider scripted outcomes with a call log
//! - [`TestHarness`] - builder for an in-memory routing stack

pub mod harness;
pub mod mock_provider;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_provider::{MockOutcome, MockProvider};
