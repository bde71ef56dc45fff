// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Waypoint AI request router.
//!
//! This crate provides the error taxonomy, the shared data model, and the
//! adapter traits that sit between the routing orchestrator and its
//! collaborators (provider clients, cache backends, similarity tiers).

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{FailureReason, ProviderFailure, WaypointError};
pub use types::{
    CacheScope, ComplexityTier, HealthStatus, InvokeRequest, ProviderDescriptor, ProviderReply,
    RequestContext, ResponsePayload, RoutedResponse, TokenOptimization, TokenUsage,
    sort_by_priority,
};

pub use traits::{CacheBackend, ProviderAdapter, SimilarityCache};
