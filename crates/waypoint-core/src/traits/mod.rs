// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter traits at the seams between the orchestrator and its collaborators.

pub mod cache;
pub mod provider;
pub mod similarity;

pub use cache::CacheBackend;
pub use provider::ProviderAdapter;
pub use similarity::SimilarityCache;
