// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response caching for the Waypoint router.
//!
//! - [`key`]: deterministic key derivation and glob/prefix matching
//! - [`memory`]: sharded in-memory exact tier with TTL
//! - [`similarity`]: optional bag-of-words similarity tier
//! - [`store`]: the [`CacheStore`] facade the orchestrator talks to

pub mod key;
pub mod memory;
pub mod similarity;
pub mod store;

pub use key::{KeyMatcher, agnostic_key, exact_key, normalize_prompt};
pub use memory::MemoryCache;
pub use similarity::{LexicalSimilarityCache, NoopSimilarityCache};
pub use store::{CacheHealth, CacheStats, CacheStore, CacheTier};
