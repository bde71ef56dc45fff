// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider client pool for the Waypoint router.
//!
//! Each configured provider gets one [`HttpProviderClient`] with its own
//! connection pool; [`ProviderPool`] implements
//! [`ProviderAdapter`](waypoint_core::ProviderAdapter) over the set.

pub mod client;
pub mod pool;
pub mod wire;

pub use client::{HttpProviderClient, resolve_cost};
pub use pool::ProviderPool;
