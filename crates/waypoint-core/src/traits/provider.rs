// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for outbound model calls.

use async_trait::async_trait;

use crate::error::WaypointError;
use crate::types::{InvokeRequest, ProviderDescriptor, ProviderReply};

/// Uniform entry point for calling any configured provider.
///
/// Implementations enforce `request.deadline` as a hard timeout and return
/// [`WaypointError::ProviderTimeout`] when it elapses. They never retry;
/// fallback is the orchestrator's job.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Invoke `provider` once.
    async fn invoke(
        &self,
        provider: &ProviderDescriptor,
        request: &InvokeRequest,
    ) -> Result<ProviderReply, WaypointError>;
}
