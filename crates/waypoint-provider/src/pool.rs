// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider client pool.

use std::collections::HashMap;

use async_trait::async_trait;
use waypoint_core::{
    InvokeRequest, ProviderAdapter, ProviderDescriptor, ProviderReply, WaypointError,
};

use crate::client::HttpProviderClient;

/// One long-lived [`HttpProviderClient`] per configured provider.
///
/// Built once at startup and shared read-only; each client's connection pool
/// is reused by every request routed to that provider.
#[derive(Debug, Default)]
pub struct ProviderPool {
    clients: HashMap<String, HttpProviderClient>,
}

impl ProviderPool {
    pub fn new<'a>(
        descriptors: impl IntoIterator<Item = &'a ProviderDescriptor>,
    ) -> Result<Self, WaypointError> {
        let clients = descriptors
            .into_iter()
            .map(|d| Ok((d.name.clone(), HttpProviderClient::new(d.clone())?)))
            .collect::<Result<HashMap<_, _>, WaypointError>>()?;
        Ok(Self { clients })
    }

    pub fn get(&self, name: &str) -> Option<&HttpProviderClient> {
        self.clients.get(name)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[async_trait]
impl ProviderAdapter for ProviderPool {
    async fn invoke(
        &self,
        provider: &ProviderDescriptor,
        request: &InvokeRequest,
    ) -> Result<ProviderReply, WaypointError> {
        let client = self.clients.get(&provider.name).ok_or_else(|| {
            WaypointError::Internal(format!(
                "no HTTP client registered for provider `{}`",
                provider.name
            ))
        })?;
        client.invoke(request).await
    }
}
