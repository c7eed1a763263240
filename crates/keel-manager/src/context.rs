// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared state handed to every executor.

use std::sync::Arc;
use std::time::Duration;

use keel_protocol::manager_proto::AuthArg;

use crate::admission::SupervisorClient;
use crate::auth::{self, Authenticator, Caller};
use crate::error::Result;
use crate::registry::Registry;
use crate::store::RegistryStore;
use crate::task::TaskTracker;

/// Identity and settings of this manager process.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub region: String,
    pub host: String,
    /// Port the RPC listener is actually bound to
    pub port: u16,
    pub supervisor_port: u16,
    /// Suffix for generated CNames
    pub domain: String,
    pub result_duration: Duration,
}

/// Process-wide control plane state.
pub struct ControlPlaneContext {
    config: ContextConfig,
    registry: Registry,
    tracker: TaskTracker,
    authenticator: Arc<dyn Authenticator>,
    supervisors: Arc<dyn SupervisorClient>,
}

impl ControlPlaneContext {
    pub fn new(
        config: ContextConfig,
        store: Arc<dyn RegistryStore>,
        authenticator: Arc<dyn Authenticator>,
        supervisors: Arc<dyn SupervisorClient>,
    ) -> Self {
        let tracker = TaskTracker::new(config.result_duration);
        Self {
            config,
            registry: Registry::new(store),
            tracker,
            authenticator,
            supervisors,
        }
    }

    pub fn region(&self) -> &str {
        &self.config.region
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn supervisor_port(&self) -> u16 {
        self.config.supervisor_port
    }

    pub fn domain(&self) -> &str {
        &self.config.domain
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    pub fn supervisors(&self) -> &dyn SupervisorClient {
        self.supervisors.as_ref()
    }

    /// Authenticate request credentials.
    pub async fn authenticate(&self, auth: Option<&AuthArg>) -> Result<Caller> {
        auth::authenticate(self.authenticator.as_ref(), auth).await
    }
}
