// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock supervisor client for testing.
//!
//! Answers health checks from a per-host script instead of the network.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use keel_protocol::manager_proto::STATUS_OK;
use keel_protocol::supervisor_proto::{HealthCheckReply, TeardownReply};
use tokio::sync::Mutex;

use super::{ProbeError, SupervisorClient};

#[derive(Default)]
struct MockState {
    statuses: HashMap<String, String>,
    regions: HashMap<String, String>,
    unreachable: HashSet<String>,
    teardowns: Vec<String>,
    probes: usize,
}

/// Supervisor client answering from memory.
///
/// Every host reports `OK` in the default region unless scripted otherwise.
#[derive(Clone)]
pub struct MockSupervisorClient {
    region: String,
    state: Arc<Mutex<MockState>>,
    /// Delay before each health check answer
    pub probe_delay: Duration,
}

impl MockSupervisorClient {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            state: Arc::new(Mutex::new(MockState::default())),
            probe_delay: Duration::ZERO,
        }
    }

    pub async fn set_status(&self, host: &str, status: &str) {
        self.state
            .lock()
            .await
            .statuses
            .insert(host.to_string(), status.to_string());
    }

    pub async fn set_region(&self, host: &str, region: &str) {
        self.state
            .lock()
            .await
            .regions
            .insert(host.to_string(), region.to_string());
    }

    /// Make every call to `host` fail at the transport level.
    pub async fn set_unreachable(&self, host: &str) {
        self.state.lock().await.unreachable.insert(host.to_string());
    }

    /// Hosts that received a teardown, in call order.
    pub async fn teardowns(&self) -> Vec<String> {
        self.state.lock().await.teardowns.clone()
    }

    pub async fn probe_count(&self) -> usize {
        self.state.lock().await.probes
    }
}

fn unreachable(host: &str) -> ProbeError {
    ProbeError::Resolve {
        host: host.to_string(),
        reason: "host unreachable (mock)".to_string(),
    }
}

#[async_trait]
impl SupervisorClient for MockSupervisorClient {
    async fn health_check(&self, host: &str) -> Result<HealthCheckReply, ProbeError> {
        if !self.probe_delay.is_zero() {
            tokio::time::sleep(self.probe_delay).await;
        }
        let mut state = self.state.lock().await;
        state.probes += 1;
        if state.unreachable.contains(host) {
            return Err(unreachable(host));
        }
        Ok(HealthCheckReply {
            status: state
                .statuses
                .get(host)
                .cloned()
                .unwrap_or_else(|| STATUS_OK.to_string()),
            region: state
                .regions
                .get(host)
                .cloned()
                .unwrap_or_else(|| self.region.clone()),
            zone: String::new(),
            free_containers: 0,
        })
    }

    async fn teardown(
        &self,
        host: &str,
        containers: Vec<String>,
        _all: bool,
    ) -> Result<TeardownReply, ProbeError> {
        let mut state = self.state.lock().await;
        state.teardowns.push(host.to_string());
        if state.unreachable.contains(host) {
            return Err(unreachable(host));
        }
        Ok(TeardownReply {
            status: STATUS_OK.to_string(),
            containers,
        })
    }
}
