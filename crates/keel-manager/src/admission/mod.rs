// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Supervisor admission and retirement.
//!
//! A supervisor is admitted only after it answers a health check with `OK`
//! or `FULL` from the manager's own region. Retirement tears down every
//! container on the host on a best-effort basis before the entry is removed.

use async_trait::async_trait;
use keel_protocol::ClientError;
use keel_protocol::manager_proto::{STATUS_FULL, STATUS_OK, STATUS_REGION_MISMATCH};
use keel_protocol::supervisor_proto::{HealthCheckReply, TeardownReply};
use thiserror::Error;
use tracing::{info, warn};

use crate::error::{ManagerError, Result};
use crate::registry::{Registry, SupervisorEntry};

pub mod mock;
pub mod quic;

pub use mock::MockSupervisorClient;
pub use quic::QuicSupervisorClient;

/// Failures talking to a supervisor.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("cannot resolve supervisor host {host}: {reason}")]
    Resolve { host: String, reason: String },

    #[error("supervisor {host} unreachable: {source}")]
    Transport {
        host: String,
        #[source]
        source: ClientError,
    },

    #[error("supervisor {host} answered with an unexpected message")]
    UnexpectedResponse { host: String },

    #[error("supervisor {host} returned {code}: {message}")]
    Rejected {
        host: String,
        code: String,
        message: String,
    },
}

/// Client side of the supervisor protocol.
#[async_trait]
pub trait SupervisorClient: Send + Sync {
    async fn health_check(&self, host: &str) -> std::result::Result<HealthCheckReply, ProbeError>;

    /// Tear down containers on `host`; every container when `all` is set.
    async fn teardown(
        &self,
        host: &str,
        containers: Vec<String>,
        all: bool,
    ) -> std::result::Result<TeardownReply, ProbeError>;
}

/// Probe `host` and record it if it is healthy and in `region`.
///
/// Returns the probe status (`OK` or `FULL`).
pub async fn admit(
    supervisors: &dyn SupervisorClient,
    registry: &Registry,
    host: &str,
    region: &str,
) -> Result<(String, SupervisorEntry)> {
    let health = supervisors.health_check(host).await?;

    if health.status != STATUS_OK && health.status != STATUS_FULL {
        warn!(host = %host, status = %health.status, "supervisor refused admission");
        return Err(ManagerError::SupervisorStatus(health.status));
    }
    if health.region != region {
        warn!(host = %host, supervisor_region = %health.region, "supervisor region mismatch");
        return Err(ManagerError::RegionMismatch {
            supervisor: health.region,
            manager: region.to_string(),
        });
    }

    let entry = registry.touch_supervisor(host).await?;
    info!(host = %host, status = %health.status, "supervisor admitted");
    Ok((health.status, entry))
}

/// Tear down everything on `host`, then forget it. Teardown failures are
/// logged and do not stop the removal.
pub async fn retire(
    supervisors: &dyn SupervisorClient,
    registry: &Registry,
    host: &str,
) -> Result<bool> {
    match supervisors.teardown(host, Vec::new(), true).await {
        Ok(reply) => {
            info!(host = %host, containers = reply.containers.len(), "supervisor torn down")
        }
        Err(e) => warn!(host = %host, error = %e, "teardown failed, removing supervisor anyway"),
    }
    registry.delete_supervisor(host).await
}

/// Reply status an admission failure carries, if it has a specific one.
pub fn rejection_status(err: &ManagerError) -> Option<&str> {
    match err {
        ManagerError::RegionMismatch { .. } => Some(STATUS_REGION_MISMATCH),
        ManagerError::SupervisorStatus(status) => Some(status),
        _ => None,
    }
}
