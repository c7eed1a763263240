// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for keel-manager.

use keel_protocol::manager_proto::RpcError;
use thiserror::Error;

/// Manager errors.
///
/// Every variant maps to a stable RPC error code via [`ManagerError::error_code`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ManagerError {
    /// A request field is missing or malformed. Raised before any task exists.
    #[error("{0}")]
    Validation(String),

    /// The caller is not allowed to perform the operation.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// The addressed entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A supervisor reported a region other than ours.
    #[error("Supervisor Region ({supervisor}) does not match Manager Region ({manager})")]
    RegionMismatch { supervisor: String, manager: String },

    /// A supervisor answered its health check with an unusable status.
    #[error("Status is {0}")]
    SupervisorStatus(String),

    /// Talking to a supervisor failed.
    #[error("supervisor probe failed: {0}")]
    Probe(#[from] crate::admission::ProbeError),

    /// The registry store failed.
    #[error("registry store error: {0}")]
    Store(#[from] crate::store::StoreError),

    /// The task exists but has not finished.
    #[error("task {0} is still pending")]
    TaskPending(String),

    /// The task never existed or its result was evicted.
    #[error("task {0} not found")]
    TaskNotFound(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ManagerError {
    /// Stable error code for the wire.
    pub fn error_code(&self) -> &'static str {
        match self {
            ManagerError::Validation(_) => "VALIDATION_ERROR",
            ManagerError::NotAuthorized(_) => "NOT_AUTHORIZED",
            ManagerError::NotFound(_) => "NOT_FOUND",
            ManagerError::RegionMismatch { .. } => "REGION_MISMATCH",
            ManagerError::SupervisorStatus(_) => "SUPERVISOR_STATUS",
            ManagerError::Probe(_) => "PROBE_ERROR",
            ManagerError::Store(_) => "STORE_ERROR",
            ManagerError::TaskPending(_) => "TASK_PENDING",
            ManagerError::TaskNotFound(_) => "TASK_NOT_FOUND",
            ManagerError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Wire form of this error. `status` is the reply status of the failed
    /// task, or empty when the error happened outside a task.
    pub fn to_rpc_error(&self, status: &str) -> RpcError {
        RpcError {
            code: self.error_code().to_string(),
            message: self.to_string(),
            status: status.to_string(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ManagerError::Validation(message.into())
    }
}

/// Result type using [`ManagerError`].
pub type Result<T> = std::result::Result<T, ManagerError>;
