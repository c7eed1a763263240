// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for keel-sdk.

use keel_protocol::ClientError;
use keel_protocol::manager_proto::RpcError;
use thiserror::Error;

/// Result type using SdkError.
pub type Result<T> = std::result::Result<T, SdkError>;

/// Errors that can occur when using the SDK.
#[derive(Debug, Error)]
pub enum SdkError {
    /// Configuration error (missing or invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection to the manager failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// Request or wait timed out.
    #[error("timed out after {0}ms")]
    Timeout(u64),

    /// Manager returned an error response.
    ///
    /// `status` is the reply status of a failed task (for example
    /// `Region Mismatch`) and empty otherwise.
    #[error("server error [{code}]: {message}")]
    Server {
        code: String,
        message: String,
        status: String,
    },

    /// Unexpected response from the manager.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Invalid input, rejected before any call.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl SdkError {
    /// RPC error code of a server error.
    pub fn code(&self) -> Option<&str> {
        match self {
            SdkError::Server { code, .. } => Some(code),
            _ => None,
        }
    }

    /// The task behind a `*Result` poll has not finished yet.
    pub fn is_task_pending(&self) -> bool {
        self.code() == Some("TASK_PENDING")
    }

    /// The task id is unknown or its result has expired.
    pub fn is_task_not_found(&self) -> bool {
        self.code() == Some("TASK_NOT_FOUND")
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == Some("NOT_FOUND")
    }

    pub fn is_unauthorized(&self) -> bool {
        self.code() == Some("NOT_AUTHORIZED")
    }
}

impl From<RpcError> for SdkError {
    fn from(err: RpcError) -> Self {
        SdkError::Server {
            code: err.code,
            message: err.message,
            status: err.status,
        }
    }
}

impl From<ClientError> for SdkError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Timeout(ms) => SdkError::Timeout(ms),
            ClientError::Rejected { code, message } => SdkError::Server {
                code,
                message,
                status: String::new(),
            },
            other => SdkError::Connection(other.to_string()),
        }
    }
}
