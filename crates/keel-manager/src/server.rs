// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Manager QUIC server.
//!
//! Each stream carries one `RpcRequest` answered by one `RpcResponse`
//! from the [`gateway`](crate::gateway).

use std::sync::Arc;

use keel_protocol::manager_proto::{RpcError, RpcRequest};
use keel_protocol::{KeelServer, ServerError};
use tracing::info;

use crate::context::ControlPlaneContext;
use crate::gateway;

/// Error sent back for requests that cannot be decoded.
pub fn invalid_request(message: String) -> RpcError {
    RpcError::new("INVALID_REQUEST", message)
}

/// Serve the manager protocol on `server` until it is closed.
pub async fn run_manager_server(
    server: Arc<KeelServer>,
    ctx: Arc<ControlPlaneContext>,
) -> Result<(), ServerError> {
    info!(addr = ?server.local_addr().ok(), region = %ctx.region(), "manager server starting");

    server
        .serve(
            move |request: RpcRequest| {
                let ctx = ctx.clone();
                async move { gateway::dispatch(&ctx, request).await }
            },
            invalid_request,
        )
        .await
}
