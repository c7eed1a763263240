// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Keel Protocol - QUIC + Protobuf communication layer
//!
//! Wire protocol spoken between operators and the keel manager, and
//! between the manager and the supervisors it admits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       keel-protocol                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  RPC Layer: one request/response per bidirectional stream   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Serialization: Protobuf (prost)                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Transport: QUIC (quinn)                                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocols
//!
//! - [`manager_proto`]: registry management, task polling, health.
//! - [`supervisor_proto`]: health check and teardown of supervisor hosts.
//!
//! # Usage
//!
//! ```ignore
//! use keel_protocol::{KeelClient, manager_proto};
//!
//! let client = KeelClient::localhost("127.0.0.1:7100".parse()?)?;
//! let request = manager_proto::RpcRequest {
//!     request: Some(manager_proto::rpc_request::Request::HealthCheck(
//!         manager_proto::HealthCheckRequest {},
//!     )),
//! };
//! let response: manager_proto::RpcResponse = client.request(&request).await?;
//! ```

pub mod client;
pub mod frame;
pub mod manager_proto;
pub mod server;
pub mod supervisor_proto;

pub use client::{ClientError, KeelClient, KeelClientConfig};
pub use frame::{Frame, FrameError, MessageType};
pub use server::{ConnectionHandler, KeelServer, KeelServerConfig, ServerError, StreamHandler};
