// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Keel Manager - PaaS control plane
//!
//! One manager process of a Keel fleet. It admits and tracks the membership
//! of supervisors (container hosts), routers, applications and peer
//! managers, and wraps every mutating change in a pollable task.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                 Clients (keel-sdk, peer managers)                 │
//! └──────────────────────────────────────────────────────────────────┘
//!                                 │ QUIC, port 7100
//!                                 ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                    keel-manager (This Crate)                      │
//! │  ┌──────────┐   ┌──────────────┐   ┌───────────┐   ┌──────────┐   │
//! │  │ Gateway  │──▶│ Task Tracker │──▶│ Executors │──▶│ Registry │   │
//! │  └──────────┘   └──────────────┘   └───────────┘   └──────────┘   │
//! │                                         │                │        │
//! │                                    ┌───────────┐         │        │
//! │                                    │ Admission │         │        │
//! │                                    └───────────┘         │        │
//! └─────────────────────────────────────────│────────────────│────────┘
//!                                           │ QUIC, 7101     ▼
//!                                  ┌─────────────┐  ┌───────────────────┐
//!                                  │ Supervisors │  │ PostgreSQL/memory │
//!                                  └─────────────┘  └───────────────────┘
//! ```
//!
//! # Operations
//!
//! | Operation | Mode | Authorization |
//! |-----------|------|---------------|
//! | `RegisterRouter`, `UnregisterRouter` | async task | super-user |
//! | `GetRouter`, `ListRouters` | inline | any caller |
//! | `RegisterApp`, `UpdateApp`, `UnregisterApp` | tracked task | app owner |
//! | `GetApp` | inline | app owner |
//! | `ListRegisteredApps`, `ListAuthorizedRegisteredApps` | inline | any caller |
//! | `Add/RemoveDependerEnvData`, `Add/RemoveDependerAppData` | tracked task | app owner |
//! | `RegisterSupervisor`, `UnregisterSupervisor` | async task | super-user |
//! | `ListSupervisors` | inline | any caller |
//! | `RegisterManager`, `UnregisterManager` | async task | super-user |
//! | `ListManagers`, `GetManager`, `GetSelf`, `HasRole` | inline | any caller |
//! | `AddRole`, `RemoveRole` | tracked task | super-user |
//! | `HealthCheck`, `Idle`, `TaskStatus` | inline | none |
//!
//! Async tasks answer with a task id; the matching `*Result(id)` call
//! returns the stored reply once the task is done.
//!
//! # Configuration
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `KEEL_REGION` | Yes | - | Region of this manager |
//! | `KEEL_LISTEN_ADDR` | No | `0.0.0.0:7100` | QUIC listen address |
//! | `KEEL_HOST` | No | `localhost` | Host name of this manager |
//! | `KEEL_SUPERVISOR_PORT` | No | `7101` | Port supervisors listen on |
//! | `KEEL_RESULT_DURATION_SECS` | No | `1800` | Task result retention |
//! | `KEEL_DATABASE_URL` | No | - | PostgreSQL store; in-memory when unset |
//! | `KEEL_USERS_FILE` | No | - | JSON credentials file |
//! | `KEEL_DOMAIN` | No | `keel.local` | Suffix of generated CNames |
//! | `KEEL_TLS_CERT`, `KEEL_TLS_KEY` | No | - | PEM files; self-signed when unset |
//! | `KEEL_SKIP_CERT_VERIFICATION` | No | `false` | Skip TLS checks towards supervisors |

/// Database migrations for the PostgreSQL registry store.
pub mod migrations;

/// Manager configuration loaded from environment variables.
pub mod config;

/// Error types for manager operations.
pub mod error;

/// Caller authentication and authorization scopes.
pub mod auth;

/// Key-value stores backing the registry.
pub mod store;

/// Typed cluster membership registry.
pub mod registry;

/// Supervisor probing, admission and retirement.
pub mod admission;

/// Task execution protocol and result tracking.
pub mod task;

/// Shared state handed to executors.
pub mod context;

/// One executor per RPC method.
pub mod executors;

/// Request routing.
pub mod gateway;

/// QUIC server for the manager protocol.
pub mod server;

/// Embeddable runtime for keel-manager.
pub mod runtime;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use error::{ManagerError, Result};
