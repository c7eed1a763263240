// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Keel SDK
//!
//! Typed async client for the keel manager over QUIC: routers, apps and
//! their depender data, supervisors, peer managers and their roles, plus
//! task polling.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use keel_sdk::{KeelSdk, RegisterRouterOptions, SdkConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sdk = KeelSdk::new(
//!     SdkConfig::from_env()?.with_credentials("root", "root-secret"),
//! )?;
//!
//! let health = sdk.health_check().await?;
//! println!("Manager region: {}", health.region);
//!
//! // Asynchronous calls return a task id
//! let id = sdk
//!     .register_router(RegisterRouterOptions::new("z1", "10.0.0.5"))
//!     .await?;
//! sdk.wait_for_task(&id, Duration::from_secs(30)).await?;
//! let router = sdk.register_router_result(&id).await?;
//! println!("Router CName: {}", router.cname);
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod types;

pub use client::{HEALTH_CHECK_TIMEOUT, KeelSdk};
pub use config::SdkConfig;
pub use error::{Result, SdkError};
pub use types::{
    App, EnvData, HealthStatus, HostGroups, Manager, RegisterAppOptions, RegisterManagerOptions,
    RegisterRouterOptions, RoleRef, Router, TaskInfo, TaskState,
};
