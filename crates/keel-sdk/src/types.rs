// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! High-level types for the keel SDK.

use std::collections::BTreeMap;

use keel_protocol::manager_proto::{self, DependerEnvData, PortList};
use serde::{Deserialize, Serialize};

pub use keel_protocol::manager_proto::{App, Manager, Router};

/// Lifecycle state of a manager task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// State unknown.
    Unknown,
    /// Recorded, not yet started.
    Pending,
    /// Executing.
    Running,
    /// Finished successfully.
    Done,
    /// Finished with an error.
    Error,
}

impl TaskState {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Done | TaskState::Error)
    }
}

impl From<i32> for TaskState {
    fn from(value: i32) -> Self {
        match manager_proto::TaskState::try_from(value) {
            Ok(manager_proto::TaskState::Pending) => TaskState::Pending,
            Ok(manager_proto::TaskState::Running) => TaskState::Running,
            Ok(manager_proto::TaskState::Done) => TaskState::Done,
            Ok(manager_proto::TaskState::Error) => TaskState::Error,
            _ => TaskState::Unknown,
        }
    }
}

/// Health of a manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    /// Region the manager serves.
    pub region: String,
}

/// Status of one task, as reported by `TaskStatus`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    pub id: String,
    /// Method that created the task, e.g. `RegisterSupervisor`.
    pub name: String,
    pub description: String,
    pub state: TaskState,
    /// Error message of a failed task.
    pub error: Option<String>,
}

impl From<manager_proto::TaskStatusReply> for TaskInfo {
    fn from(reply: manager_proto::TaskStatusReply) -> Self {
        Self {
            id: reply.id,
            name: reply.name,
            description: reply.description,
            state: TaskState::from(reply.state),
            error: (!reply.error.is_empty()).then_some(reply.error),
        }
    }
}

/// Options for registering a router.
#[derive(Debug, Clone)]
pub struct RegisterRouterOptions {
    pub zone: String,
    pub ip: String,
    /// Defaults to `ip` on the manager when unset.
    pub host: Option<String>,
    pub internal: bool,
}

impl RegisterRouterOptions {
    pub fn new(zone: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            ip: ip.into(),
            host: None,
            internal: false,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Register an internal router instead of an external one.
    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }
}

/// Options for registering or updating an app.
#[derive(Debug, Clone)]
pub struct RegisterAppOptions {
    pub name: String,
    pub repo: String,
    pub root: String,
    /// Owner email. On update, unset keeps the current owner.
    pub email: Option<String>,
    pub internal: bool,
    pub non_atlantis: bool,
}

impl RegisterAppOptions {
    pub fn new(name: impl Into<String>, repo: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repo: repo.into(),
            root: root.into(),
            email: None,
            internal: false,
            non_atlantis: false,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    pub fn non_atlantis(mut self) -> Self {
        self.non_atlantis = true;
        self
    }
}

/// Options for registering a peer manager.
#[derive(Debug, Clone)]
pub struct RegisterManagerOptions {
    pub region: String,
    pub ip: String,
    pub host: Option<String>,
    /// Generated by the manager when unset.
    pub manager_cname: Option<String>,
    /// Generated by the manager when unset.
    pub registry_cname: Option<String>,
}

impl RegisterManagerOptions {
    pub fn new(region: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ip: ip.into(),
            host: None,
            manager_cname: None,
            registry_cname: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_manager_cname(mut self, cname: impl Into<String>) -> Self {
        self.manager_cname = Some(cname.into());
        self
    }

    pub fn with_registry_cname(mut self, cname: impl Into<String>) -> Self {
        self.registry_cname = Some(cname.into());
        self
    }
}

/// Data an app exposes to its dependers for one environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvData {
    /// Environment name.
    pub name: String,
    /// CIDR or security group name to allowed ports.
    pub security_group: BTreeMap<String, Vec<u32>>,
    pub encrypted_data: String,
    pub data_map: BTreeMap<String, String>,
}

impl EnvData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_ports(mut self, group: impl Into<String>, ports: Vec<u32>) -> Self {
        self.security_group.insert(group.into(), ports);
        self
    }

    pub fn with_encrypted_data(mut self, data: impl Into<String>) -> Self {
        self.encrypted_data = data.into();
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data_map.insert(key.into(), value.into());
        self
    }
}

impl From<EnvData> for DependerEnvData {
    fn from(data: EnvData) -> Self {
        Self {
            name: data.name,
            security_group: data
                .security_group
                .into_iter()
                .map(|(group, ports)| (group, PortList { ports }))
                .collect(),
            encrypted_data: data.encrypted_data,
            data_map: data.data_map,
        }
    }
}

impl From<DependerEnvData> for EnvData {
    fn from(data: DependerEnvData) -> Self {
        Self {
            name: data.name,
            security_group: data
                .security_group
                .into_iter()
                .map(|(group, list)| (group, list.ports))
                .collect(),
            encrypted_data: data.encrypted_data,
            data_map: data.data_map,
        }
    }
}

/// A role grant on a manager: `role` with one `type_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRef {
    pub region: String,
    pub host: String,
    pub role: String,
    pub type_name: String,
}

impl RoleRef {
    pub fn new(
        region: impl Into<String>,
        host: impl Into<String>,
        role: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            host: host.into(),
            role: role.into(),
            type_name: type_name.into(),
        }
    }
}

/// Host names grouped by zone or region.
pub type HostGroups = BTreeMap<String, Vec<String>>;

pub(crate) fn host_groups(groups: BTreeMap<String, manager_proto::HostList>) -> HostGroups {
    groups
        .into_iter()
        .map(|(key, list)| (key, list.hosts))
        .collect()
}
