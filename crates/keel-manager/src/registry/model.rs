// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Registry entity types as stored, and their wire forms.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use keel_protocol::manager_proto as proto;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterEntry {
    pub zone: String,
    pub host: String,
    pub ip: String,
    pub cname: String,
    pub internal: bool,
}

impl From<RouterEntry> for proto::Router {
    fn from(r: RouterEntry) -> Self {
        proto::Router {
            zone: r.zone,
            host: r.host,
            ip: r.ip,
            cname: r.cname,
            internal: r.internal,
        }
    }
}

/// What one environment of an app exposes to the apps depending on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependerEnvData {
    pub name: String,
    /// Host (or CIDR) to allowed ports
    #[serde(default)]
    pub security_group: BTreeMap<String, Vec<u32>>,
    #[serde(default)]
    pub encrypted_data: String,
    #[serde(default)]
    pub data_map: BTreeMap<String, String>,
}

impl From<proto::DependerEnvData> for DependerEnvData {
    fn from(d: proto::DependerEnvData) -> Self {
        Self {
            name: d.name,
            security_group: d
                .security_group
                .into_iter()
                .map(|(host, ports)| (host, ports.ports))
                .collect(),
            encrypted_data: d.encrypted_data,
            data_map: d.data_map,
        }
    }
}

impl From<DependerEnvData> for proto::DependerEnvData {
    fn from(d: DependerEnvData) -> Self {
        Self {
            name: d.name,
            security_group: d
                .security_group
                .into_iter()
                .map(|(host, ports)| (host, proto::PortList { ports }))
                .collect(),
            encrypted_data: d.encrypted_data,
            data_map: d.data_map,
        }
    }
}

/// Per-environment data another app exposes to this one, keyed by env name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependerAppData {
    pub envs: BTreeMap<String, DependerEnvData>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppEntry {
    pub name: String,
    pub repo: String,
    pub root: String,
    /// Owner identity
    pub email: String,
    #[serde(default)]
    pub internal: bool,
    #[serde(default)]
    pub non_atlantis: bool,
    /// Env name to the data that env exposes
    #[serde(default)]
    pub depender_env_data: BTreeMap<String, DependerEnvData>,
    /// Depended-upon app name to what it exposes to this app
    #[serde(default)]
    pub depender_app_data: BTreeMap<String, DependerAppData>,
}

impl AppEntry {
    /// Insert or replace the data exposed by one environment.
    pub fn set_env_data(&mut self, data: DependerEnvData) {
        self.depender_env_data.insert(data.name.clone(), data);
    }

    pub fn remove_env_data(&mut self, env: &str) -> bool {
        self.depender_env_data.remove(env).is_some()
    }

    /// Insert or replace what `depender` exposes to this app for one environment.
    pub fn set_app_data(&mut self, depender: &str, data: DependerEnvData) {
        self.depender_app_data
            .entry(depender.to_string())
            .or_default()
            .envs
            .insert(data.name.clone(), data);
    }

    /// Remove one environment of `depender`. The depender entry goes away
    /// with its last environment.
    pub fn remove_app_data(&mut self, depender: &str, env: &str) -> bool {
        let Some(app_data) = self.depender_app_data.get_mut(depender) else {
            return false;
        };
        let removed = app_data.envs.remove(env).is_some();
        if app_data.envs.is_empty() {
            self.depender_app_data.remove(depender);
        }
        removed
    }
}

impl From<AppEntry> for proto::App {
    fn from(a: AppEntry) -> Self {
        proto::App {
            name: a.name,
            repo: a.repo,
            root: a.root,
            email: a.email,
            internal: a.internal,
            non_atlantis: a.non_atlantis,
            depender_env_data: a
                .depender_env_data
                .into_iter()
                .map(|(env, data)| (env, data.into()))
                .collect(),
            depender_app_data: a
                .depender_app_data
                .into_iter()
                .map(|(app, data)| {
                    let envs = data
                        .envs
                        .into_iter()
                        .map(|(env, d)| (env, d.into()))
                        .collect();
                    (app, proto::DependerAppData { envs })
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorEntry {
    pub host: String,
    pub last_touch: DateTime<Utc>,
}

/// Type name to grant flag, for one role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleGrants {
    pub types: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerEntry {
    pub region: String,
    pub host: String,
    pub ip: String,
    pub manager_cname: String,
    pub registry_cname: String,
    #[serde(default)]
    pub roles: BTreeMap<String, RoleGrants>,
}

impl ManagerEntry {
    pub fn grant(&mut self, role: &str, type_name: &str) {
        self.roles
            .entry(role.to_string())
            .or_default()
            .types
            .insert(type_name.to_string(), true);
    }

    /// Drop a grant. A role without types is removed.
    pub fn revoke(&mut self, role: &str, type_name: &str) -> bool {
        let Some(grants) = self.roles.get_mut(role) else {
            return false;
        };
        let removed = grants.types.remove(type_name).is_some();
        if grants.types.is_empty() {
            self.roles.remove(role);
        }
        removed
    }

    pub fn has_role(&self, role: &str, type_name: &str) -> bool {
        self.roles
            .get(role)
            .and_then(|grants| grants.types.get(type_name))
            .copied()
            .unwrap_or(false)
    }
}

impl From<ManagerEntry> for proto::Manager {
    fn from(m: ManagerEntry) -> Self {
        proto::Manager {
            region: m.region,
            host: m.host,
            ip: m.ip,
            manager_cname: m.manager_cname,
            registry_cname: m.registry_cname,
            roles: m
                .roles
                .into_iter()
                .map(|(role, grants)| (role, proto::RoleGrants { types: grants.types }))
                .collect(),
        }
    }
}
