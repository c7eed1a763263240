// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Manager protocol messages.
//!
//! Every call is one [`RpcRequest`] frame answered by one [`RpcResponse`] frame.
//! Mutating calls answer with an [`AsyncReply`] carrying a task id; the paired
//! `*Result` call takes a [`TaskIdRequest`] and answers with the stored reply.
//!
//! Map fields use `BTreeMap` so that encoding a reply is deterministic.

use std::collections::BTreeMap;

/// Status string for a successful call.
pub const STATUS_OK: &str = "OK";
/// Status string for a failed call.
pub const STATUS_ERROR: &str = "ERROR";
/// Status string reported by a supervisor that has no free container slots.
pub const STATUS_FULL: &str = "FULL";
/// Status string for a call rejected by authorization.
pub const STATUS_UNAUTHORIZED: &str = "UNAUTHORIZED";
/// Status string for a supervisor whose region differs from the manager's.
pub const STATUS_REGION_MISMATCH: &str = "Region Mismatch";

// ============================================================================
// Common
// ============================================================================

/// Credentials embedded in every authenticated request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AuthArg {
    #[prost(string, tag = "1")]
    pub user: String,
    #[prost(string, tag = "2")]
    pub secret: String,
}

/// Error response.
///
/// `status` carries the reply status of a failed task (for example
/// `Region Mismatch`) and is empty for errors raised outside a task.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RpcError {
    #[prost(string, tag = "1")]
    pub code: String,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(string, tag = "3")]
    pub status: String,
}

/// Reply to an asynchronous call.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AsyncReply {
    #[prost(string, tag = "1")]
    pub id: String,
}

/// Task id argument for result polls and task status queries.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TaskIdRequest {
    #[prost(string, tag = "1")]
    pub id: String,
}

/// A list of host names (one group of a grouped listing).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HostList {
    #[prost(string, repeated, tag = "1")]
    pub hosts: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HealthCheckRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HealthCheckReply {
    #[prost(string, tag = "1")]
    pub status: String,
    #[prost(string, tag = "2")]
    pub region: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IdleRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IdleReply {
    #[prost(string, tag = "1")]
    pub status: String,
    #[prost(bool, tag = "2")]
    pub idle: bool,
}

/// Lifecycle state of a tracked task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum TaskState {
    Unknown = 0,
    Pending = 1,
    Running = 2,
    Done = 3,
    Error = 4,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TaskStatusReply {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub description: String,
    #[prost(enumeration = "TaskState", tag = "4")]
    pub state: i32,
    #[prost(string, tag = "5")]
    pub error: String,
}

// ============================================================================
// Routers
// ============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Router {
    #[prost(string, tag = "1")]
    pub zone: String,
    #[prost(string, tag = "2")]
    pub host: String,
    #[prost(string, tag = "3")]
    pub ip: String,
    #[prost(string, tag = "4")]
    pub cname: String,
    #[prost(bool, tag = "5")]
    pub internal: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterRouterRequest {
    #[prost(message, optional, tag = "1")]
    pub auth: Option<AuthArg>,
    #[prost(string, tag = "2")]
    pub zone: String,
    #[prost(string, tag = "3")]
    pub host: String,
    #[prost(string, tag = "4")]
    pub ip: String,
    #[prost(bool, tag = "5")]
    pub internal: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnregisterRouterRequest {
    #[prost(message, optional, tag = "1")]
    pub auth: Option<AuthArg>,
    #[prost(string, tag = "2")]
    pub zone: String,
    #[prost(string, tag = "3")]
    pub host: String,
    #[prost(bool, tag = "4")]
    pub internal: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetRouterRequest {
    #[prost(message, optional, tag = "1")]
    pub auth: Option<AuthArg>,
    #[prost(string, tag = "2")]
    pub zone: String,
    #[prost(string, tag = "3")]
    pub host: String,
    #[prost(bool, tag = "4")]
    pub internal: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RouterReply {
    #[prost(string, tag = "1")]
    pub status: String,
    #[prost(message, optional, tag = "2")]
    pub router: Option<Router>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListRoutersRequest {
    #[prost(message, optional, tag = "1")]
    pub auth: Option<AuthArg>,
    #[prost(bool, tag = "2")]
    pub internal: bool,
}

/// Router hosts grouped by zone.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListRoutersReply {
    #[prost(string, tag = "1")]
    pub status: String,
    #[prost(btree_map = "string, message", tag = "2")]
    pub routers: BTreeMap<String, HostList>,
}

// ============================================================================
// Apps
// ============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PortList {
    #[prost(uint32, repeated, tag = "1")]
    pub ports: Vec<u32>,
}

/// What one environment of an app exposes to the apps depending on it.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DependerEnvData {
    #[prost(string, tag = "1")]
    pub name: String,
    /// Host (or CIDR) to the ports it may reach.
    #[prost(btree_map = "string, message", tag = "2")]
    pub security_group: BTreeMap<String, PortList>,
    #[prost(string, tag = "3")]
    pub encrypted_data: String,
    #[prost(btree_map = "string, string", tag = "4")]
    pub data_map: BTreeMap<String, String>,
}

/// Per-environment depender data exposed to one specific app.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DependerAppData {
    #[prost(btree_map = "string, message", tag = "1")]
    pub envs: BTreeMap<String, DependerEnvData>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct App {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub repo: String,
    #[prost(string, tag = "3")]
    pub root: String,
    #[prost(string, tag = "4")]
    pub email: String,
    #[prost(bool, tag = "5")]
    pub internal: bool,
    #[prost(bool, tag = "6")]
    pub non_atlantis: bool,
    #[prost(btree_map = "string, message", tag = "7")]
    pub depender_env_data: BTreeMap<String, DependerEnvData>,
    #[prost(btree_map = "string, message", tag = "8")]
    pub depender_app_data: BTreeMap<String, DependerAppData>,
}

/// Used by both `RegisterApp` and `UpdateApp`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterAppRequest {
    #[prost(message, optional, tag = "1")]
    pub auth: Option<AuthArg>,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub repo: String,
    #[prost(string, tag = "4")]
    pub root: String,
    #[prost(string, tag = "5")]
    pub email: String,
    #[prost(bool, tag = "6")]
    pub internal: bool,
    #[prost(bool, tag = "7")]
    pub non_atlantis: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnregisterAppRequest {
    #[prost(message, optional, tag = "1")]
    pub auth: Option<AuthArg>,
    #[prost(string, tag = "2")]
    pub name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetAppRequest {
    #[prost(message, optional, tag = "1")]
    pub auth: Option<AuthArg>,
    #[prost(string, tag = "2")]
    pub name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AppReply {
    #[prost(string, tag = "1")]
    pub status: String,
    #[prost(message, optional, tag = "2")]
    pub app: Option<App>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListAppsRequest {
    #[prost(message, optional, tag = "1")]
    pub auth: Option<AuthArg>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListAppsReply {
    #[prost(string, tag = "1")]
    pub status: String,
    #[prost(string, repeated, tag = "2")]
    pub apps: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AddDependerEnvDataRequest {
    #[prost(message, optional, tag = "1")]
    pub auth: Option<AuthArg>,
    #[prost(string, tag = "2")]
    pub app: String,
    #[prost(message, optional, tag = "3")]
    pub data: Option<DependerEnvData>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RemoveDependerEnvDataRequest {
    #[prost(message, optional, tag = "1")]
    pub auth: Option<AuthArg>,
    #[prost(string, tag = "2")]
    pub app: String,
    #[prost(string, tag = "3")]
    pub env: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AddDependerAppDataRequest {
    #[prost(message, optional, tag = "1")]
    pub auth: Option<AuthArg>,
    #[prost(string, tag = "2")]
    pub app: String,
    #[prost(string, tag = "3")]
    pub depender: String,
    #[prost(message, optional, tag = "4")]
    pub data: Option<DependerEnvData>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RemoveDependerAppDataRequest {
    #[prost(message, optional, tag = "1")]
    pub auth: Option<AuthArg>,
    #[prost(string, tag = "2")]
    pub app: String,
    #[prost(string, tag = "3")]
    pub depender: String,
    #[prost(string, tag = "4")]
    pub env: String,
}

// ============================================================================
// Supervisors
// ============================================================================

/// Used by both `RegisterSupervisor` and `UnregisterSupervisor`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterSupervisorRequest {
    #[prost(message, optional, tag = "1")]
    pub auth: Option<AuthArg>,
    #[prost(string, tag = "2")]
    pub host: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SupervisorReply {
    #[prost(string, tag = "1")]
    pub status: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListSupervisorsRequest {
    #[prost(message, optional, tag = "1")]
    pub auth: Option<AuthArg>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListSupervisorsReply {
    #[prost(string, tag = "1")]
    pub status: String,
    #[prost(string, repeated, tag = "2")]
    pub supervisors: Vec<String>,
}

// ============================================================================
// Managers
// ============================================================================

/// Grants of one role, keyed by type name.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RoleGrants {
    #[prost(btree_map = "string, bool", tag = "1")]
    pub types: BTreeMap<String, bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Manager {
    #[prost(string, tag = "1")]
    pub region: String,
    #[prost(string, tag = "2")]
    pub host: String,
    #[prost(string, tag = "3")]
    pub ip: String,
    #[prost(string, tag = "4")]
    pub manager_cname: String,
    #[prost(string, tag = "5")]
    pub registry_cname: String,
    #[prost(btree_map = "string, message", tag = "6")]
    pub roles: BTreeMap<String, RoleGrants>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterManagerRequest {
    #[prost(message, optional, tag = "1")]
    pub auth: Option<AuthArg>,
    #[prost(string, tag = "2")]
    pub region: String,
    /// Defaults to `ip` when empty.
    #[prost(string, tag = "3")]
    pub host: String,
    #[prost(string, tag = "4")]
    pub ip: String,
    #[prost(string, tag = "5")]
    pub manager_cname: String,
    #[prost(string, tag = "6")]
    pub registry_cname: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnregisterManagerRequest {
    #[prost(message, optional, tag = "1")]
    pub auth: Option<AuthArg>,
    #[prost(string, tag = "2")]
    pub region: String,
    /// Defaults to `ip` when empty.
    #[prost(string, tag = "3")]
    pub host: String,
    #[prost(string, tag = "4")]
    pub ip: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ManagerReply {
    #[prost(string, tag = "1")]
    pub status: String,
    #[prost(message, optional, tag = "2")]
    pub manager: Option<Manager>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListManagersRequest {
    #[prost(message, optional, tag = "1")]
    pub auth: Option<AuthArg>,
}

/// Manager hosts grouped by region.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListManagersReply {
    #[prost(string, tag = "1")]
    pub status: String,
    #[prost(btree_map = "string, message", tag = "2")]
    pub managers: BTreeMap<String, HostList>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetManagerRequest {
    #[prost(message, optional, tag = "1")]
    pub auth: Option<AuthArg>,
    #[prost(string, tag = "2")]
    pub region: String,
    #[prost(string, tag = "3")]
    pub host: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetSelfRequest {
    #[prost(message, optional, tag = "1")]
    pub auth: Option<AuthArg>,
}

/// Used by `AddRole`, `RemoveRole` and `HasRole`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RoleRequest {
    #[prost(message, optional, tag = "1")]
    pub auth: Option<AuthArg>,
    #[prost(string, tag = "2")]
    pub region: String,
    #[prost(string, tag = "3")]
    pub host: String,
    #[prost(string, tag = "4")]
    pub role: String,
    #[prost(string, tag = "5")]
    pub type_name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HasRoleReply {
    #[prost(string, tag = "1")]
    pub status: String,
    #[prost(bool, tag = "2")]
    pub has_role: bool,
}

// ============================================================================
// Envelopes
// ============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RpcRequest {
    #[prost(
        oneof = "rpc_request::Request",
        tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32, 33, 34"
    )]
    pub request: Option<rpc_request::Request>,
}

pub mod rpc_request {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Request {
        #[prost(message, tag = "1")]
        HealthCheck(super::HealthCheckRequest),
        #[prost(message, tag = "2")]
        RegisterRouter(super::RegisterRouterRequest),
        #[prost(message, tag = "3")]
        RegisterRouterResult(super::TaskIdRequest),
        #[prost(message, tag = "4")]
        UnregisterRouter(super::UnregisterRouterRequest),
        #[prost(message, tag = "5")]
        UnregisterRouterResult(super::TaskIdRequest),
        #[prost(message, tag = "6")]
        GetRouter(super::GetRouterRequest),
        #[prost(message, tag = "7")]
        ListRouters(super::ListRoutersRequest),
        #[prost(message, tag = "8")]
        RegisterApp(super::RegisterAppRequest),
        #[prost(message, tag = "9")]
        UpdateApp(super::RegisterAppRequest),
        #[prost(message, tag = "10")]
        UnregisterApp(super::UnregisterAppRequest),
        #[prost(message, tag = "11")]
        GetApp(super::GetAppRequest),
        #[prost(message, tag = "12")]
        ListRegisteredApps(super::ListAppsRequest),
        #[prost(message, tag = "13")]
        ListAuthorizedRegisteredApps(super::ListAppsRequest),
        #[prost(message, tag = "14")]
        RegisterSupervisor(super::RegisterSupervisorRequest),
        #[prost(message, tag = "15")]
        RegisterSupervisorResult(super::TaskIdRequest),
        #[prost(message, tag = "16")]
        UnregisterSupervisor(super::RegisterSupervisorRequest),
        #[prost(message, tag = "17")]
        UnregisterSupervisorResult(super::TaskIdRequest),
        #[prost(message, tag = "18")]
        ListSupervisors(super::ListSupervisorsRequest),
        #[prost(message, tag = "19")]
        RegisterManager(super::RegisterManagerRequest),
        #[prost(message, tag = "20")]
        RegisterManagerResult(super::TaskIdRequest),
        #[prost(message, tag = "21")]
        UnregisterManager(super::UnregisterManagerRequest),
        #[prost(message, tag = "22")]
        UnregisterManagerResult(super::TaskIdRequest),
        #[prost(message, tag = "23")]
        ListManagers(super::ListManagersRequest),
        #[prost(message, tag = "24")]
        GetManager(super::GetManagerRequest),
        #[prost(message, tag = "25")]
        GetSelf(super::GetSelfRequest),
        #[prost(message, tag = "26")]
        AddRole(super::RoleRequest),
        #[prost(message, tag = "27")]
        RemoveRole(super::RoleRequest),
        #[prost(message, tag = "28")]
        HasRole(super::RoleRequest),
        #[prost(message, tag = "29")]
        AddDependerEnvData(super::AddDependerEnvDataRequest),
        #[prost(message, tag = "30")]
        RemoveDependerEnvData(super::RemoveDependerEnvDataRequest),
        #[prost(message, tag = "31")]
        AddDependerAppData(super::AddDependerAppDataRequest),
        #[prost(message, tag = "32")]
        RemoveDependerAppData(super::RemoveDependerAppDataRequest),
        #[prost(message, tag = "33")]
        Idle(super::IdleRequest),
        #[prost(message, tag = "34")]
        TaskStatus(super::TaskIdRequest),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RpcResponse {
    #[prost(
        oneof = "rpc_response::Response",
        tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14"
    )]
    pub response: Option<rpc_response::Response>,
}

pub mod rpc_response {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Response {
        #[prost(message, tag = "1")]
        Error(super::RpcError),
        #[prost(message, tag = "2")]
        HealthCheck(super::HealthCheckReply),
        #[prost(message, tag = "3")]
        Async(super::AsyncReply),
        #[prost(message, tag = "4")]
        Router(super::RouterReply),
        #[prost(message, tag = "5")]
        ListRouters(super::ListRoutersReply),
        #[prost(message, tag = "6")]
        App(super::AppReply),
        #[prost(message, tag = "7")]
        ListApps(super::ListAppsReply),
        #[prost(message, tag = "8")]
        Supervisor(super::SupervisorReply),
        #[prost(message, tag = "9")]
        ListSupervisors(super::ListSupervisorsReply),
        #[prost(message, tag = "10")]
        Manager(super::ManagerReply),
        #[prost(message, tag = "11")]
        ListManagers(super::ListManagersReply),
        #[prost(message, tag = "12")]
        HasRole(super::HasRoleReply),
        #[prost(message, tag = "13")]
        Idle(super::IdleReply),
        #[prost(message, tag = "14")]
        TaskStatus(super::TaskStatusReply),
    }
}

impl AuthArg {
    /// Build credentials for `user`.
    pub fn new(user: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            secret: secret.into(),
        }
    }
}

impl RpcError {
    /// Create an error that did not come out of a task.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status: String::new(),
        }
    }
}
