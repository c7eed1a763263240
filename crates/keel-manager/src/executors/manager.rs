// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Manager executors: peer registration, lookup and role grants.

use async_trait::async_trait;
use keel_protocol::manager_proto::{
    GetManagerRequest, GetSelfRequest, HasRoleReply, ListManagersReply, ListManagersRequest,
    ManagerReply, RegisterManagerRequest, RoleRequest, UnregisterManagerRequest,
};

use super::{authorize_super_user, dns_label, host_lists, host_or_ip, require, simple_authorize};
use crate::context::ControlPlaneContext;
use crate::error::{ManagerError, Result};
use crate::registry::ManagerEntry;
use crate::task::Executor;

/// `{host}.{region}.managers.{domain}`
pub fn manager_cname(host: &str, region: &str, domain: &str) -> String {
    format!("{}.{}.managers.{}", dns_label(host), region, domain)
}

/// `registry.{region}.{domain}`
pub fn registry_cname(region: &str, domain: &str) -> String {
    format!("registry.{}.{}", region, domain)
}

fn manager_missing(region: &str, host: &str) -> ManagerError {
    ManagerError::NotFound(format!(
        "Manager {} in region {} does not exist",
        host, region
    ))
}

async fn load_manager(ctx: &ControlPlaneContext, region: &str, host: &str) -> Result<ManagerEntry> {
    ctx.registry()
        .get_manager(region, host)
        .await?
        .ok_or_else(|| manager_missing(region, host))
}

/// Record a peer manager. Re-registering keeps its role grants.
pub struct RegisterManager {
    pub request: RegisterManagerRequest,
    port: u16,
    domain: String,
}

impl RegisterManager {
    pub fn new(request: RegisterManagerRequest, port: u16, domain: impl Into<String>) -> Self {
        Self {
            request,
            port,
            domain: domain.into(),
        }
    }
}

#[async_trait]
impl Executor for RegisterManager {
    type Reply = ManagerReply;

    fn name(&self) -> &'static str {
        "RegisterManager"
    }

    fn description(&self) -> String {
        format!("{}:{} in {}", self.request.ip, self.port, self.request.region)
    }

    fn validate(&self) -> Result<()> {
        require(&self.request.ip, "Please specify an IP to register")?;
        require(&self.request.region, "Please specify a Region to register")
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()> {
        authorize_super_user(ctx, self.request.auth.as_ref()).await?;
        Ok(())
    }

    async fn execute(&self, ctx: &ControlPlaneContext, reply: &mut ManagerReply) -> Result<()> {
        let req = &self.request;
        let host = host_or_ip(&req.host, &req.ip);
        let manager = ctx
            .registry()
            .update_manager(&req.region, host, |current| {
                Ok(ManagerEntry {
                    region: req.region.clone(),
                    host: host.to_string(),
                    ip: req.ip.clone(),
                    manager_cname: if req.manager_cname.is_empty() {
                        manager_cname(host, &req.region, &self.domain)
                    } else {
                        req.manager_cname.clone()
                    },
                    registry_cname: if req.registry_cname.is_empty() {
                        registry_cname(&req.region, &self.domain)
                    } else {
                        req.registry_cname.clone()
                    },
                    roles: current.map(|existing| existing.roles).unwrap_or_default(),
                })
            })
            .await?;
        reply.manager = Some(manager.into());
        Ok(())
    }
}

pub struct UnregisterManager {
    pub request: UnregisterManagerRequest,
    port: u16,
}

impl UnregisterManager {
    pub fn new(request: UnregisterManagerRequest, port: u16) -> Self {
        Self { request, port }
    }
}

#[async_trait]
impl Executor for UnregisterManager {
    type Reply = ManagerReply;

    fn name(&self) -> &'static str {
        "UnregisterManager"
    }

    fn description(&self) -> String {
        format!("{}:{} in {}", self.request.ip, self.port, self.request.region)
    }

    fn validate(&self) -> Result<()> {
        require(&self.request.ip, "Please specify an IP to unregister")?;
        require(&self.request.region, "Please specify a region to unregister")
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()> {
        authorize_super_user(ctx, self.request.auth.as_ref()).await?;
        Ok(())
    }

    async fn execute(&self, ctx: &ControlPlaneContext, reply: &mut ManagerReply) -> Result<()> {
        let req = &self.request;
        let host = host_or_ip(&req.host, &req.ip);
        let manager = load_manager(ctx, &req.region, host).await?;
        if !ctx.registry().delete_manager(&req.region, host).await? {
            return Err(manager_missing(&req.region, host));
        }
        reply.manager = Some(manager.into());
        Ok(())
    }
}

pub struct ListManagers {
    pub request: ListManagersRequest,
}

#[async_trait]
impl Executor for ListManagers {
    type Reply = ListManagersReply;

    fn name(&self) -> &'static str {
        "ListManagers"
    }

    fn description(&self) -> String {
        "ListManagers".to_string()
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()> {
        simple_authorize(ctx, self.request.auth.as_ref()).await?;
        Ok(())
    }

    async fn execute(&self, ctx: &ControlPlaneContext, reply: &mut ListManagersReply) -> Result<()> {
        reply.managers = host_lists(ctx.registry().list_managers().await?);
        Ok(())
    }
}

pub struct GetManager {
    pub request: GetManagerRequest,
}

#[async_trait]
impl Executor for GetManager {
    type Reply = ManagerReply;

    fn name(&self) -> &'static str {
        "GetManager"
    }

    fn description(&self) -> String {
        format!("{} in {}", self.request.host, self.request.region)
    }

    fn validate(&self) -> Result<()> {
        require(&self.request.region, "Please specify a region")?;
        require(&self.request.host, "Please specify a host")
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()> {
        simple_authorize(ctx, self.request.auth.as_ref()).await?;
        Ok(())
    }

    async fn execute(&self, ctx: &ControlPlaneContext, reply: &mut ManagerReply) -> Result<()> {
        let manager = load_manager(ctx, &self.request.region, &self.request.host).await?;
        reply.manager = Some(manager.into());
        Ok(())
    }
}

/// The registry entry of the manager answering the call.
pub struct GetSelf {
    pub request: GetSelfRequest,
}

#[async_trait]
impl Executor for GetSelf {
    type Reply = ManagerReply;

    fn name(&self) -> &'static str {
        "GetSelf"
    }

    fn description(&self) -> String {
        "GetSelf".to_string()
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()> {
        simple_authorize(ctx, self.request.auth.as_ref()).await?;
        Ok(())
    }

    async fn execute(&self, ctx: &ControlPlaneContext, reply: &mut ManagerReply) -> Result<()> {
        let manager = load_manager(ctx, ctx.region(), ctx.host()).await?;
        reply.manager = Some(manager.into());
        Ok(())
    }
}

fn validate_role(request: &RoleRequest) -> Result<()> {
    require(&request.region, "Please specify a region")?;
    require(&request.host, "Please specify a host")?;
    require(&request.role, "Please specify a role")?;
    require(&request.type_name, "Please specify a type")
}

fn role_description(request: &RoleRequest) -> String {
    format!(
        "{}/{} on {} in {}",
        request.role, request.type_name, request.host, request.region
    )
}

pub struct AddRole {
    pub request: RoleRequest,
}

#[async_trait]
impl Executor for AddRole {
    type Reply = ManagerReply;

    fn name(&self) -> &'static str {
        "AddRole"
    }

    fn description(&self) -> String {
        role_description(&self.request)
    }

    fn validate(&self) -> Result<()> {
        validate_role(&self.request)
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()> {
        authorize_super_user(ctx, self.request.auth.as_ref()).await?;
        Ok(())
    }

    async fn execute(&self, ctx: &ControlPlaneContext, reply: &mut ManagerReply) -> Result<()> {
        let req = &self.request;
        let manager = ctx
            .registry()
            .update_manager(&req.region, &req.host, |current| {
                let mut manager = current.ok_or_else(|| manager_missing(&req.region, &req.host))?;
                manager.grant(&req.role, &req.type_name);
                Ok(manager)
            })
            .await?;
        reply.manager = Some(manager.into());
        Ok(())
    }
}

pub struct RemoveRole {
    pub request: RoleRequest,
}

#[async_trait]
impl Executor for RemoveRole {
    type Reply = ManagerReply;

    fn name(&self) -> &'static str {
        "RemoveRole"
    }

    fn description(&self) -> String {
        role_description(&self.request)
    }

    fn validate(&self) -> Result<()> {
        validate_role(&self.request)
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()> {
        authorize_super_user(ctx, self.request.auth.as_ref()).await?;
        Ok(())
    }

    async fn execute(&self, ctx: &ControlPlaneContext, reply: &mut ManagerReply) -> Result<()> {
        let req = &self.request;
        let manager = ctx
            .registry()
            .update_manager(&req.region, &req.host, |current| {
                let mut manager = current.ok_or_else(|| manager_missing(&req.region, &req.host))?;
                if !manager.revoke(&req.role, &req.type_name) {
                    return Err(ManagerError::NotFound(format!(
                        "Manager {} does not have role {}/{}",
                        req.host, req.role, req.type_name
                    )));
                }
                Ok(manager)
            })
            .await?;
        reply.manager = Some(manager.into());
        Ok(())
    }
}

pub struct HasRole {
    pub request: RoleRequest,
}

#[async_trait]
impl Executor for HasRole {
    type Reply = HasRoleReply;

    fn name(&self) -> &'static str {
        "HasRole"
    }

    fn description(&self) -> String {
        role_description(&self.request)
    }

    fn validate(&self) -> Result<()> {
        validate_role(&self.request)
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()> {
        simple_authorize(ctx, self.request.auth.as_ref()).await?;
        Ok(())
    }

    async fn execute(&self, ctx: &ControlPlaneContext, reply: &mut HasRoleReply) -> Result<()> {
        let req = &self.request;
        let manager = load_manager(ctx, &req.region, &req.host).await?;
        reply.has_role = manager.has_role(&req.role, &req.type_name);
        Ok(())
    }
}
