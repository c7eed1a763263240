// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Router executors.

use async_trait::async_trait;
use keel_protocol::manager_proto::{
    GetRouterRequest, ListRoutersReply, ListRoutersRequest, RegisterRouterRequest, RouterReply,
    UnregisterRouterRequest,
};

use super::{authorize_super_user, dns_label, host_lists, host_or_ip, require, simple_authorize};
use crate::context::ControlPlaneContext;
use crate::error::{ManagerError, Result};
use crate::registry::RouterEntry;
use crate::task::Executor;

/// `{host}.{zone}.routers.{domain}`, or `internal-routers` for internal ones.
pub fn router_cname(host: &str, zone: &str, internal: bool, domain: &str) -> String {
    let kind = if internal { "internal-routers" } else { "routers" };
    format!("{}.{}.{}.{}", dns_label(host), zone, kind, domain)
}

fn router_missing(zone: &str, host: &str) -> ManagerError {
    ManagerError::NotFound(format!("Router {} in zone {} does not exist", host, zone))
}

pub struct RegisterRouter {
    pub request: RegisterRouterRequest,
    domain: String,
}

impl RegisterRouter {
    pub fn new(request: RegisterRouterRequest, domain: impl Into<String>) -> Self {
        Self {
            request,
            domain: domain.into(),
        }
    }
}

#[async_trait]
impl Executor for RegisterRouter {
    type Reply = RouterReply;

    fn name(&self) -> &'static str {
        "RegisterRouter"
    }

    fn description(&self) -> String {
        format!("{} in {}", self.request.ip, self.request.zone)
    }

    fn validate(&self) -> Result<()> {
        require(&self.request.ip, "Please specify an IP to register")?;
        require(&self.request.zone, "Please specify a zone")
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()> {
        authorize_super_user(ctx, self.request.auth.as_ref()).await?;
        Ok(())
    }

    async fn execute(&self, ctx: &ControlPlaneContext, reply: &mut RouterReply) -> Result<()> {
        let req = &self.request;
        let host = host_or_ip(&req.host, &req.ip);
        let router = RouterEntry {
            zone: req.zone.clone(),
            host: host.to_string(),
            ip: req.ip.clone(),
            cname: router_cname(host, &req.zone, req.internal, &self.domain),
            internal: req.internal,
        };
        ctx.registry().put_router(&router).await?;
        reply.router = Some(router.into());
        Ok(())
    }
}

pub struct UnregisterRouter {
    pub request: UnregisterRouterRequest,
}

#[async_trait]
impl Executor for UnregisterRouter {
    type Reply = RouterReply;

    fn name(&self) -> &'static str {
        "UnregisterRouter"
    }

    fn description(&self) -> String {
        format!("{} in {}", self.request.host, self.request.zone)
    }

    fn validate(&self) -> Result<()> {
        require(&self.request.host, "Please specify a host to unregister")?;
        require(&self.request.zone, "Please specify a zone")
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()> {
        authorize_super_user(ctx, self.request.auth.as_ref()).await?;
        Ok(())
    }

    async fn execute(&self, ctx: &ControlPlaneContext, reply: &mut RouterReply) -> Result<()> {
        let req = &self.request;
        let registry = ctx.registry();
        let router = registry
            .get_router(req.internal, &req.zone, &req.host)
            .await?
            .ok_or_else(|| router_missing(&req.zone, &req.host))?;
        if !registry.delete_router(req.internal, &req.zone, &req.host).await? {
            return Err(router_missing(&req.zone, &req.host));
        }
        reply.router = Some(router.into());
        Ok(())
    }
}

pub struct GetRouter {
    pub request: GetRouterRequest,
}

#[async_trait]
impl Executor for GetRouter {
    type Reply = RouterReply;

    fn name(&self) -> &'static str {
        "GetRouter"
    }

    fn description(&self) -> String {
        format!("{} in {}", self.request.host, self.request.zone)
    }

    fn validate(&self) -> Result<()> {
        require(&self.request.host, "Please specify a host")?;
        require(&self.request.zone, "Please specify a zone")
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()> {
        simple_authorize(ctx, self.request.auth.as_ref()).await?;
        Ok(())
    }

    async fn execute(&self, ctx: &ControlPlaneContext, reply: &mut RouterReply) -> Result<()> {
        let req = &self.request;
        let router = ctx
            .registry()
            .get_router(req.internal, &req.zone, &req.host)
            .await?
            .ok_or_else(|| router_missing(&req.zone, &req.host))?;
        reply.router = Some(router.into());
        Ok(())
    }
}

pub struct ListRouters {
    pub request: ListRoutersRequest,
}

#[async_trait]
impl Executor for ListRouters {
    type Reply = ListRoutersReply;

    fn name(&self) -> &'static str {
        "ListRouters"
    }

    fn description(&self) -> String {
        "ListRouters".to_string()
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()> {
        simple_authorize(ctx, self.request.auth.as_ref()).await?;
        Ok(())
    }

    async fn execute(&self, ctx: &ControlPlaneContext, reply: &mut ListRoutersReply) -> Result<()> {
        let zones = ctx.registry().list_routers(self.request.internal).await?;
        reply.routers = host_lists(zones);
        Ok(())
    }
}
