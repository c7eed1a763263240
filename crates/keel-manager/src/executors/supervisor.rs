// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Supervisor executors.

use async_trait::async_trait;
use keel_protocol::manager_proto::{
    ListSupervisorsReply, ListSupervisorsRequest, RegisterSupervisorRequest, SupervisorReply,
};

use super::{authorize_super_user, require, simple_authorize};
use crate::admission;
use crate::context::ControlPlaneContext;
use crate::error::Result;
use crate::task::{Executor, Reply};

/// Admit a supervisor after probing it.
pub struct RegisterSupervisor {
    pub request: RegisterSupervisorRequest,
    supervisor_port: u16,
}

impl RegisterSupervisor {
    pub fn new(request: RegisterSupervisorRequest, supervisor_port: u16) -> Self {
        Self {
            request,
            supervisor_port,
        }
    }
}

#[async_trait]
impl Executor for RegisterSupervisor {
    type Reply = SupervisorReply;

    fn name(&self) -> &'static str {
        "RegisterSupervisor"
    }

    fn description(&self) -> String {
        format!("{}:{}", self.request.host, self.supervisor_port)
    }

    fn validate(&self) -> Result<()> {
        require(&self.request.host, "Please specify a host to register")
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()> {
        authorize_super_user(ctx, self.request.auth.as_ref()).await?;
        Ok(())
    }

    async fn execute(&self, ctx: &ControlPlaneContext, reply: &mut SupervisorReply) -> Result<()> {
        let admitted = admission::admit(
            ctx.supervisors(),
            ctx.registry(),
            &self.request.host,
            ctx.region(),
        )
        .await;

        match admitted {
            Ok((status, _entry)) => {
                reply.set_status(&status);
                Ok(())
            }
            Err(e) => {
                if let Some(status) = admission::rejection_status(&e) {
                    reply.set_status(status);
                }
                Err(e)
            }
        }
    }
}

/// Tear down and forget a supervisor. Forgetting an unknown host succeeds.
pub struct UnregisterSupervisor {
    pub request: RegisterSupervisorRequest,
    supervisor_port: u16,
}

impl UnregisterSupervisor {
    pub fn new(request: RegisterSupervisorRequest, supervisor_port: u16) -> Self {
        Self {
            request,
            supervisor_port,
        }
    }
}

#[async_trait]
impl Executor for UnregisterSupervisor {
    type Reply = SupervisorReply;

    fn name(&self) -> &'static str {
        "UnregisterSupervisor"
    }

    fn description(&self) -> String {
        format!("{}:{}", self.request.host, self.supervisor_port)
    }

    fn validate(&self) -> Result<()> {
        require(&self.request.host, "Please specify a host to unregister")
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()> {
        authorize_super_user(ctx, self.request.auth.as_ref()).await?;
        Ok(())
    }

    async fn execute(&self, ctx: &ControlPlaneContext, _reply: &mut SupervisorReply) -> Result<()> {
        admission::retire(ctx.supervisors(), ctx.registry(), &self.request.host).await?;
        Ok(())
    }
}

pub struct ListSupervisors {
    pub request: ListSupervisorsRequest,
}

#[async_trait]
impl Executor for ListSupervisors {
    type Reply = ListSupervisorsReply;

    fn name(&self) -> &'static str {
        "ListSupervisors"
    }

    fn description(&self) -> String {
        "ListSupervisors".to_string()
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()> {
        simple_authorize(ctx, self.request.auth.as_ref()).await?;
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &ControlPlaneContext,
        reply: &mut ListSupervisorsReply,
    ) -> Result<()> {
        reply.supervisors = ctx.registry().list_supervisors().await?;
        Ok(())
    }
}
