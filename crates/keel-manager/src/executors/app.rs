// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! App executors, including the depender data mutations.

use std::sync::OnceLock;

use async_trait::async_trait;
use keel_protocol::manager_proto::{
    AddDependerAppDataRequest, AddDependerEnvDataRequest, AppReply, GetAppRequest,
    ListAppsReply, ListAppsRequest, RegisterAppRequest, RemoveDependerAppDataRequest,
    RemoveDependerEnvDataRequest, UnregisterAppRequest,
};

use super::{authorize_app, require, simple_authorize};
use crate::auth::{self, Caller};
use crate::context::ControlPlaneContext;
use crate::error::{ManagerError, Result};
use crate::registry::{AppEntry, DependerEnvData, app_missing};
use crate::task::Executor;

async fn load_app(ctx: &ControlPlaneContext, name: &str) -> Result<AppEntry> {
    ctx.registry()
        .get_app(name)
        .await?
        .ok_or_else(|| app_missing(name))
}

fn authorized_caller(caller: &OnceLock<Caller>) -> Result<&Caller> {
    caller
        .get()
        .ok_or_else(|| ManagerError::Internal("caller not authorized".to_string()))
}

/// Register and update share this upsert. An update keeps the recorded
/// depender data, and the recorded owner when the request names none.
pub struct RegisterApp {
    pub request: RegisterAppRequest,
    update: bool,
    caller: OnceLock<Caller>,
}

impl RegisterApp {
    pub fn register(request: RegisterAppRequest) -> Self {
        Self {
            request,
            update: false,
            caller: OnceLock::new(),
        }
    }

    pub fn update(request: RegisterAppRequest) -> Self {
        Self {
            request,
            update: true,
            caller: OnceLock::new(),
        }
    }
}

#[async_trait]
impl Executor for RegisterApp {
    type Reply = AppReply;

    fn name(&self) -> &'static str {
        if self.update { "UpdateApp" } else { "RegisterApp" }
    }

    fn description(&self) -> String {
        format!(
            "{} -> {}:{}",
            self.request.name, self.request.repo, self.request.root
        )
    }

    fn validate(&self) -> Result<()> {
        require(&self.request.name, "Please specify an app name to register")?;
        require(&self.request.repo, "Please specify a repo")?;
        require(&self.request.root, "Please specify the repo's root")
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()> {
        let requested_owner = Some(self.request.email.as_str());
        let caller =
            authorize_app(ctx, self.request.auth.as_ref(), &self.request.name, requested_owner)
                .await?;
        let _ = self.caller.set(caller);
        Ok(())
    }

    async fn execute(&self, ctx: &ControlPlaneContext, reply: &mut AppReply) -> Result<()> {
        let caller = authorized_caller(&self.caller)?;
        let req = &self.request;
        let app = ctx
            .registry()
            .update_app(&req.name, |current| {
                // The owner is checked again against the entry being replaced.
                let mut app = match current {
                    Some(existing) => {
                        auth::authorize_app(caller, Some(existing.email.as_str()))?;
                        existing
                    }
                    None => {
                        auth::authorize_app(caller, Some(req.email.as_str()))?;
                        AppEntry {
                            name: req.name.clone(),
                            ..Default::default()
                        }
                    }
                };
                app.repo = req.repo.clone();
                app.root = req.root.clone();
                if !req.email.is_empty() {
                    app.email = req.email.clone();
                }
                app.internal = req.internal;
                app.non_atlantis = req.non_atlantis;
                Ok(app)
            })
            .await?;
        reply.app = Some(app.into());
        Ok(())
    }
}

pub struct UnregisterApp {
    pub request: UnregisterAppRequest,
}

#[async_trait]
impl Executor for UnregisterApp {
    type Reply = AppReply;

    fn name(&self) -> &'static str {
        "UnregisterApp"
    }

    fn description(&self) -> String {
        self.request.name.clone()
    }

    fn validate(&self) -> Result<()> {
        require(&self.request.name, "Please specify an app name to unregister")
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()> {
        authorize_app(ctx, self.request.auth.as_ref(), &self.request.name, None).await?;
        Ok(())
    }

    async fn execute(&self, ctx: &ControlPlaneContext, _reply: &mut AppReply) -> Result<()> {
        ctx.registry().delete_app(&self.request.name).await
    }
}

pub struct GetApp {
    pub request: GetAppRequest,
}

#[async_trait]
impl Executor for GetApp {
    type Reply = AppReply;

    fn name(&self) -> &'static str {
        "GetApp"
    }

    fn description(&self) -> String {
        self.request.name.clone()
    }

    fn validate(&self) -> Result<()> {
        require(&self.request.name, "Please specify an app name to get")
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()> {
        authorize_app(ctx, self.request.auth.as_ref(), &self.request.name, None).await?;
        Ok(())
    }

    async fn execute(&self, ctx: &ControlPlaneContext, reply: &mut AppReply) -> Result<()> {
        reply.app = Some(load_app(ctx, &self.request.name).await?.into());
        Ok(())
    }
}

pub struct ListRegisteredApps {
    pub request: ListAppsRequest,
}

#[async_trait]
impl Executor for ListRegisteredApps {
    type Reply = ListAppsReply;

    fn name(&self) -> &'static str {
        "ListRegisteredApps"
    }

    fn description(&self) -> String {
        "ListRegisteredApps".to_string()
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()> {
        simple_authorize(ctx, self.request.auth.as_ref()).await?;
        Ok(())
    }

    async fn execute(&self, ctx: &ControlPlaneContext, reply: &mut ListAppsReply) -> Result<()> {
        reply.apps = ctx
            .registry()
            .list_apps()
            .await?
            .into_iter()
            .map(|app| app.name)
            .collect();
        Ok(())
    }
}

/// Apps the caller owns; every app for super-users.
pub struct ListAuthorizedRegisteredApps {
    pub request: ListAppsRequest,
    caller: OnceLock<Caller>,
}

impl ListAuthorizedRegisteredApps {
    pub fn new(request: ListAppsRequest) -> Self {
        Self {
            request,
            caller: OnceLock::new(),
        }
    }
}

#[async_trait]
impl Executor for ListAuthorizedRegisteredApps {
    type Reply = ListAppsReply;

    fn name(&self) -> &'static str {
        "ListAuthorizedRegisteredApps"
    }

    fn description(&self) -> String {
        "ListAuthorizedRegisteredApps".to_string()
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()> {
        let caller = simple_authorize(ctx, self.request.auth.as_ref()).await?;
        let _ = self.caller.set(caller);
        Ok(())
    }

    async fn execute(&self, ctx: &ControlPlaneContext, reply: &mut ListAppsReply) -> Result<()> {
        let caller = authorized_caller(&self.caller)?;
        reply.apps = ctx
            .registry()
            .list_apps()
            .await?
            .into_iter()
            .filter(|app| caller.super_user || (!app.email.is_empty() && app.email == caller.email))
            .map(|app| app.name)
            .collect();
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Depender data
// ----------------------------------------------------------------------------

fn env_data(data: &Option<keel_protocol::manager_proto::DependerEnvData>) -> Result<DependerEnvData> {
    match data {
        Some(data) if !data.name.is_empty() => Ok(data.clone().into()),
        _ => Err(ManagerError::validation("Please specify an environment")),
    }
}

pub struct AddDependerEnvData {
    pub request: AddDependerEnvDataRequest,
}

#[async_trait]
impl Executor for AddDependerEnvData {
    type Reply = AppReply;

    fn name(&self) -> &'static str {
        "AddDependerEnvData"
    }

    fn description(&self) -> String {
        let env = self.request.data.as_ref().map(|d| d.name.as_str()).unwrap_or_default();
        format!("{} in {}", env, self.request.app)
    }

    fn validate(&self) -> Result<()> {
        require(&self.request.app, "Please specify an app")?;
        env_data(&self.request.data).map(|_| ())
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()> {
        authorize_app(ctx, self.request.auth.as_ref(), &self.request.app, None).await?;
        Ok(())
    }

    async fn execute(&self, ctx: &ControlPlaneContext, reply: &mut AppReply) -> Result<()> {
        let data = env_data(&self.request.data)?;
        let app = ctx
            .registry()
            .modify_app(&self.request.app, |app| {
                app.set_env_data(data);
                Ok(())
            })
            .await?;
        reply.app = Some(app.into());
        Ok(())
    }
}

pub struct RemoveDependerEnvData {
    pub request: RemoveDependerEnvDataRequest,
}

#[async_trait]
impl Executor for RemoveDependerEnvData {
    type Reply = AppReply;

    fn name(&self) -> &'static str {
        "RemoveDependerEnvData"
    }

    fn description(&self) -> String {
        format!("{} in {}", self.request.env, self.request.app)
    }

    fn validate(&self) -> Result<()> {
        require(&self.request.app, "Please specify an app")?;
        require(&self.request.env, "Please specify an environment")
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()> {
        authorize_app(ctx, self.request.auth.as_ref(), &self.request.app, None).await?;
        Ok(())
    }

    async fn execute(&self, ctx: &ControlPlaneContext, reply: &mut AppReply) -> Result<()> {
        let req = &self.request;
        let app = ctx
            .registry()
            .modify_app(&req.app, |app| {
                if app.remove_env_data(&req.env) {
                    Ok(())
                } else {
                    Err(ManagerError::NotFound(format!(
                        "App {} has no depender data for environment {}",
                        req.app, req.env
                    )))
                }
            })
            .await?;
        reply.app = Some(app.into());
        Ok(())
    }
}

pub struct AddDependerAppData {
    pub request: AddDependerAppDataRequest,
}

#[async_trait]
impl Executor for AddDependerAppData {
    type Reply = AppReply;

    fn name(&self) -> &'static str {
        "AddDependerAppData"
    }

    fn description(&self) -> String {
        format!("{} for {}", self.request.depender, self.request.app)
    }

    fn validate(&self) -> Result<()> {
        require(&self.request.app, "Please specify an app")?;
        require(&self.request.depender, "Please specify a depender app")?;
        env_data(&self.request.data).map(|_| ())
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()> {
        authorize_app(ctx, self.request.auth.as_ref(), &self.request.app, None).await?;
        Ok(())
    }

    async fn execute(&self, ctx: &ControlPlaneContext, reply: &mut AppReply) -> Result<()> {
        let req = &self.request;
        let data = env_data(&req.data)?;
        let app = ctx
            .registry()
            .modify_app(&req.app, |app| {
                app.set_app_data(&req.depender, data);
                Ok(())
            })
            .await?;
        reply.app = Some(app.into());
        Ok(())
    }
}

pub struct RemoveDependerAppData {
    pub request: RemoveDependerAppDataRequest,
}

#[async_trait]
impl Executor for RemoveDependerAppData {
    type Reply = AppReply;

    fn name(&self) -> &'static str {
        "RemoveDependerAppData"
    }

    fn description(&self) -> String {
        format!(
            "{}/{} for {}",
            self.request.depender, self.request.env, self.request.app
        )
    }

    fn validate(&self) -> Result<()> {
        require(&self.request.app, "Please specify an app")?;
        require(&self.request.depender, "Please specify a depender app")?;
        require(&self.request.env, "Please specify an environment")
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()> {
        authorize_app(ctx, self.request.auth.as_ref(), &self.request.app, None).await?;
        Ok(())
    }

    async fn execute(&self, ctx: &ControlPlaneContext, reply: &mut AppReply) -> Result<()> {
        let req = &self.request;
        let app = ctx
            .registry()
            .modify_app(&req.app, |app| {
                if app.remove_app_data(&req.depender, &req.env) {
                    Ok(())
                } else {
                    Err(ManagerError::NotFound(format!(
                        "App {} has no data from {} for environment {}",
                        req.app, req.depender, req.env
                    )))
                }
            })
            .await?;
        reply.app = Some(app.into());
        Ok(())
    }
}
