// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! RPC dispatch.
//!
//! Routes each request variant to its executor and picks how it runs:
//!
//! | Kind | Methods | Reply |
//! |------|---------|-------|
//! | Asynchronous | Register/Unregister of routers, supervisors, managers | `{id}` at once |
//! | Tracked | app mutations, depender data, roles | the reply, after the task ends |
//! | Untracked | Get*, List*, HasRole | the reply, no task recorded |
//! | Result polls | `*Result(id)` | the stored reply of a finished task |
//!
//! `HealthCheck`, `Idle` and `TaskStatus` need no credentials.

use std::sync::Arc;

use keel_protocol::manager_proto::{
    AsyncReply, HealthCheckReply, IdleReply, RpcError, RpcRequest, RpcResponse, STATUS_OK,
    TaskIdRequest, rpc_request::Request, rpc_response::Response,
};
use tracing::{debug, warn};

use crate::context::ControlPlaneContext;
use crate::error::{ManagerError, Result};
use crate::executors::{
    AddDependerAppData, AddDependerEnvData, AddRole, GetApp, GetManager, GetRouter, GetSelf,
    HasRole, ListAuthorizedRegisteredApps, ListManagers, ListRegisteredApps, ListRouters,
    ListSupervisors, RegisterApp, RegisterManager, RegisterRouter, RegisterSupervisor,
    RemoveDependerAppData, RemoveDependerEnvData, RemoveRole, UnregisterApp, UnregisterManager,
    UnregisterRouter, UnregisterSupervisor,
};
use crate::task::{Executor, TaskPoll};

/// Wire method name of a request, for logs.
pub fn method_name(request: &Request) -> &'static str {
    match request {
        Request::HealthCheck(_) => "HealthCheck",
        Request::RegisterRouter(_) => "RegisterRouter",
        Request::RegisterRouterResult(_) => "RegisterRouterResult",
        Request::UnregisterRouter(_) => "UnregisterRouter",
        Request::UnregisterRouterResult(_) => "UnregisterRouterResult",
        Request::GetRouter(_) => "GetRouter",
        Request::ListRouters(_) => "ListRouters",
        Request::RegisterApp(_) => "RegisterApp",
        Request::UpdateApp(_) => "UpdateApp",
        Request::UnregisterApp(_) => "UnregisterApp",
        Request::GetApp(_) => "GetApp",
        Request::ListRegisteredApps(_) => "ListRegisteredApps",
        Request::ListAuthorizedRegisteredApps(_) => "ListAuthorizedRegisteredApps",
        Request::RegisterSupervisor(_) => "RegisterSupervisor",
        Request::RegisterSupervisorResult(_) => "RegisterSupervisorResult",
        Request::UnregisterSupervisor(_) => "UnregisterSupervisor",
        Request::UnregisterSupervisorResult(_) => "UnregisterSupervisorResult",
        Request::ListSupervisors(_) => "ListSupervisors",
        Request::RegisterManager(_) => "RegisterManager",
        Request::RegisterManagerResult(_) => "RegisterManagerResult",
        Request::UnregisterManager(_) => "UnregisterManager",
        Request::UnregisterManagerResult(_) => "UnregisterManagerResult",
        Request::ListManagers(_) => "ListManagers",
        Request::GetManager(_) => "GetManager",
        Request::GetSelf(_) => "GetSelf",
        Request::AddRole(_) => "AddRole",
        Request::RemoveRole(_) => "RemoveRole",
        Request::HasRole(_) => "HasRole",
        Request::AddDependerEnvData(_) => "AddDependerEnvData",
        Request::RemoveDependerEnvData(_) => "RemoveDependerEnvData",
        Request::AddDependerAppData(_) => "AddDependerAppData",
        Request::RemoveDependerAppData(_) => "RemoveDependerAppData",
        Request::Idle(_) => "Idle",
        Request::TaskStatus(_) => "TaskStatus",
    }
}

/// Answer one request.
pub async fn dispatch(ctx: &Arc<ControlPlaneContext>, request: RpcRequest) -> RpcResponse {
    let Some(request) = request.request else {
        warn!("received empty RpcRequest");
        return error_response(RpcError::new(
            "EMPTY_REQUEST",
            "RpcRequest contained no request",
        ));
    };

    let method = method_name(&request);
    debug!(method, "dispatching request");

    let response = match route(ctx, request).await {
        Ok(response) => response,
        Err(e) => {
            debug!(method, error = %e, "request rejected");
            Response::Error(e.to_rpc_error(""))
        }
    };
    RpcResponse {
        response: Some(response),
    }
}

fn error_response(error: RpcError) -> RpcResponse {
    RpcResponse {
        response: Some(Response::Error(error)),
    }
}

async fn route(ctx: &Arc<ControlPlaneContext>, request: Request) -> Result<Response> {
    let port = ctx.port();
    let supervisor_port = ctx.supervisor_port();
    let domain = ctx.domain().to_string();

    match request {
        Request::HealthCheck(_) => Ok(Response::HealthCheck(HealthCheckReply {
            status: STATUS_OK.to_string(),
            region: ctx.region().to_string(),
        })),
        Request::Idle(_) => Ok(Response::Idle(IdleReply {
            status: STATUS_OK.to_string(),
            idle: ctx.tracker().in_flight().await == 0,
        })),
        Request::TaskStatus(TaskIdRequest { id }) => ctx
            .tracker()
            .status(&id)
            .await
            .map(Response::TaskStatus)
            .ok_or(ManagerError::TaskNotFound(id)),

        // Routers
        Request::RegisterRouter(req) => submit(ctx, RegisterRouter::new(req, domain)).await,
        Request::RegisterRouterResult(req) => poll(ctx, "RegisterRouter", req).await,
        Request::UnregisterRouter(request) => submit(ctx, UnregisterRouter { request }).await,
        Request::UnregisterRouterResult(req) => poll(ctx, "UnregisterRouter", req).await,
        Request::GetRouter(request) => untracked(ctx, GetRouter { request }).await,
        Request::ListRouters(request) => untracked(ctx, ListRouters { request }).await,

        // Apps
        Request::RegisterApp(req) => tracked(ctx, RegisterApp::register(req)).await,
        Request::UpdateApp(req) => tracked(ctx, RegisterApp::update(req)).await,
        Request::UnregisterApp(request) => tracked(ctx, UnregisterApp { request }).await,
        Request::GetApp(request) => untracked(ctx, GetApp { request }).await,
        Request::ListRegisteredApps(request) => {
            untracked(ctx, ListRegisteredApps { request }).await
        }
        Request::ListAuthorizedRegisteredApps(req) => {
            untracked(ctx, ListAuthorizedRegisteredApps::new(req)).await
        }
        Request::AddDependerEnvData(request) => {
            tracked(ctx, AddDependerEnvData { request }).await
        }
        Request::RemoveDependerEnvData(request) => {
            tracked(ctx, RemoveDependerEnvData { request }).await
        }
        Request::AddDependerAppData(request) => {
            tracked(ctx, AddDependerAppData { request }).await
        }
        Request::RemoveDependerAppData(request) => {
            tracked(ctx, RemoveDependerAppData { request }).await
        }

        // Supervisors
        Request::RegisterSupervisor(req) => {
            submit(ctx, RegisterSupervisor::new(req, supervisor_port)).await
        }
        Request::RegisterSupervisorResult(req) => poll(ctx, "RegisterSupervisor", req).await,
        Request::UnregisterSupervisor(req) => {
            submit(ctx, UnregisterSupervisor::new(req, supervisor_port)).await
        }
        Request::UnregisterSupervisorResult(req) => {
            poll(ctx, "UnregisterSupervisor", req).await
        }
        Request::ListSupervisors(request) => untracked(ctx, ListSupervisors { request }).await,

        // Managers
        Request::RegisterManager(req) => {
            submit(ctx, RegisterManager::new(req, port, domain)).await
        }
        Request::RegisterManagerResult(req) => poll(ctx, "RegisterManager", req).await,
        Request::UnregisterManager(req) => {
            submit(ctx, UnregisterManager::new(req, port)).await
        }
        Request::UnregisterManagerResult(req) => poll(ctx, "UnregisterManager", req).await,
        Request::ListManagers(request) => untracked(ctx, ListManagers { request }).await,
        Request::GetManager(request) => untracked(ctx, GetManager { request }).await,
        Request::GetSelf(request) => untracked(ctx, GetSelf { request }).await,
        Request::AddRole(request) => tracked(ctx, AddRole { request }).await,
        Request::RemoveRole(request) => tracked(ctx, RemoveRole { request }).await,
        Request::HasRole(request) => untracked(ctx, HasRole { request }).await,
    }
}

/// Start a task and answer with its id.
async fn submit<E: Executor>(ctx: &Arc<ControlPlaneContext>, executor: E) -> Result<Response> {
    let id = ctx.tracker().submit(ctx.clone(), executor).await?;
    Ok(Response::Async(AsyncReply { id }))
}

/// Run a task to completion and answer with its outcome.
async fn tracked<E: Executor>(ctx: &Arc<ControlPlaneContext>, executor: E) -> Result<Response> {
    ctx.tracker().run(ctx.clone(), executor).await
}

async fn untracked<E: Executor>(ctx: &Arc<ControlPlaneContext>, executor: E) -> Result<Response> {
    ctx.tracker().run_inline(ctx, executor).await
}

/// Stored outcome of a finished `method` task.
async fn poll(
    ctx: &ControlPlaneContext,
    method: &'static str,
    request: TaskIdRequest,
) -> Result<Response> {
    let id = request.id;
    match ctx.tracker().poll(&id).await {
        TaskPoll::NotFound => Err(ManagerError::TaskNotFound(id)),
        TaskPoll::Pending { name } | TaskPoll::Done { name, .. } if name != method => {
            Err(ManagerError::validation(format!(
                "task {} is a {} task, not {}",
                id, name, method
            )))
        }
        TaskPoll::Pending { .. } => Err(ManagerError::TaskPending(id)),
        TaskPoll::Done { response, .. } => Ok(response),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_context;
    use keel_protocol::manager_proto::{HealthCheckRequest, IdleRequest};

    fn call(request: Request) -> RpcRequest {
        RpcRequest {
            request: Some(request),
        }
    }

    #[tokio::test]
    async fn test_empty_request() {
        let ctx = test_context();
        let response = dispatch(&ctx, RpcRequest::default()).await;
        match response.response {
            Some(Response::Error(e)) => assert_eq!(e.code, "EMPTY_REQUEST"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_health_check_needs_no_credentials() {
        let ctx = test_context();
        let response = dispatch(&ctx, call(Request::HealthCheck(HealthCheckRequest {}))).await;
        match response.response {
            Some(Response::HealthCheck(reply)) => {
                assert_eq!(reply.status, STATUS_OK);
                assert_eq!(reply.region, "us-west");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_idle_with_no_tasks() {
        let ctx = test_context();
        let response = dispatch(&ctx, call(Request::Idle(IdleRequest {}))).await;
        assert!(matches!(response.response, Some(Response::Idle(IdleReply { idle: true, .. }))));
    }

    #[tokio::test]
    async fn test_task_status_unknown_id() {
        let ctx = test_context();
        let response = dispatch(
            &ctx,
            call(Request::TaskStatus(TaskIdRequest { id: "nope".into() })),
        )
        .await;
        match response.response {
            Some(Response::Error(e)) => assert_eq!(e.code, "TASK_NOT_FOUND"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_method_names_match_variants() {
        assert_eq!(
            method_name(&Request::RegisterRouterResult(TaskIdRequest::default())),
            "RegisterRouterResult"
        );
        assert_eq!(method_name(&Request::Idle(IdleRequest {})), "Idle");
    }
}
