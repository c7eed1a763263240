// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! KeelSdk client for interacting with a keel manager.

use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use keel_protocol::manager_proto::{
    AddDependerAppDataRequest, AddDependerEnvDataRequest, AuthArg, GetAppRequest,
    GetManagerRequest, GetRouterRequest, GetSelfRequest, HealthCheckRequest, IdleRequest,
    ListAppsRequest, ListManagersRequest, ListRoutersRequest, ListSupervisorsRequest,
    RegisterAppRequest, RegisterManagerRequest, RegisterRouterRequest,
    RegisterSupervisorRequest, RemoveDependerAppDataRequest, RemoveDependerEnvDataRequest,
    RoleRequest, RpcRequest, RpcResponse, TaskIdRequest, UnregisterAppRequest,
    UnregisterManagerRequest, UnregisterRouterRequest, rpc_request::Request,
    rpc_response::Response,
};
use keel_protocol::{KeelClient, KeelClientConfig};

use crate::config::SdkConfig;
use crate::error::{Result, SdkError};
use crate::types::{
    App, EnvData, HealthStatus, HostGroups, Manager, RegisterAppOptions, RegisterManagerOptions,
    RegisterRouterOptions, RoleRef, Router, TaskInfo, host_groups,
};

/// Health checks give up after this long, independent of the request timeout.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Unwrap one response variant or fail with `UnexpectedResponse`.
macro_rules! expect_reply {
    ($response:expr, $variant:ident) => {
        match $response {
            Response::$variant(reply) => Ok(reply),
            other => Err(SdkError::UnexpectedResponse(format!(
                "expected {} reply, got {:?}",
                stringify!($variant),
                other
            ))),
        }
    };
}

/// Typed client for the keel manager protocol.
///
/// Asynchronous methods (`register_router`, `register_supervisor`,
/// `register_manager` and their unregister counterparts) return a task id;
/// the matching `*_result` method returns the outcome once the task is done.
/// [`wait_for_task`](Self::wait_for_task) blocks until then.
pub struct KeelSdk {
    client: KeelClient,
    config: SdkConfig,
}

impl KeelSdk {
    /// Create a new SDK with the given configuration.
    pub fn new(config: SdkConfig) -> Result<Self> {
        let client_config = KeelClientConfig {
            server_addr: config.server_addr,
            server_name: config.server_name.clone(),
            dangerous_skip_cert_verification: config.skip_cert_verification,
            connect_timeout_ms: config.connect_timeout.as_millis() as u64,
            request_timeout_ms: config.request_timeout.as_millis() as u64,
            ..KeelClientConfig::default()
        };

        let client = KeelClient::new(client_config)?;

        Ok(Self { client, config })
    }

    /// Create an SDK from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(SdkConfig::from_env()?)
    }

    /// Connect to the manager. Calls connect lazily otherwise.
    #[instrument(skip(self), fields(addr = %self.config.server_addr))]
    pub async fn connect(&self) -> Result<()> {
        self.client.connect().await?;
        info!("Connected to keel manager");
        Ok(())
    }

    pub async fn close(&self) {
        self.client.close().await;
    }

    pub async fn is_connected(&self) -> bool {
        self.client.is_connected().await
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    fn auth(&self) -> Option<AuthArg> {
        Some(AuthArg::new(&self.config.user, &self.config.secret))
    }

    /// Send a request and receive a response.
    async fn send_request(&self, request: Request) -> Result<Response> {
        let rpc_request = RpcRequest {
            request: Some(request),
        };

        let rpc_response: RpcResponse = self.client.request(&rpc_request).await?;

        match rpc_response.response {
            Some(Response::Error(err)) => Err(err.into()),
            Some(response) => Ok(response),
            None => Err(SdkError::UnexpectedResponse(
                "empty response from server".to_string(),
            )),
        }
    }

    async fn submit(&self, request: Request) -> Result<String> {
        let reply = expect_reply!(self.send_request(request).await?, Async)?;
        debug!(task_id = %reply.id, "task submitted");
        Ok(reply.id)
    }

    fn task(id: &str) -> TaskIdRequest {
        TaskIdRequest { id: id.to_string() }
    }

    // =========================================================================
    // Health & Tasks
    // =========================================================================

    /// Check the manager's health, failing with [`SdkError::Timeout`] after
    /// [`HEALTH_CHECK_TIMEOUT`].
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<HealthStatus> {
        self.health_check_within(HEALTH_CHECK_TIMEOUT).await
    }

    async fn health_check_within(&self, limit: Duration) -> Result<HealthStatus> {
        let response = tokio::time::timeout(
            limit,
            self.send_request(Request::HealthCheck(HealthCheckRequest {})),
        )
        .await
        .map_err(|_| SdkError::Timeout(limit.as_millis() as u64))??;
        let reply = expect_reply!(response, HealthCheck)?;
        Ok(HealthStatus {
            status: reply.status,
            region: reply.region,
        })
    }

    /// Whether the manager has no task pending or running.
    pub async fn idle(&self) -> Result<bool> {
        let reply = expect_reply!(self.send_request(Request::Idle(IdleRequest {})).await?, Idle)?;
        Ok(reply.idle)
    }

    pub async fn task_status(&self, id: &str) -> Result<TaskInfo> {
        let reply = expect_reply!(
            self.send_request(Request::TaskStatus(Self::task(id))).await?,
            TaskStatus
        )?;
        Ok(reply.into())
    }

    /// Poll `TaskStatus` until the task is done or failed.
    ///
    /// Fails with [`SdkError::Timeout`] once `timeout` elapses, and with a
    /// `TASK_NOT_FOUND` server error if the id is unknown.
    #[instrument(skip(self))]
    pub async fn wait_for_task(&self, id: &str, timeout: Duration) -> Result<TaskInfo> {
        let started = Instant::now();
        loop {
            let info = self.task_status(id).await?;
            if info.state.is_terminal() {
                debug!(state = ?info.state, "task finished");
                return Ok(info);
            }
            if started.elapsed() >= timeout {
                return Err(SdkError::Timeout(timeout.as_millis() as u64));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    // =========================================================================
    // Routers
    // =========================================================================

    #[instrument(skip(self, options), fields(zone = %options.zone, ip = %options.ip))]
    pub async fn register_router(&self, options: RegisterRouterOptions) -> Result<String> {
        self.submit(Request::RegisterRouter(RegisterRouterRequest {
            auth: self.auth(),
            zone: options.zone,
            host: options.host.unwrap_or_default(),
            ip: options.ip,
            internal: options.internal,
        }))
        .await
    }

    pub async fn register_router_result(&self, id: &str) -> Result<Router> {
        let reply = expect_reply!(
            self.send_request(Request::RegisterRouterResult(Self::task(id)))
                .await?,
            Router
        )?;
        reply
            .router
            .ok_or_else(|| SdkError::UnexpectedResponse("router missing from reply".to_string()))
    }

    pub async fn unregister_router(&self, zone: &str, host: &str, internal: bool) -> Result<String> {
        self.submit(Request::UnregisterRouter(UnregisterRouterRequest {
            auth: self.auth(),
            zone: zone.to_string(),
            host: host.to_string(),
            internal,
        }))
        .await
    }

    pub async fn unregister_router_result(&self, id: &str) -> Result<()> {
        expect_reply!(
            self.send_request(Request::UnregisterRouterResult(Self::task(id)))
                .await?,
            Router
        )?;
        Ok(())
    }

    pub async fn get_router(&self, zone: &str, host: &str, internal: bool) -> Result<Router> {
        let reply = expect_reply!(
            self.send_request(Request::GetRouter(GetRouterRequest {
                auth: self.auth(),
                zone: zone.to_string(),
                host: host.to_string(),
                internal,
            }))
            .await?,
            Router
        )?;
        reply
            .router
            .ok_or_else(|| SdkError::UnexpectedResponse("router missing from reply".to_string()))
    }

    /// Router hosts grouped by zone.
    pub async fn list_routers(&self, internal: bool) -> Result<HostGroups> {
        let reply = expect_reply!(
            self.send_request(Request::ListRouters(ListRoutersRequest {
                auth: self.auth(),
                internal,
            }))
            .await?,
            ListRouters
        )?;
        Ok(host_groups(reply.routers))
    }

    // =========================================================================
    // Apps
    // =========================================================================

    fn app_request(&self, options: RegisterAppOptions) -> RegisterAppRequest {
        RegisterAppRequest {
            auth: self.auth(),
            name: options.name,
            repo: options.repo,
            root: options.root,
            email: options.email.unwrap_or_default(),
            internal: options.internal,
            non_atlantis: options.non_atlantis,
        }
    }

    fn app_reply(response: Response) -> Result<App> {
        expect_reply!(response, App)?
            .app
            .ok_or_else(|| SdkError::UnexpectedResponse("app missing from reply".to_string()))
    }

    #[instrument(skip(self, options), fields(app = %options.name))]
    pub async fn register_app(&self, options: RegisterAppOptions) -> Result<App> {
        let request = Request::RegisterApp(self.app_request(options));
        Self::app_reply(self.send_request(request).await?)
    }

    #[instrument(skip(self, options), fields(app = %options.name))]
    pub async fn update_app(&self, options: RegisterAppOptions) -> Result<App> {
        let request = Request::UpdateApp(self.app_request(options));
        Self::app_reply(self.send_request(request).await?)
    }

    pub async fn unregister_app(&self, name: &str) -> Result<()> {
        expect_reply!(
            self.send_request(Request::UnregisterApp(UnregisterAppRequest {
                auth: self.auth(),
                name: name.to_string(),
            }))
            .await?,
            App
        )?;
        Ok(())
    }

    pub async fn get_app(&self, name: &str) -> Result<App> {
        Self::app_reply(
            self.send_request(Request::GetApp(GetAppRequest {
                auth: self.auth(),
                name: name.to_string(),
            }))
            .await?,
        )
    }

    pub async fn list_registered_apps(&self) -> Result<Vec<String>> {
        let reply = expect_reply!(
            self.send_request(Request::ListRegisteredApps(ListAppsRequest {
                auth: self.auth(),
            }))
            .await?,
            ListApps
        )?;
        Ok(reply.apps)
    }

    /// Apps the configured user may manage.
    pub async fn list_authorized_registered_apps(&self) -> Result<Vec<String>> {
        let reply = expect_reply!(
            self.send_request(Request::ListAuthorizedRegisteredApps(ListAppsRequest {
                auth: self.auth(),
            }))
            .await?,
            ListApps
        )?;
        Ok(reply.apps)
    }

    pub async fn add_depender_env_data(&self, app: &str, data: EnvData) -> Result<App> {
        Self::app_reply(
            self.send_request(Request::AddDependerEnvData(AddDependerEnvDataRequest {
                auth: self.auth(),
                app: app.to_string(),
                data: Some(data.into()),
            }))
            .await?,
        )
    }

    pub async fn remove_depender_env_data(&self, app: &str, env: &str) -> Result<App> {
        Self::app_reply(
            self.send_request(Request::RemoveDependerEnvData(RemoveDependerEnvDataRequest {
                auth: self.auth(),
                app: app.to_string(),
                env: env.to_string(),
            }))
            .await?,
        )
    }

    pub async fn add_depender_app_data(
        &self,
        app: &str,
        depender: &str,
        data: EnvData,
    ) -> Result<App> {
        Self::app_reply(
            self.send_request(Request::AddDependerAppData(AddDependerAppDataRequest {
                auth: self.auth(),
                app: app.to_string(),
                depender: depender.to_string(),
                data: Some(data.into()),
            }))
            .await?,
        )
    }

    pub async fn remove_depender_app_data(
        &self,
        app: &str,
        depender: &str,
        env: &str,
    ) -> Result<App> {
        Self::app_reply(
            self.send_request(Request::RemoveDependerAppData(RemoveDependerAppDataRequest {
                auth: self.auth(),
                app: app.to_string(),
                depender: depender.to_string(),
                env: env.to_string(),
            }))
            .await?,
        )
    }

    // =========================================================================
    // Supervisors
    // =========================================================================

    #[instrument(skip(self))]
    pub async fn register_supervisor(&self, host: &str) -> Result<String> {
        self.submit(Request::RegisterSupervisor(RegisterSupervisorRequest {
            auth: self.auth(),
            host: host.to_string(),
        }))
        .await
    }

    /// Admission status of the supervisor: `OK` or `FULL`.
    pub async fn register_supervisor_result(&self, id: &str) -> Result<String> {
        let reply = expect_reply!(
            self.send_request(Request::RegisterSupervisorResult(Self::task(id)))
                .await?,
            Supervisor
        )?;
        Ok(reply.status)
    }

    #[instrument(skip(self))]
    pub async fn unregister_supervisor(&self, host: &str) -> Result<String> {
        self.submit(Request::UnregisterSupervisor(RegisterSupervisorRequest {
            auth: self.auth(),
            host: host.to_string(),
        }))
        .await
    }

    pub async fn unregister_supervisor_result(&self, id: &str) -> Result<()> {
        expect_reply!(
            self.send_request(Request::UnregisterSupervisorResult(Self::task(id)))
                .await?,
            Supervisor
        )?;
        Ok(())
    }

    pub async fn list_supervisors(&self) -> Result<Vec<String>> {
        let reply = expect_reply!(
            self.send_request(Request::ListSupervisors(ListSupervisorsRequest {
                auth: self.auth(),
            }))
            .await?,
            ListSupervisors
        )?;
        Ok(reply.supervisors)
    }

    // =========================================================================
    // Managers & Roles
    // =========================================================================

    fn manager_reply(response: Response) -> Result<Manager> {
        expect_reply!(response, Manager)?
            .manager
            .ok_or_else(|| SdkError::UnexpectedResponse("manager missing from reply".to_string()))
    }

    #[instrument(skip(self, options), fields(region = %options.region, ip = %options.ip))]
    pub async fn register_manager(&self, options: RegisterManagerOptions) -> Result<String> {
        self.submit(Request::RegisterManager(RegisterManagerRequest {
            auth: self.auth(),
            region: options.region,
            host: options.host.unwrap_or_default(),
            ip: options.ip,
            manager_cname: options.manager_cname.unwrap_or_default(),
            registry_cname: options.registry_cname.unwrap_or_default(),
        }))
        .await
    }

    pub async fn register_manager_result(&self, id: &str) -> Result<Manager> {
        Self::manager_reply(
            self.send_request(Request::RegisterManagerResult(Self::task(id)))
                .await?,
        )
    }

    /// Unregister the manager at `ip` in `region`; `host` defaults to `ip`.
    pub async fn unregister_manager(
        &self,
        region: &str,
        ip: &str,
        host: Option<&str>,
    ) -> Result<String> {
        self.submit(Request::UnregisterManager(UnregisterManagerRequest {
            auth: self.auth(),
            region: region.to_string(),
            host: host.unwrap_or_default().to_string(),
            ip: ip.to_string(),
        }))
        .await
    }

    pub async fn unregister_manager_result(&self, id: &str) -> Result<Manager> {
        Self::manager_reply(
            self.send_request(Request::UnregisterManagerResult(Self::task(id)))
                .await?,
        )
    }

    /// Manager hosts grouped by region.
    pub async fn list_managers(&self) -> Result<HostGroups> {
        let reply = expect_reply!(
            self.send_request(Request::ListManagers(ListManagersRequest {
                auth: self.auth(),
            }))
            .await?,
            ListManagers
        )?;
        Ok(host_groups(reply.managers))
    }

    pub async fn get_manager(&self, region: &str, host: &str) -> Result<Manager> {
        Self::manager_reply(
            self.send_request(Request::GetManager(GetManagerRequest {
                auth: self.auth(),
                region: region.to_string(),
                host: host.to_string(),
            }))
            .await?,
        )
    }

    /// The registry entry of the manager answering the call.
    pub async fn get_self(&self) -> Result<Manager> {
        Self::manager_reply(
            self.send_request(Request::GetSelf(GetSelfRequest { auth: self.auth() }))
                .await?,
        )
    }

    fn role_request(&self, role: RoleRef) -> RoleRequest {
        RoleRequest {
            auth: self.auth(),
            region: role.region,
            host: role.host,
            role: role.role,
            type_name: role.type_name,
        }
    }

    pub async fn add_role(&self, role: RoleRef) -> Result<Manager> {
        let request = Request::AddRole(self.role_request(role));
        Self::manager_reply(self.send_request(request).await?)
    }

    pub async fn remove_role(&self, role: RoleRef) -> Result<Manager> {
        let request = Request::RemoveRole(self.role_request(role));
        Self::manager_reply(self.send_request(request).await?)
    }

    pub async fn has_role(&self, role: RoleRef) -> Result<bool> {
        let request = Request::HasRole(self.role_request(role));
        let reply = expect_reply!(self.send_request(request).await?, HasRole)?;
        Ok(reply.has_role)
    }
}
