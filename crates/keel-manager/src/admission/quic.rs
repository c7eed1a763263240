// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Supervisor client over the keel QUIC transport.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use keel_protocol::supervisor_proto::{
    HealthCheckReply, HealthCheckRequest, SupervisorRequest, SupervisorResponse, TeardownReply,
    TeardownRequest, supervisor_request, supervisor_response,
};
use keel_protocol::{ClientError, KeelClient, KeelClientConfig};
use tracing::{debug, instrument};

use super::{ProbeError, SupervisorClient};

/// Health checks give up after this long.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Teardowns may take as long as stopping every container.
pub const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(60);

/// Opens one connection per call to `{host}:{port}`.
#[derive(Debug, Clone)]
pub struct QuicSupervisorClient {
    port: u16,
    skip_cert_verification: bool,
}

impl QuicSupervisorClient {
    pub fn new(port: u16, skip_cert_verification: bool) -> Self {
        Self {
            port,
            skip_cert_verification,
        }
    }

    async fn resolve(&self, host: &str) -> Result<SocketAddr, ProbeError> {
        let resolve_err = |reason: String| ProbeError::Resolve {
            host: host.to_string(),
            reason,
        };
        tokio::net::lookup_host((host, self.port))
            .await
            .map_err(|e| resolve_err(e.to_string()))?
            .next()
            .ok_or_else(|| resolve_err("no addresses".to_string()))
    }

    async fn call(
        &self,
        host: &str,
        request: supervisor_request::Request,
        timeout: Duration,
    ) -> Result<supervisor_response::Response, ProbeError> {
        let transport = |source: ClientError| ProbeError::Transport {
            host: host.to_string(),
            source,
        };

        let addr = self.resolve(host).await?;
        let timeout_ms = timeout.as_millis() as u64;
        let client = KeelClient::new(KeelClientConfig {
            server_addr: addr,
            server_name: host.to_string(),
            dangerous_skip_cert_verification: self.skip_cert_verification,
            connect_timeout_ms: timeout_ms,
            request_timeout_ms: timeout_ms,
            ..Default::default()
        })
        .map_err(transport)?;

        debug!(host = %host, addr = %addr, "calling supervisor");
        let result: Result<SupervisorResponse, ClientError> = client
            .request(&SupervisorRequest {
                request: Some(request),
            })
            .await;
        client.close().await;

        match result {
            Ok(SupervisorResponse {
                response: Some(supervisor_response::Response::Error(e)),
            }) => Err(ProbeError::Rejected {
                host: host.to_string(),
                code: e.code,
                message: e.message,
            }),
            Ok(SupervisorResponse {
                response: Some(response),
            }) => Ok(response),
            Ok(SupervisorResponse { response: None }) => Err(ProbeError::UnexpectedResponse {
                host: host.to_string(),
            }),
            Err(ClientError::Rejected { code, message }) => Err(ProbeError::Rejected {
                host: host.to_string(),
                code,
                message,
            }),
            Err(e) => Err(transport(e)),
        }
    }
}

#[async_trait]
impl SupervisorClient for QuicSupervisorClient {
    #[instrument(skip(self))]
    async fn health_check(&self, host: &str) -> Result<HealthCheckReply, ProbeError> {
        let request = supervisor_request::Request::HealthCheck(HealthCheckRequest {});
        match self.call(host, request, HEALTH_CHECK_TIMEOUT).await? {
            supervisor_response::Response::HealthCheck(reply) => Ok(reply),
            _ => Err(ProbeError::UnexpectedResponse {
                host: host.to_string(),
            }),
        }
    }

    #[instrument(skip(self, containers))]
    async fn teardown(
        &self,
        host: &str,
        containers: Vec<String>,
        all: bool,
    ) -> Result<TeardownReply, ProbeError> {
        let request = supervisor_request::Request::Teardown(TeardownRequest { containers, all });
        match self.call(host, request, TEARDOWN_TIMEOUT).await? {
            supervisor_response::Response::Teardown(reply) => Ok(reply),
            _ => Err(ProbeError::UnexpectedResponse {
                host: host.to_string(),
            }),
        }
    }
}
