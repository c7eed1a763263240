// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable runtime for keel-manager.
//!
//! [`ManagerRuntime`] runs the manager inside an existing tokio application
//! instead of as the standalone binary.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use keel_manager::auth::StaticAuthenticator;
//! use keel_manager::runtime::ManagerRuntime;
//! use keel_manager::store::MemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = ManagerRuntime::builder()
//!         .region("us-west")
//!         .store(Arc::new(MemoryStore::new()))
//!         .authenticator(Arc::new(StaticAuthenticator::default()))
//!         .bind_addr("0.0.0.0:7100".parse()?)
//!         .build()?
//!         .start()
//!         .await?;
//!
//!     // ... run your application ...
//!
//!     runtime.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use keel_protocol::{KeelServer, KeelServerConfig, ServerError};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::admission::{QuicSupervisorClient, SupervisorClient};
use crate::auth::Authenticator;
use crate::context::{ContextConfig, ControlPlaneContext};
use crate::server::run_manager_server;
use crate::store::RegistryStore;

/// Builder for a [`ManagerRuntime`].
pub struct ManagerRuntimeBuilder {
    store: Option<Arc<dyn RegistryStore>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    supervisors: Option<Arc<dyn SupervisorClient>>,
    region: Option<String>,
    host: String,
    bind_addr: SocketAddr,
    supervisor_port: u16,
    domain: String,
    result_duration: Duration,
    tls: Option<(Vec<u8>, Vec<u8>)>,
    skip_cert_verification: bool,
}

impl Default for ManagerRuntimeBuilder {
    fn default() -> Self {
        Self {
            store: None,
            authenticator: None,
            supervisors: None,
            region: None,
            host: "localhost".to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 7100)),
            supervisor_port: 7101,
            domain: "keel.local".to_string(),
            result_duration: Duration::from_secs(1800), // 30 minutes
            tls: None,
            skip_cert_verification: false,
        }
    }
}

impl ManagerRuntimeBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the registry store (required).
    pub fn store(mut self, store: Arc<dyn RegistryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the credential verifier (required).
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Set the client used to probe and tear down supervisors.
    ///
    /// Default: a QUIC client on the supervisor port
    pub fn supervisors(mut self, supervisors: Arc<dyn SupervisorClient>) -> Self {
        self.supervisors = Some(supervisors);
        self
    }

    /// Set the region this manager serves (required).
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the host name of this manager, used by `GetSelf`.
    ///
    /// Default: `localhost`
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the bind address for the QUIC server. Port 0 picks a free port;
    /// the bound port is the one advertised.
    ///
    /// Default: `0.0.0.0:7100`
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the port supervisors listen on.
    ///
    /// Default: 7101
    pub fn supervisor_port(mut self, port: u16) -> Self {
        self.supervisor_port = port;
        self
    }

    /// Set the suffix of generated CNames.
    ///
    /// Default: `keel.local`
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Set how long finished task results stay pollable.
    ///
    /// Default: 30 minutes
    pub fn result_duration(mut self, duration: Duration) -> Self {
        self.result_duration = duration;
        self
    }

    /// Set the server certificate chain and private key (PEM).
    ///
    /// Default: a self-signed certificate for the host name
    pub fn tls_pem(mut self, cert_pem: Vec<u8>, key_pem: Vec<u8>) -> Self {
        self.tls = Some((cert_pem, key_pem));
        self
    }

    /// Skip certificate verification when calling supervisors.
    ///
    /// Default: `false`
    pub fn skip_cert_verification(mut self, skip: bool) -> Self {
        self.skip_cert_verification = skip;
        self
    }

    /// Build the runtime configuration.
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<ManagerRuntimeConfig> {
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("store is required"))?;
        let authenticator = self
            .authenticator
            .ok_or_else(|| anyhow::anyhow!("authenticator is required"))?;
        let region = self
            .region
            .filter(|r| !r.is_empty())
            .ok_or_else(|| anyhow::anyhow!("region is required"))?;
        let supervisors = self.supervisors.unwrap_or_else(|| {
            Arc::new(QuicSupervisorClient::new(
                self.supervisor_port,
                self.skip_cert_verification,
            ))
        });

        Ok(ManagerRuntimeConfig {
            store,
            authenticator,
            supervisors,
            region,
            host: self.host,
            bind_addr: self.bind_addr,
            supervisor_port: self.supervisor_port,
            domain: self.domain,
            result_duration: self.result_duration,
            tls: self.tls,
        })
    }
}

/// Configuration for a [`ManagerRuntime`].
pub struct ManagerRuntimeConfig {
    store: Arc<dyn RegistryStore>,
    authenticator: Arc<dyn Authenticator>,
    supervisors: Arc<dyn SupervisorClient>,
    region: String,
    host: String,
    bind_addr: SocketAddr,
    supervisor_port: u16,
    domain: String,
    result_duration: Duration,
    tls: Option<(Vec<u8>, Vec<u8>)>,
}

impl ManagerRuntimeConfig {
    /// Bind the QUIC server and start serving.
    pub async fn start(self) -> Result<ManagerRuntime> {
        let server_config = KeelServerConfig {
            bind_addr: self.bind_addr,
            ..KeelServerConfig::from_env()
        };
        let server_config = match self.tls {
            Some((cert_pem, key_pem)) => KeelServerConfig {
                cert_pem,
                key_pem,
                ..server_config
            },
            None => server_config
                .with_self_signed(vec![self.host.clone(), "localhost".to_string()])?,
        };

        let server = Arc::new(KeelServer::new(server_config)?);
        let local_addr = server.local_addr()?;

        let ctx = Arc::new(ControlPlaneContext::new(
            ContextConfig {
                region: self.region,
                host: self.host,
                port: local_addr.port(),
                supervisor_port: self.supervisor_port,
                domain: self.domain,
                result_duration: self.result_duration,
            },
            self.store.clone(),
            self.authenticator,
            self.supervisors,
        ));

        let server_handle = tokio::spawn(run_manager_server(server.clone(), ctx.clone()));

        info!(
            addr = %local_addr,
            region = %ctx.region(),
            host = %ctx.host(),
            store = self.store.backend(),
            "ManagerRuntime started"
        );

        Ok(ManagerRuntime {
            server,
            server_handle,
            ctx,
            local_addr,
        })
    }
}

/// A running manager.
///
/// Call [`shutdown`](Self::shutdown) for graceful termination.
pub struct ManagerRuntime {
    server: Arc<KeelServer>,
    server_handle: JoinHandle<std::result::Result<(), ServerError>>,
    ctx: Arc<ControlPlaneContext>,
    local_addr: SocketAddr,
}

impl ManagerRuntime {
    /// Create a new builder for configuring the runtime.
    pub fn builder() -> ManagerRuntimeBuilder {
        ManagerRuntimeBuilder::new()
    }

    /// Address the QUIC server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Shared control plane state.
    pub fn context(&self) -> &Arc<ControlPlaneContext> {
        &self.ctx
    }

    pub fn is_running(&self) -> bool {
        !self.server_handle.is_finished()
    }

    /// Stop accepting calls and wait for the server to stop.
    ///
    /// Tasks already running finish on their own; their results are not
    /// reachable once the server is gone.
    pub async fn shutdown(self) -> Result<()> {
        info!("ManagerRuntime shutting down...");
        self.server.close();

        match self.server_handle.await {
            Ok(Ok(())) => {
                info!("ManagerRuntime shutdown complete");
                Ok(())
            }
            Ok(Err(e)) => {
                error!("ManagerRuntime server error during shutdown: {}", e);
                Err(e.into())
            }
            Err(e) => {
                error!("ManagerRuntime server task panicked: {}", e);
                Err(anyhow::anyhow!("server task panicked: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::MockSupervisorClient;
    use crate::auth::StaticAuthenticator;
    use crate::store::MemoryStore;

    #[test]
    fn test_build_requires_region() {
        let err = ManagerRuntime::builder()
            .store(Arc::new(MemoryStore::new()))
            .authenticator(Arc::new(StaticAuthenticator::default()))
            .build()
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "region is required");
    }

    #[tokio::test]
    async fn test_start_advertises_bound_port() {
        let runtime = ManagerRuntime::builder()
            .region("us-west")
            .store(Arc::new(MemoryStore::new()))
            .authenticator(Arc::new(StaticAuthenticator::default()))
            .supervisors(Arc::new(MockSupervisorClient::new("us-west")))
            .bind_addr("127.0.0.1:0".parse().unwrap())
            .build()
            .unwrap()
            .start()
            .await
            .unwrap();

        let port = runtime.local_addr().port();
        assert_ne!(port, 0);
        assert_eq!(runtime.context().port(), port);
        assert!(runtime.is_running());

        runtime.shutdown().await.unwrap();
    }
}
