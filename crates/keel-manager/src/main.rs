// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Keel Manager - control plane server
//!
//! A QUIC server responsible for:
//! - Supervisor admission (health probe, region check) and retirement
//! - Router, app and peer manager registration
//! - Task tracking for every mutating call

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use keel_manager::auth::{Authenticator, StaticAuthenticator};
use keel_manager::config::Config;
use keel_manager::runtime::ManagerRuntime;
use keel_manager::store::{MemoryStore, PostgresStore, RegistryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keel_manager=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = Config::from_env()?;

    info!(
        listen_addr = %config.listen_addr,
        region = %config.region,
        host = %config.host,
        supervisor_port = config.supervisor_port,
        "Starting Keel Manager"
    );

    let store: Arc<dyn RegistryStore> = match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url).await?;
            info!("Connected to registry database");
            Arc::new(store)
        }
        None => {
            warn!("KEEL_DATABASE_URL not set, registry is in-memory and lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let authenticator: Arc<dyn Authenticator> = match &config.users_file {
        Some(path) => {
            let auth = StaticAuthenticator::from_file(path)
                .with_context(|| format!("loading users from {}", path.display()))?;
            info!(users = auth.user_count(), "Credentials loaded");
            Arc::new(auth)
        }
        None => {
            warn!("KEEL_USERS_FILE not set, every authenticated call will be rejected");
            Arc::new(StaticAuthenticator::default())
        }
    };

    let mut builder = ManagerRuntime::builder()
        .store(store)
        .authenticator(authenticator)
        .region(&config.region)
        .host(&config.host)
        .bind_addr(config.listen_addr)
        .supervisor_port(config.supervisor_port)
        .domain(&config.domain)
        .result_duration(config.result_duration)
        .skip_cert_verification(config.skip_cert_verification);

    if let (Some(cert), Some(key)) = (&config.tls_cert_path, &config.tls_key_path) {
        let cert_pem = std::fs::read(cert)
            .with_context(|| format!("reading certificate {}", cert.display()))?;
        let key_pem =
            std::fs::read(key).with_context(|| format!("reading private key {}", key.display()))?;
        builder = builder.tls_pem(cert_pem, key_pem);
    } else {
        warn!("KEEL_TLS_CERT/KEEL_TLS_KEY not set, using a self-signed certificate");
    }

    let runtime = builder.build()?.start().await?;

    info!(addr = %runtime.local_addr(), "Manager server ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    runtime.shutdown().await?;

    info!("Keel Manager shut down");

    Ok(())
}
