// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for keel-manager.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Manager configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// QUIC listen address. Its port is advertised to peers.
    pub listen_addr: SocketAddr,
    /// Region this manager serves
    pub region: String,
    /// Host name of this manager
    pub host: String,
    /// Port supervisors listen on
    pub supervisor_port: u16,
    /// How long completed task results stay pollable
    pub result_duration: Duration,
    /// PostgreSQL registry store; the in-memory store is used when unset
    pub database_url: Option<String>,
    /// JSON credential file for the static authenticator
    pub users_file: Option<PathBuf>,
    /// Suffix for generated CNames
    pub domain: String,
    /// TLS certificate chain (PEM); a self-signed one is generated when unset
    pub tls_cert_path: Option<PathBuf>,
    /// TLS private key (PEM)
    pub tls_key_path: Option<PathBuf>,
    /// Skip TLS verification when probing supervisors
    pub skip_cert_verification: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup` instead of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let listen_addr = match lookup("KEEL_LISTEN_ADDR") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidAddr(raw.clone()))?,
            None => SocketAddr::from(([0, 0, 0, 0], 7100)),
        };

        let region = lookup("KEEL_REGION")
            .filter(|r| !r.is_empty())
            .ok_or(ConfigError::MissingEnvVar("KEEL_REGION"))?;

        let host = lookup("KEEL_HOST").unwrap_or_else(|| "localhost".to_string());

        let supervisor_port: u16 = lookup("KEEL_SUPERVISOR_PORT")
            .unwrap_or_else(|| "7101".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let result_secs: u64 = lookup("KEEL_RESULT_DURATION_SECS")
            .unwrap_or_else(|| "1800".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidNumber("KEEL_RESULT_DURATION_SECS"))?;

        let skip_cert_verification = lookup("KEEL_SKIP_CERT_VERIFICATION")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            listen_addr,
            region,
            host,
            supervisor_port,
            result_duration: Duration::from_secs(result_secs),
            database_url: lookup("KEEL_DATABASE_URL").filter(|v| !v.is_empty()),
            users_file: lookup("KEEL_USERS_FILE").map(PathBuf::from),
            domain: lookup("KEEL_DOMAIN").unwrap_or_else(|| "keel.local".to_string()),
            tls_cert_path: lookup("KEEL_TLS_CERT").map(PathBuf::from),
            tls_key_path: lookup("KEEL_TLS_KEY").map(PathBuf::from),
            skip_cert_verification,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    /// The listen address does not parse.
    #[error("Invalid listen address: {0}")]
    InvalidAddr(String),
    /// The port number is invalid.
    #[error("Invalid port number")]
    InvalidPort,
    /// A numeric variable does not parse.
    #[error("Invalid number in {0}")]
    InvalidNumber(&'static str),
}
