// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for the keel SDK.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Result, SdkError};

/// Configuration for the [`KeelSdk`](crate::KeelSdk).
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// Manager address to connect to.
    pub server_addr: SocketAddr,
    /// Server name for TLS verification.
    pub server_name: String,
    /// Skip TLS certificate verification (development only).
    pub skip_cert_verification: bool,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// User sent with every authenticated call.
    pub user: String,
    pub secret: String,
    /// Delay between polls while waiting for a task.
    pub poll_interval: Duration,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 7100)), // Manager default port
            server_name: "localhost".to_string(),
            skip_cert_verification: false,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            user: String::new(),
            secret: String::new(),
            poll_interval: Duration::from_millis(250),
        }
    }
}

impl SdkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration for a development manager on localhost.
    ///
    /// This enables certificate verification skipping.
    pub fn localhost(addr: SocketAddr) -> Self {
        Self {
            server_addr: addr,
            skip_cert_verification: true,
            ..Self::default()
        }
    }

    /// Create a configuration from environment variables.
    ///
    /// Environment variables:
    /// - `KEEL_MANAGER_ADDR`: Manager address (default: "127.0.0.1:7100")
    /// - `KEEL_SERVER_NAME`: Server name for TLS (default: "localhost")
    /// - `KEEL_SKIP_CERT_VERIFICATION`: Skip TLS verification (default: "false")
    /// - `KEEL_CONNECT_TIMEOUT_MS`: Connection timeout in milliseconds (default: 5000)
    /// - `KEEL_REQUEST_TIMEOUT_MS`: Request timeout in milliseconds (default: 30000)
    /// - `KEEL_USER`, `KEEL_SECRET`: Credentials (default: none)
    /// - `KEEL_POLL_INTERVAL_MS`: Task poll interval (default: 250)
    pub fn from_env() -> Result<Self> {
        let server_addr = std::env::var("KEEL_MANAGER_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:7100".to_string())
            .parse()
            .map_err(|e| SdkError::Config(format!("invalid KEEL_MANAGER_ADDR: {}", e)))?;

        let server_name =
            std::env::var("KEEL_SERVER_NAME").unwrap_or_else(|_| "localhost".to_string());

        let skip_cert_verification = std::env::var("KEEL_SKIP_CERT_VERIFICATION")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            server_addr,
            server_name,
            skip_cert_verification,
            connect_timeout: Duration::from_millis(env_ms("KEEL_CONNECT_TIMEOUT_MS", 5_000)?),
            request_timeout: Duration::from_millis(env_ms("KEEL_REQUEST_TIMEOUT_MS", 30_000)?),
            user: std::env::var("KEEL_USER").unwrap_or_default(),
            secret: std::env::var("KEEL_SECRET").unwrap_or_default(),
            poll_interval: Duration::from_millis(env_ms("KEEL_POLL_INTERVAL_MS", 250)?),
        })
    }

    pub fn with_server_addr(mut self, addr: SocketAddr) -> Self {
        self.server_addr = addr;
        self
    }

    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    pub fn with_skip_cert_verification(mut self, skip: bool) -> Self {
        self.skip_cert_verification = skip;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the credentials sent with authenticated calls.
    pub fn with_credentials(mut self, user: impl Into<String>, secret: impl Into<String>) -> Self {
        self.user = user.into();
        self.secret = secret.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

fn env_ms(name: &str, default: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| SdkError::Config(format!("invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SdkConfig::default();
        assert_eq!(config.server_addr, "127.0.0.1:7100".parse().unwrap());
        assert_eq!(config.server_name, "localhost");
        assert!(!config.skip_cert_verification);
        assert!(config.user.is_empty());
    }

    #[test]
    fn test_localhost_config() {
        let config = SdkConfig::localhost("127.0.0.1:9000".parse().unwrap());
        assert!(config.skip_cert_verification);
        assert_eq!(config.server_addr.port(), 9000);
    }

    #[test]
    fn test_builder_methods() {
        let config = SdkConfig::new()
            .with_server_addr("192.168.1.100:7100".parse().unwrap())
            .with_server_name("manager.us-west")
            .with_skip_cert_verification(true)
            .with_connect_timeout(Duration::from_secs(2))
            .with_request_timeout(Duration::from_secs(60))
            .with_credentials("root", "s3cret")
            .with_poll_interval(Duration::from_millis(10));

        assert_eq!(config.server_addr, "192.168.1.100:7100".parse().unwrap());
        assert_eq!(config.server_name, "manager.us-west");
        assert!(config.skip_cert_verification);
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.user, "root");
        assert_eq!(config.secret, "s3cret");
        assert_eq!(config.poll_interval, Duration::from_millis(10));
    }
}
