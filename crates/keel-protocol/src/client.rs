// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! QUIC client side of the keel RPC transport.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use quinn::{ClientConfig, Connection, Endpoint, TransportConfig};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::frame::{Frame, FrameError, MessageType, read_frame, write_frame};
use crate::manager_proto::RpcError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Connection(#[from] quinn::ConnectionError),

    #[error("connect error: {0}")]
    Connect(#[from] quinn::ConnectError),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stream closed: {0}")]
    ClosedStream(#[from] quinn::ClosedStream),

    #[error("TLS error: {0}")]
    Tls(String),

    /// The peer could not decode the request.
    #[error("rejected by peer [{code}]: {message}")]
    Rejected { code: String, message: String },

    #[error("no connection established")]
    NotConnected,

    #[error("timed out after {0}ms")]
    Timeout(u64),
}

#[derive(Debug, Clone)]
pub struct KeelClientConfig {
    pub server_addr: SocketAddr,
    /// Name checked against the server certificate
    pub server_name: String,
    /// Extra trust anchors (PEM), added to the webpki roots
    pub ca_cert_pem: Option<Vec<u8>>,
    /// Accept any server certificate. Development only.
    pub dangerous_skip_cert_verification: bool,
    /// 0 disables keep-alive
    pub keep_alive_interval_ms: u64,
    pub idle_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// Upper bound for one call, from opening the stream to the reply
    pub request_timeout_ms: u64,
}

impl Default for KeelClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 7100)),
            server_name: "localhost".to_string(),
            ca_cert_pem: None,
            dangerous_skip_cert_verification: false,
            keep_alive_interval_ms: 10_000,
            idle_timeout_ms: 60_000,
            connect_timeout_ms: 5_000,
            request_timeout_ms: 30_000,
        }
    }
}

/// A lazily connected client that reuses one QUIC connection for all calls.
pub struct KeelClient {
    endpoint: Endpoint,
    connection: Mutex<Option<Connection>>,
    config: KeelClientConfig,
}

impl KeelClient {
    pub fn new(config: KeelClientConfig) -> Result<Self, ClientError> {
        let bind = if config.server_addr.is_ipv6() {
            SocketAddr::from(([0u16; 8], 0))
        } else {
            SocketAddr::from(([0, 0, 0, 0], 0))
        };
        let mut endpoint = Endpoint::client(bind)?;
        endpoint.set_default_client_config(Self::build_client_config(&config)?);

        Ok(Self {
            endpoint,
            connection: Mutex::new(None),
            config,
        })
    }

    /// Client for a development server at `addr` with a self-signed certificate.
    pub fn localhost(addr: SocketAddr) -> Result<Self, ClientError> {
        Self::new(KeelClientConfig {
            server_addr: addr,
            dangerous_skip_cert_verification: true,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &KeelClientConfig {
        &self.config
    }

    fn build_client_config(config: &KeelClientConfig) -> Result<ClientConfig, ClientError> {
        let crypto = if config.dangerous_skip_cert_verification {
            rustls::ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(SkipServerVerification))
                .with_no_client_auth()
        } else {
            let mut roots = rustls::RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            if let Some(pem) = &config.ca_cert_pem {
                for cert in rustls_pemfile::certs(&mut pem.as_slice()) {
                    let cert = cert.map_err(|e| ClientError::Tls(e.to_string()))?;
                    roots
                        .add(cert)
                        .map_err(|e| ClientError::Tls(e.to_string()))?;
                }
            }
            rustls::ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth()
        };

        let mut transport = TransportConfig::default();
        if config.keep_alive_interval_ms > 0 {
            transport.keep_alive_interval(Some(Duration::from_millis(config.keep_alive_interval_ms)));
        }
        let idle = Duration::from_millis(config.idle_timeout_ms)
            .try_into()
            .map_err(|_| ClientError::Tls(format!("idle timeout {}ms out of range", config.idle_timeout_ms)))?;
        transport.max_idle_timeout(Some(idle));

        let quic = quinn::crypto::rustls::QuicClientConfig::try_from(crypto)
            .map_err(|e| ClientError::Tls(e.to_string()))?;
        let mut client_config = ClientConfig::new(Arc::new(quic));
        client_config.transport_config(Arc::new(transport));

        Ok(client_config)
    }

    /// Establish the connection unless a live one exists.
    #[instrument(skip(self), fields(addr = %self.config.server_addr))]
    pub async fn connect(&self) -> Result<(), ClientError> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref()
            && conn.close_reason().is_none()
        {
            return Ok(());
        }

        let connecting = self
            .endpoint
            .connect(self.config.server_addr, &self.config.server_name)?;
        let connection = tokio::time::timeout(
            Duration::from_millis(self.config.connect_timeout_ms),
            connecting,
        )
        .await
        .map_err(|_| ClientError::Timeout(self.config.connect_timeout_ms))??;

        info!("connected");
        *guard = Some(connection);
        Ok(())
    }

    async fn connection(&self) -> Result<Connection, ClientError> {
        self.connect().await?;
        self.connection
            .lock()
            .await
            .clone()
            .ok_or(ClientError::NotConnected)
    }

    /// Perform one call on a fresh bidirectional stream.
    #[instrument(skip(self, request))]
    pub async fn request<Req: prost::Message, Resp: prost::Message + Default>(
        &self,
        request: &Req,
    ) -> Result<Resp, ClientError> {
        let timeout_ms = self.config.request_timeout_ms;
        tokio::time::timeout(Duration::from_millis(timeout_ms), self.call(request))
            .await
            .map_err(|_| ClientError::Timeout(timeout_ms))?
    }

    async fn call<Req: prost::Message, Resp: prost::Message + Default>(
        &self,
        request: &Req,
    ) -> Result<Resp, ClientError> {
        let conn = self.connection().await?;
        let (mut send, mut recv) = conn.open_bi().await?;

        write_frame(&mut send, &Frame::request(request)?).await?;
        send.finish()?;

        let frame = read_frame(&mut recv).await?;
        match frame.message_type {
            MessageType::Response => Ok(frame.decode()?),
            // Supervisor and manager error messages share the code/message layout.
            MessageType::Error => {
                let err: RpcError = frame.decode()?;
                debug!(code = %err.code, "call rejected");
                Err(ClientError::Rejected {
                    code: err.code,
                    message: err.message,
                })
            }
            MessageType::Request => Err(FrameError::UnexpectedFrame {
                expected: MessageType::Response,
                actual: MessageType::Request,
            }
            .into()),
        }
    }

    pub async fn close(&self) {
        if let Some(conn) = self.connection.lock().await.take() {
            conn.close(0u32.into(), b"client closing");
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .await
            .as_ref()
            .is_some_and(|conn| conn.close_reason().is_none())
    }
}

impl Drop for KeelClient {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.connection.try_lock()
            && let Some(conn) = guard.take()
        {
            conn.close(0u32.into(), b"client dropped");
        }
    }
}

/// Accepts every server certificate.
#[derive(Debug)]
struct SkipServerVerification;

impl rustls::client::danger::ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
