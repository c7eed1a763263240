// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! QUIC server side of the keel RPC transport.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use quinn::{Endpoint, Incoming, RecvStream, SendStream, ServerConfig, TransportConfig};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

use crate::frame::{Frame, FrameError, MessageType, read_frame, write_frame};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("bind error: {0}")]
    Bind(#[from] std::io::Error),

    #[error("connection error: {0}")]
    Connection(#[from] quinn::ConnectionError),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("invalid transport config: {0}")]
    Config(String),

    #[error("stream error: {0}")]
    Stream(String),
}

/// QUIC listener settings.
#[derive(Debug, Clone)]
pub struct KeelServerConfig {
    pub bind_addr: SocketAddr,
    /// Certificate chain (PEM)
    pub cert_pem: Vec<u8>,
    /// Private key (PEM)
    pub key_pem: Vec<u8>,
    /// Handshakes allowed in flight
    pub max_incoming: u32,
    /// Concurrent calls per connection
    pub max_bi_streams: u32,
    pub idle_timeout_ms: u64,
    /// 0 disables keep-alive
    pub keep_alive_interval_ms: u64,
    /// 0 keeps the OS default
    pub udp_receive_buffer_size: usize,
    /// 0 keeps the OS default
    pub udp_send_buffer_size: usize,
    /// Connections served at once, 0 for unlimited
    pub max_concurrent_handlers: u32,
}

impl Default for KeelServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 7100)),
            cert_pem: Vec::new(),
            key_pem: Vec::new(),
            max_incoming: 4_096,
            max_bi_streams: 512,
            idle_timeout_ms: 60_000,
            keep_alive_interval_ms: 10_000,
            udp_receive_buffer_size: 1024 * 1024,
            udp_send_buffer_size: 1024 * 1024,
            max_concurrent_handlers: 0,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl KeelServerConfig {
    /// Read transport tuning from the environment, keeping defaults for
    /// anything unset or unparseable.
    ///
    /// - `KEEL_QUIC_MAX_INCOMING` (default: 4096)
    /// - `KEEL_QUIC_MAX_BI_STREAMS` (default: 512)
    /// - `KEEL_QUIC_IDLE_TIMEOUT_MS` (default: 60000)
    /// - `KEEL_QUIC_KEEP_ALIVE_MS` (default: 10000)
    /// - `KEEL_QUIC_UDP_RECV_BUFFER` (default: 1048576)
    /// - `KEEL_QUIC_UDP_SEND_BUFFER` (default: 1048576)
    /// - `KEEL_QUIC_MAX_HANDLERS` (default: 0)
    ///
    /// The bind address and certificates are not read here.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_incoming: env_or("KEEL_QUIC_MAX_INCOMING", d.max_incoming),
            max_bi_streams: env_or("KEEL_QUIC_MAX_BI_STREAMS", d.max_bi_streams),
            idle_timeout_ms: env_or("KEEL_QUIC_IDLE_TIMEOUT_MS", d.idle_timeout_ms),
            keep_alive_interval_ms: env_or("KEEL_QUIC_KEEP_ALIVE_MS", d.keep_alive_interval_ms),
            udp_receive_buffer_size: env_or("KEEL_QUIC_UDP_RECV_BUFFER", d.udp_receive_buffer_size),
            udp_send_buffer_size: env_or("KEEL_QUIC_UDP_SEND_BUFFER", d.udp_send_buffer_size),
            max_concurrent_handlers: env_or("KEEL_QUIC_MAX_HANDLERS", d.max_concurrent_handlers),
            ..d
        }
    }

    /// Fill in a freshly generated self-signed certificate for `names`.
    pub fn with_self_signed(mut self, names: Vec<String>) -> Result<Self, ServerError> {
        let cert =
            rcgen::generate_simple_self_signed(names).map_err(|e| ServerError::Tls(e.to_string()))?;
        self.cert_pem = cert.cert.pem().into_bytes();
        self.key_pem = cert.key_pair.serialize_pem().into_bytes();
        Ok(self)
    }
}

/// A bound QUIC endpoint accepting keel connections.
pub struct KeelServer {
    endpoint: Endpoint,
    config: KeelServerConfig,
}

impl KeelServer {
    pub fn new(config: KeelServerConfig) -> Result<Self, ServerError> {
        use socket2::{Domain, Protocol, Socket, Type};

        let server_config = Self::build_server_config(&config)?;

        let domain = if config.bind_addr.is_ipv6() {
            Domain::IPV6
        } else {
            Domain::IPV4
        };
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        if config.udp_receive_buffer_size > 0
            && let Err(e) = socket.set_recv_buffer_size(config.udp_receive_buffer_size)
        {
            warn!(size = config.udp_receive_buffer_size, error = %e, "Failed to set UDP receive buffer size");
        }
        if config.udp_send_buffer_size > 0
            && let Err(e) = socket.set_send_buffer_size(config.udp_send_buffer_size)
        {
            warn!(size = config.udp_send_buffer_size, error = %e, "Failed to set UDP send buffer size");
        }
        socket.bind(&config.bind_addr.into())?;

        let runtime = quinn::default_runtime()
            .ok_or_else(|| ServerError::Bind(std::io::Error::other("no async runtime found")))?;
        let endpoint = Endpoint::new_with_abstract_socket(
            quinn::EndpointConfig::default(),
            Some(server_config),
            runtime.wrap_udp_socket(socket.into())?,
            runtime,
        )?;

        info!(
            addr = %config.bind_addr,
            max_bi_streams = config.max_bi_streams,
            idle_timeout_ms = config.idle_timeout_ms,
            max_handlers = config.max_concurrent_handlers,
            "QUIC server bound"
        );

        Ok(Self { endpoint, config })
    }

    /// Bind with a self-signed `localhost` certificate.
    pub fn localhost(bind_addr: SocketAddr) -> Result<Self, ServerError> {
        let config = KeelServerConfig {
            bind_addr,
            ..KeelServerConfig::from_env()
        }
        .with_self_signed(vec!["localhost".to_string()])?;
        Self::new(config)
    }

    pub fn config(&self) -> &KeelServerConfig {
        &self.config
    }

    fn build_server_config(config: &KeelServerConfig) -> Result<ServerConfig, ServerError> {
        let certs = rustls_pemfile::certs(&mut config.cert_pem.as_slice())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ServerError::Tls(format!("failed to parse certificates: {}", e)))?;
        if certs.is_empty() {
            return Err(ServerError::Tls("no certificate found".to_string()));
        }
        let key = rustls_pemfile::private_key(&mut config.key_pem.as_slice())
            .map_err(|e| ServerError::Tls(format!("failed to parse private key: {}", e)))?
            .ok_or_else(|| ServerError::Tls("no private key found".to_string()))?;

        let crypto = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| ServerError::Tls(e.to_string()))?;

        let idle = Duration::from_millis(config.idle_timeout_ms)
            .try_into()
            .map_err(|_| ServerError::Config(format!("idle timeout {}ms", config.idle_timeout_ms)))?;
        let mut transport = TransportConfig::default();
        transport.max_idle_timeout(Some(idle));
        transport.max_concurrent_bidi_streams(config.max_bi_streams.into());
        // Calls only use bidirectional streams.
        transport.max_concurrent_uni_streams(0u8.into());
        if config.keep_alive_interval_ms > 0 {
            transport.keep_alive_interval(Some(Duration::from_millis(config.keep_alive_interval_ms)));
        }

        let mut server_config = ServerConfig::with_crypto(Arc::new(
            quinn::crypto::rustls::QuicServerConfig::try_from(crypto)
                .map_err(|e| ServerError::Tls(e.to_string()))?,
        ));
        server_config.transport_config(Arc::new(transport));
        server_config.max_incoming(config.max_incoming as usize);

        Ok(server_config)
    }

    pub async fn accept(&self) -> Option<Incoming> {
        self.endpoint.accept().await
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.endpoint.local_addr()?)
    }

    /// Stop accepting and close every open connection.
    pub fn close(&self) {
        self.endpoint.close(0u32.into(), b"server closing");
    }

    /// Accept connections until the endpoint is closed, handing each one
    /// to `handler` on its own task.
    #[instrument(skip(self, handler))]
    pub async fn run<H, Fut>(&self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(ConnectionHandler) -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let limit = (self.config.max_concurrent_handlers > 0)
            .then(|| Arc::new(Semaphore::new(self.config.max_concurrent_handlers as usize)));

        info!("QUIC server running");
        while let Some(incoming) = self.accept().await {
            let handler = handler.clone();
            let limit = limit.clone();

            tokio::spawn(async move {
                let _permit = match limit {
                    Some(sem) => match sem.acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(_) => return,
                    },
                    None => None,
                };

                match incoming.await {
                    Ok(connection) => {
                        debug!(remote = %connection.remote_address(), "accepted connection");
                        handler(ConnectionHandler::new(connection)).await;
                    }
                    Err(e) => warn!(error = %e, "failed to accept connection"),
                }
            });
        }
        info!("QUIC server stopped");

        Ok(())
    }

    /// Serve unary calls: every bidirectional stream carries one `Req`
    /// answered by the `Resp` that `handler` produces.
    ///
    /// Requests that fail to decode are answered with an error frame holding
    /// the message `on_decode_error` builds.
    pub async fn serve<Req, Resp, E, H, Fut>(
        &self,
        handler: H,
        on_decode_error: fn(String) -> E,
    ) -> Result<(), ServerError>
    where
        Req: prost::Message + Default + 'static,
        Resp: prost::Message + 'static,
        E: prost::Message + 'static,
        H: Fn(Req) -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = Resp> + Send + 'static,
    {
        self.run(move |conn| {
            let handler = handler.clone();
            async move {
                conn.run(move |mut stream| {
                    let handler = handler.clone();
                    async move {
                        if let Err(e) = stream.handle_request(handler, on_decode_error).await {
                            debug!(error = %e, "call ended with error");
                        }
                    }
                })
                .await;
            }
        })
        .await
    }
}

/// One accepted QUIC connection.
pub struct ConnectionHandler {
    connection: quinn::Connection,
}

impl ConnectionHandler {
    pub fn new(connection: quinn::Connection) -> Self {
        Self { connection }
    }

    pub fn remote_address(&self) -> SocketAddr {
        self.connection.remote_address()
    }

    pub async fn accept_bi(&self) -> Result<(SendStream, RecvStream), ServerError> {
        Ok(self.connection.accept_bi().await?)
    }

    /// Spawn `handler` for every bidirectional stream until the peer goes away.
    #[instrument(skip(self, handler), fields(remote = %self.remote_address()))]
    pub async fn run<H, Fut>(&self, handler: H)
    where
        H: Fn(StreamHandler) -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        loop {
            match self.accept_bi().await {
                Ok((send, recv)) => {
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        handler(StreamHandler::new(send, recv)).await;
                    });
                }
                Err(ServerError::Connection(
                    quinn::ConnectionError::ApplicationClosed(_)
                    | quinn::ConnectionError::LocallyClosed
                    | quinn::ConnectionError::TimedOut,
                )) => {
                    debug!("connection closed");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "error accepting stream");
                    break;
                }
            }
        }
    }

    pub fn close(&self, code: u32, reason: &[u8]) {
        self.connection.close(code.into(), reason);
    }
}

/// One call in flight on a bidirectional stream.
pub struct StreamHandler {
    send: SendStream,
    recv: RecvStream,
}

impl StreamHandler {
    pub fn new(send: SendStream, recv: RecvStream) -> Self {
        Self { send, recv }
    }

    pub async fn read_frame(&mut self) -> Result<Frame, ServerError> {
        Ok(read_frame(&mut self.recv).await?)
    }

    pub async fn write_frame(&mut self, frame: &Frame) -> Result<(), ServerError> {
        Ok(write_frame(&mut self.send, frame).await?)
    }

    /// Read one request, answer it, and finish the send side.
    pub async fn handle_request<Req, Resp, E, H, Fut>(
        &mut self,
        handler: H,
        on_decode_error: fn(String) -> E,
    ) -> Result<(), ServerError>
    where
        Req: prost::Message + Default,
        Resp: prost::Message,
        E: prost::Message,
        H: FnOnce(Req) -> Fut,
        Fut: std::future::Future<Output = Resp>,
    {
        let frame = self.read_frame().await?;
        let reply = match frame.decode_as::<Req>(MessageType::Request) {
            Ok(request) => Frame::response(&handler(request).await)?,
            Err(e) => {
                warn!(error = %e, "rejecting undecodable request");
                Frame::error(&on_decode_error(e.to_string()))?
            }
        };
        self.write_frame(&reply).await?;
        self.finish()
    }

    /// Signal that no more data will be sent.
    pub fn finish(&mut self) -> Result<(), ServerError> {
        self.send
            .finish()
            .map_err(|e| ServerError::Stream(e.to_string()))
    }
}
