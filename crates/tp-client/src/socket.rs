//! Blocking WebSocket wrapper
//!
//! Adapts a `tokio-tungstenite` stream into the blocking [`Transport`]
//! interface. Each call drives the socket's private current-thread runtime
//! until that one operation completes or times out.

use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use tp_core::config::ClientConfig;
use tp_core::error::TransportError;
use tp_core::traits::Transport;
use tp_core::TpError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A connected WebSocket driven synchronously
pub struct SyncSocket {
    runtime: Runtime,
    stream: Option<WsStream>,
    endpoint: String,
}

impl SyncSocket {
    /// Connect to the configured endpoint.
    ///
    /// Handshake rejections (the server answered the upgrade with a non-101
    /// status) are retried `connect_retries` times, `retry_delay` apart. Any
    /// other failure is returned immediately.
    pub fn connect(config: &ClientConfig) -> Result<Self, TransportError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TransportError::Io(format!("Failed to build runtime: {}", e)))?;

        // Only fails when a provider is already installed
        let _ = rustls::crypto::ring::default_provider().install_default();

        let endpoint = config.endpoint();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let request = build_request(&endpoint, config.auth_token.as_deref())?;

            tracing::debug!("Connecting to {} (attempt {})", endpoint, attempt);
            let result =
                runtime.block_on(tokio::time::timeout(config.connect_timeout, connect_async(request)));

            match result {
                Err(_) => return Err(TransportError::ConnectTimeout(config.connect_timeout)),
                Ok(Ok((stream, response))) => {
                    tracing::info!(
                        "Connected to {} (HTTP {})",
                        endpoint,
                        response.status().as_u16()
                    );
                    return Ok(Self {
                        runtime,
                        stream: Some(stream),
                        endpoint,
                    });
                }
                Ok(Err(WsError::Http(response))) => {
                    let status = response.status().as_u16();
                    if attempt > config.connect_retries {
                        tracing::error!(
                            "Connection to {} rejected with HTTP {} after {} attempts",
                            endpoint,
                            status,
                            attempt
                        );
                        return Err(TransportError::Rejected { status });
                    }
                    tracing::warn!(
                        "Connection rejected with HTTP {}. Retrying in {:?}",
                        status,
                        config.retry_delay
                    );
                    std::thread::sleep(config.retry_delay);
                }
                Ok(Err(e)) => return Err(map_ws_error(e)),
            }
        }
    }

    /// URL this socket is connected to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Transport for SyncSocket {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        self.runtime
            .block_on(stream.send(Message::Binary(Bytes::copy_from_slice(data))))
            .map_err(map_ws_error)
    }

    fn recv(&mut self, timeout: Duration) -> Result<Bytes, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        self.runtime.block_on(async {
            tokio::time::timeout(timeout, next_payload(stream))
                .await
                .map_err(|_| TransportError::Timeout(timeout))?
        })
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };

        tracing::debug!("Closing connection to {}", self.endpoint);
        match self.runtime.block_on(stream.close(None)) {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(map_ws_error(e)),
        }
    }
}

impl Drop for SyncSocket {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::debug!("Error closing connection to {}: {}", self.endpoint, e);
        }
    }
}

/// Connect, run `f` with the socket, and close the socket afterwards
/// regardless of how `f` finished.
pub fn with_socket<T, F>(config: &ClientConfig, f: F) -> Result<T, TpError>
where
    F: FnOnce(&mut SyncSocket) -> Result<T, TpError>,
{
    let mut socket = SyncSocket::connect(config)?;
    let result = f(&mut socket);

    if let Err(e) = socket.close() {
        tracing::warn!("Failed to close connection to {}: {}", socket.endpoint, e);
    }
    result
}

/// Wait for the next data-bearing message, skipping control frames
async fn next_payload(stream: &mut WsStream) -> Result<Bytes, TransportError> {
    while let Some(message) = stream.next().await {
        match message.map_err(map_ws_error)? {
            Message::Binary(data) => return Ok(data),
            Message::Text(text) => return Ok(Bytes::copy_from_slice(text.as_str().as_bytes())),
            Message::Close(frame) => {
                tracing::debug!("Peer closed connection: {:?}", frame);
                return Err(TransportError::Closed);
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
        }
    }
    Err(TransportError::Closed)
}

fn build_request(endpoint: &str, token: Option<&str>) -> Result<Request, TransportError> {
    let mut request = endpoint
        .into_client_request()
        .map_err(|e| TransportError::Handshake(format!("Invalid endpoint {}: {}", endpoint, e)))?;

    if let Some(token) = token {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| TransportError::Handshake(format!("Invalid auth token: {}", e)))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }
    Ok(request)
}

fn map_ws_error(e: WsError) -> TransportError {
    match e {
        WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::Closed,
        WsError::Url(e) => TransportError::Handshake(e.to_string()),
        other => TransportError::Io(other.to_string()),
    }
}
