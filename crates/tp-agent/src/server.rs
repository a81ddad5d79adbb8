//! WebSocket listener
//!
//! Accepts incoming connections, checks the bearer token during the upgrade
//! and spawns a handler for each client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_util::sync::CancellationToken;

use tp_core::config::AgentConfig;

use crate::connection::serve_connection;

/// Device-agent emulator serving the shell protocol
pub struct AgentServer {
    config: Arc<AgentConfig>,
    cancel: CancellationToken,
}

impl AgentServer {
    pub fn new(config: AgentConfig, cancel: CancellationToken) -> Self {
        Self {
            config: Arc::new(config),
            cancel,
        }
    }

    /// Bind to `bind_addr` and serve until cancelled
    pub async fn run(&self, bind_addr: &str) -> Result<()> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind to {}", bind_addr))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until cancelled
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!("Agent listening on ws://{}", local_addr);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Agent shutting down");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((socket, peer_addr)) => self.handle_connection(socket, peer_addr),
                        Err(e) => tracing::error!("Failed to accept connection: {}", e),
                    }
                }
            }
        }

        Ok(())
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        tracing::info!("New connection from {}", peer_addr);

        let config = Arc::clone(&self.config);
        let cancel = self.cancel.child_token();

        tokio::spawn(async move {
            let expected = config.auth_token.clone();
            let ws = match accept_hdr_async(socket, move |req: &Request, resp: Response| {
                check_auth(expected.as_deref(), req, resp)
            })
            .await
            {
                Ok(ws) => ws,
                Err(e) => {
                    tracing::warn!("Handshake with {} failed: {}", peer_addr, e);
                    return;
                }
            };

            match serve_connection(ws, config, cancel).await {
                Ok(()) => tracing::info!("Connection from {} closed normally", peer_addr),
                Err(e) => tracing::warn!("Connection from {} closed with error: {:#}", peer_addr, e),
            }
        });
    }
}

fn check_auth(
    expected: Option<&str>,
    req: &Request,
    resp: Response,
) -> Result<Response, ErrorResponse> {
    let Some(token) = expected else {
        return Ok(resp);
    };

    let presented = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if presented == Some(token) {
        Ok(resp)
    } else {
        tracing::warn!("Rejecting upgrade for {}: bad or missing token", req.uri());
        let mut rejection = ErrorResponse::new(Some("unauthorized".to_string()));
        *rejection.status_mut() = StatusCode::UNAUTHORIZED;
        Err(rejection)
    }
}

/// An agent running on a background thread
pub struct AgentHandle {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl AgentHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Base URL clients should connect to
    pub fn url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    /// Stop the agent and wait for its thread to finish
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Agent thread panicked");
            }
        }
    }
}

impl Drop for AgentHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start an agent on its own thread and runtime.
///
/// The listener is bound before returning, so the handle's address accepts
/// connections immediately. Safe to call from synchronous code only.
pub fn spawn_background(config: AgentConfig) -> Result<AgentHandle> {
    let listener = std::net::TcpListener::bind(&config.bind_address)
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;
    listener.set_nonblocking(true)?;
    let local_addr = listener.local_addr()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("Failed to build agent runtime")?;

    let cancel = CancellationToken::new();
    let server = AgentServer::new(config, cancel.clone());

    let thread = std::thread::Builder::new()
        .name("tp-agent".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                let result = match TcpListener::from_std(listener) {
                    Ok(listener) => server.serve(listener).await,
                    Err(e) => Err(e.into()),
                };
                if let Err(e) = result {
                    tracing::error!("Agent failed: {:#}", e);
                }
            });
        })
        .context("Failed to spawn agent thread")?;

    Ok(AgentHandle {
        local_addr,
        cancel,
        thread: Some(thread),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::http::HeaderValue;

    fn request(token: Option<&str>) -> Request {
        let mut req = "ws://127.0.0.1/connect".into_client_request().unwrap();
        if let Some(token) = token {
            req.headers_mut().insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
            );
        }
        req
    }

    #[test]
    fn test_no_token_configured_accepts_all() {
        assert!(check_auth(None, &request(None), Response::default()).is_ok());
    }

    #[test]
    fn test_matching_token_accepted() {
        assert!(check_auth(Some("s3cret"), &request(Some("s3cret")), Response::default()).is_ok());
    }

    #[test]
    fn test_wrong_or_missing_token_rejected() {
        let err = check_auth(Some("s3cret"), &request(Some("guess")), Response::default())
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let err = check_auth(Some("s3cret"), &request(None), Response::default()).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_spawn_background_binds_ephemeral_port() {
        let config = AgentConfig {
            bind_address: "127.0.0.1:0".to_string(),
            ..Default::default()
        };
        let handle = spawn_background(config).unwrap();
        assert_ne!(handle.local_addr().port(), 0);
        assert!(handle.url().starts_with("ws://127.0.0.1:"));
        handle.shutdown();
    }
}
