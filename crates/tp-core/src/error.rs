//! Core error types for termprobe
//!
//! Transport and codec failures are fatal to the operation that hit them.
//! Application-level rejections are not errors at all: they arrive as frames
//! whose `props.status` is `Error`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tp_protocol::{MessageType, ProtocolError};

/// Top-level error type for the termprobe ecosystem
#[derive(Error, Debug)]
pub enum TpError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Session error
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TpError {
    /// Whether this error is a receive timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, TpError::Transport(TransportError::Timeout(_)))
    }
}

/// Transport-related errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// Nothing arrived within the receive timeout
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Peer rejected the connection during the handshake
    #[error("Connection rejected with HTTP status {status}")]
    Rejected { status: u16 },

    /// Connection attempt did not complete in time
    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Handshake or request setup failed
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Connection was closed by either side
    #[error("Connection closed")]
    Closed,

    /// Underlying connection failed
    #[error("Connection failed: {0}")]
    Io(String),
}

/// Session-related errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// Reply carried a different operation than the one awaited
    #[error("Unexpected message: expected {expected}, got {}", display_type(.actual))]
    UnexpectedMessage {
        expected: MessageType,
        actual: Option<MessageType>,
    },
}

fn display_type(message_type: &Option<MessageType>) -> String {
    message_type
        .as_ref()
        .map(|t| t.to_string())
        .unwrap_or_else(|| "<none>".to_string())
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
