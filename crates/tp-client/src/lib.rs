//! tp-client: Remote-shell client for termprobe
//!
//! Drives the shell sub-protocol against a device agent over a blocking
//! WebSocket wrapper. Everything here is synchronous from the caller's point
//! of view; the socket runs its own single-threaded tokio runtime.

pub mod backoff;
pub mod retry;
pub mod shell;
pub mod socket;

pub use backoff::ExponentialBackoff;
pub use retry::run_with_retry;
pub use shell::ShellSession;
pub use socket::{with_socket, SyncSocket};

use tp_core::config::ClientConfig;
use tp_core::TpError;
use tp_protocol::{FrameCodec, ProtoType};

/// Connect to the configured endpoint and wrap the socket in a shell session
pub fn connect_shell(config: &ClientConfig) -> Result<ShellSession<SyncSocket>, TpError> {
    let socket = SyncSocket::connect(config)?;
    let codec = FrameCodec::new(ProtoType::SHELL).with_max_frame_size(config.max_frame_size);
    Ok(ShellSession::with_codec(socket, codec))
}
