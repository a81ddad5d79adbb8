//! tp-agent: Device-agent emulator for termprobe
//!
//! Serves the shell sub-protocol over WebSocket so the client can be probed
//! without a real device. Each connection may run one shell at a time,
//! spawned with piped stdio.

pub mod connection;
pub mod server;
pub mod shell;

pub use connection::{
    ConnectionHandler, MSG_ALREADY_RUNNING, MSG_SESSION_NOT_FOUND, MSG_SHELL_STARTED,
};
pub use server::{spawn_background, AgentHandle, AgentServer};
