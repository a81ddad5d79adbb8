//! Agent emulator configuration

use serde::{Deserialize, Serialize};

use tp_protocol::DEFAULT_MAX_FRAME_SIZE;

/// Configuration for the device-agent emulator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Address to listen on for WebSocket connections
    pub bind_address: String,

    /// Shell to spawn for each session
    pub shell: String,

    /// Extra arguments passed to the shell
    pub shell_args: Vec<String>,

    /// Environment variables set for the shell
    pub env: Vec<(String, String)>,

    /// Token clients must present as `Authorization: Bearer <token>`
    pub auth_token: Option<String>,

    /// Largest frame accepted or produced
    pub max_frame_size: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:7681".to_string(),
            shell: "/bin/sh".to_string(),
            shell_args: vec![],
            env: vec![("TERM".to_string(), "xterm-256color".to_string())],
            auth_token: None,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}
