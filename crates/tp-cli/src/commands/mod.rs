//! CLI command implementations

mod check;
mod config;
mod exec;
mod serve;
mod shell;

pub use check::{run_check, ProbeResult};
pub use config::{config_init, config_path, config_show};
pub use exec::{run_exec, ExecOutcome};
pub use serve::run_serve;
pub use shell::run_shell;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use tp_core::config::{self as core_config, ClientConfig, ConfigFile};
use tp_core::DeviceId;

/// Connection flags shared by every command that talks to a device
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectArgs {
    /// WebSocket base URL (overrides config)
    #[arg(long, env = "TERMPROBE_URL")]
    pub url: Option<String>,

    /// Device ID to connect to (overrides config)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Bearer token (overrides config)
    #[arg(long, env = "TERMPROBE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Seconds of silence that end an output drain (overrides config)
    #[arg(short, long)]
    pub timeout: Option<f64>,
}

impl ConnectArgs {
    /// Apply the flags on top of a loaded client config
    pub fn apply(&self, config: &mut ClientConfig) -> Result<()> {
        if let Some(url) = &self.url {
            config.server_url = url.clone();
        }
        if let Some(device) = &self.device {
            config.device_id = Some(DeviceId::new(device.clone()));
        }
        if let Some(token) = &self.token {
            config.auth_token = Some(token.clone());
        }
        if let Some(timeout) = self.timeout {
            config.output_timeout = Duration::try_from_secs_f64(timeout)
                .with_context(|| format!("Invalid timeout: {}", timeout))?;
        }
        Ok(())
    }
}

/// Load the `[client]` section and apply command-line overrides
pub fn load_client_config(config_path: Option<&Path>, args: &ConnectArgs) -> Result<ClientConfig> {
    let file: ConfigFile = core_config::load_or_default(config_path)
        .with_context(|| "Failed to load configuration")?;
    let mut client = file.client;
    args.apply(&mut client)?;
    client
        .validate()
        .with_context(|| "Invalid client configuration")?;
    Ok(client)
}
