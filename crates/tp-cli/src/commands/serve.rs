//! Foreground agent emulator

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use tp_agent::AgentServer;
use tp_core::config::AgentConfig;

use crate::output::print_info;

/// Run the agent emulator until Ctrl+C
pub fn run_serve(config: AgentConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;

    runtime.block_on(async move {
        let cancel = CancellationToken::new();
        let bind_address = config.bind_address.clone();
        let server = AgentServer::new(config, cancel.clone());

        let shutdown = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down");
                shutdown.cancel();
            }
        });

        print_info(&format!("Serving shell protocol on ws://{}", bind_address));
        server.run(&bind_address).await
    })
}
