//! Interactive line-based shell

use std::io::{BufRead, Write};

use anyhow::{Context, Result};

use tp_client::connect_shell;
use tp_core::config::ClientConfig;
use tp_protocol::Status;

use crate::output::{print_error, print_info, print_warning};

/// Read lines from `input`, send each to a remote shell and write whatever
/// it prints to `out`. The session is stopped at end of input.
pub fn run_shell<R, W>(config: &ClientConfig, input: R, mut out: W) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    let mut session = connect_shell(config)
        .with_context(|| format!("Failed to connect to {}", config.endpoint()))?;

    let started = session
        .start_shell(config.reply_timeout)
        .with_context(|| "Failed to start shell")?;
    if started.status() == Some(Status::Error) {
        print_error(&format!("Agent refused shell: {}", started.body_text()));
        anyhow::bail!("shell start rejected");
    }
    if let Some(sid) = session.session_id() {
        print_info(&format!("Session {} started. End input to stop.", sid));
    }

    for line in input.lines() {
        let mut line = line.with_context(|| "Failed to read input")?;
        line.push('\n');
        session.send_input(line.as_bytes())?;

        let output = session.receive_output(config.output_timeout)?;
        out.write_all(&output)?;
        out.flush()?;
    }

    let stopped = session
        .stop_shell(config.reply_timeout)
        .with_context(|| "Failed to stop shell")?;
    if stopped.status() == Some(Status::Error) {
        print_warning(&format!("Agent reported: {}", stopped.body_text()));
    }
    session.close()?;
    Ok(())
}
