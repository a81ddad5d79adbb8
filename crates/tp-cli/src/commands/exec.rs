//! One-shot command execution

use serde::Serialize;

use tp_client::{connect_shell, run_with_retry};
use tp_core::config::ClientConfig;
use tp_core::TpError;
use tp_protocol::Status;

use crate::output::status_label;

/// Result of running one command in a fresh shell session
#[derive(Debug, Clone, Serialize)]
pub struct ExecOutcome {
    pub session_id: Option<String>,
    pub start_status: &'static str,
    pub stop_status: Option<&'static str>,
    pub output: String,
    pub attempts: u32,
}

impl ExecOutcome {
    /// Whether the agent accepted the session
    pub fn started(&self) -> bool {
        self.start_status != status_label(Some(Status::Error))
    }
}

/// Connect, start a shell, run `command`, drain its output and stop.
///
/// The whole lifecycle is retried per the config's backoff. A rejected start
/// is not retried; it is reported in the outcome.
pub fn run_exec(config: &ClientConfig, command: &str) -> Result<ExecOutcome, TpError> {
    let mut input = command.as_bytes().to_vec();
    if !input.ends_with(b"\n") {
        input.push(b'\n');
    }

    run_with_retry(config.lifecycle_attempts, &config.backoff, |attempt| {
        let mut session = connect_shell(config)?;

        let started = session.start_shell(config.reply_timeout)?;
        let mut outcome = ExecOutcome {
            session_id: session.session_id().map(|sid| sid.to_string()),
            start_status: status_label(started.status()),
            stop_status: None,
            output: String::new(),
            attempts: attempt,
        };

        if started.status() == Some(Status::Error) {
            outcome.output = started.body_text().into_owned();
            session.close()?;
            return Ok(outcome);
        }

        session.send_input(&input)?;
        let output = session.receive_output(config.output_timeout)?;
        outcome.output = String::from_utf8_lossy(&output).into_owned();

        let stopped = session.stop_shell(config.reply_timeout)?;
        outcome.stop_status = Some(status_label(stopped.status()));
        session.close()?;

        Ok(outcome)
    })
}
