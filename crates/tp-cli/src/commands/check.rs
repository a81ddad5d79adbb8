//! Lifecycle probes against a live device
//!
//! Each probe runs on its own connection so one failure cannot poison the
//! next.

use std::time::{Duration, Instant};

use anyhow::{ensure, Context, Result};
use serde::Serialize;

use tp_client::{connect_shell, ShellSession, SyncSocket};
use tp_core::config::ClientConfig;
use tp_protocol::Status;

/// Silence window used by the empty-output probe
const SILENCE_WINDOW: Duration = Duration::from_secs(1);

/// How long the happy-path probe waits for its echo
const ECHO_DEADLINE: Duration = Duration::from_secs(5);

/// Outcome of one probe
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub name: &'static str,
    pub passed: bool,
    pub detail: Option<String>,
}

type Probe = fn(&ClientConfig) -> Result<()>;

const PROBES: &[(&str, Probe)] = &[
    ("happy path", probe_happy_path),
    ("idempotent stop", probe_idempotent_stop),
    ("silence is empty", probe_silence),
    ("double start rejected", probe_double_start),
];

/// Run every probe and report each result
pub fn run_check(config: &ClientConfig) -> Vec<ProbeResult> {
    PROBES
        .iter()
        .map(|&(name, probe)| {
            tracing::info!("Running probe: {}", name);
            match probe(config) {
                Ok(()) => ProbeResult {
                    name,
                    passed: true,
                    detail: None,
                },
                Err(e) => ProbeResult {
                    name,
                    passed: false,
                    detail: Some(format!("{:#}", e)),
                },
            }
        })
        .collect()
}

fn open(config: &ClientConfig) -> Result<ShellSession<SyncSocket>> {
    connect_shell(config).with_context(|| format!("Failed to connect to {}", config.endpoint()))
}

fn start(session: &mut ShellSession<SyncSocket>, config: &ClientConfig) -> Result<()> {
    let reply = session.start_shell(config.reply_timeout)?;
    ensure!(
        reply.status() != Some(Status::Error),
        "start rejected: {}",
        reply.body_text()
    );
    ensure!(
        session.session_id().is_some_and(|sid| !sid.is_empty()),
        "start reply carried no session id"
    );
    Ok(())
}

fn probe_happy_path(config: &ClientConfig) -> Result<()> {
    let mut session = open(config)?;
    start(&mut session, config)?;

    session.send_input(b"echo hi\n")?;
    let deadline = Instant::now() + ECHO_DEADLINE;
    let mut output = Vec::new();
    while !String::from_utf8_lossy(&output).contains("hi") && Instant::now() < deadline {
        output.extend_from_slice(&session.receive_output(Duration::from_millis(500))?);
    }
    ensure!(
        String::from_utf8_lossy(&output).contains("hi"),
        "no echo within {:?}",
        ECHO_DEADLINE
    );

    let stopped = session.stop_shell(config.reply_timeout)?;
    ensure!(
        stopped.status() != Some(Status::Error),
        "stop rejected: {}",
        stopped.body_text()
    );
    ensure!(stopped.body_bytes().is_empty(), "stop reply carried a body");
    ensure!(session.session_id().is_none(), "session id kept after stop");
    session.close()?;
    Ok(())
}

fn probe_idempotent_stop(config: &ClientConfig) -> Result<()> {
    let mut session = open(config)?;
    start(&mut session, config)?;

    session.stop_shell(config.reply_timeout)?;
    let second = session.stop_shell(config.reply_timeout)?;
    ensure!(
        second.status() == Some(Status::Error),
        "second stop was not flagged as an error"
    );
    ensure!(
        second.body_text().contains("not found"),
        "unexpected second stop body: {}",
        second.body_text()
    );
    session.close()?;
    Ok(())
}

fn probe_silence(config: &ClientConfig) -> Result<()> {
    let mut session = open(config)?;
    start(&mut session, config)?;

    let started = Instant::now();
    let output = session.receive_output(SILENCE_WINDOW)?;
    let elapsed = started.elapsed();
    ensure!(output.is_empty(), "expected no output, got {} bytes", output.len());
    ensure!(
        elapsed < SILENCE_WINDOW * 3,
        "silent receive took {:?}",
        elapsed
    );

    session.stop_shell(config.reply_timeout)?;
    session.close()?;
    Ok(())
}

fn probe_double_start(config: &ClientConfig) -> Result<()> {
    let mut session = open(config)?;
    start(&mut session, config)?;
    let sid = session.session_id().cloned();

    let second = session.start_shell(config.reply_timeout)?;
    ensure!(
        second.status() == Some(Status::Error),
        "second start was not flagged as an error"
    );
    ensure!(
        second.body_text().contains("already running"),
        "unexpected second start body: {}",
        second.body_text()
    );
    ensure!(
        session.session_id().cloned() == sid,
        "session id overwritten by rejected start"
    );

    session.stop_shell(config.reply_timeout)?;
    session.close()?;
    Ok(())
}
