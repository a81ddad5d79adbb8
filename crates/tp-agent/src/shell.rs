//! Shell process management
//!
//! Shells run with piped stdio rather than a PTY, which is enough for the
//! line-oriented commands the probe sends.

use std::process::Stdio;

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;

use tp_core::config::AgentConfig;
use tp_protocol::SessionId;

/// Read buffer size for shell output
const READ_CHUNK_SIZE: usize = 4096;

/// Output produced by a shell, tagged with the session it belongs to
#[derive(Debug)]
pub struct ShellOutput {
    pub session_id: SessionId,
    pub event: ShellEvent,
}

#[derive(Debug)]
pub enum ShellEvent {
    /// Bytes read from stdout or stderr
    Data(Bytes),
    /// stdout reached end of file
    Exited,
}

/// A running shell and the handle to its stdin
pub struct ShellProcess {
    session_id: SessionId,
    child: Child,
    stdin: ChildStdin,
}

impl ShellProcess {
    /// Spawn the configured shell, forwarding its output to `output_tx`
    pub fn spawn(
        config: &AgentConfig,
        session_id: SessionId,
        output_tx: mpsc::Sender<ShellOutput>,
    ) -> Result<Self> {
        let mut child = Command::new(&config.shell)
            .args(&config.shell_args)
            .envs(config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn shell: {}", config.shell))?;

        tracing::info!(
            "Spawned {} for session {} (PID: {:?})",
            config.shell,
            session_id,
            child.id()
        );

        let stdin = child.stdin.take().context("Shell stdin not captured")?;
        let stdout = child.stdout.take().context("Shell stdout not captured")?;
        let stderr = child.stderr.take().context("Shell stderr not captured")?;

        tokio::spawn(forward_output(
            stdout,
            session_id.clone(),
            output_tx.clone(),
            true,
        ));
        tokio::spawn(forward_output(stderr, session_id.clone(), output_tx, false));

        Ok(Self {
            session_id,
            child,
            stdin,
        })
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Write input to the shell's stdin
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.stdin
            .write_all(data)
            .await
            .with_context(|| "Failed to write to shell")?;
        self.stdin
            .flush()
            .await
            .with_context(|| "Failed to flush shell stdin")?;
        Ok(())
    }

    /// Kill the shell and wait for it to exit
    pub async fn kill(mut self) {
        tracing::info!("Stopping shell for session {}", self.session_id);
        if let Err(e) = self.child.kill().await {
            tracing::warn!("Failed to kill shell for session {}: {}", self.session_id, e);
        }
    }
}

async fn forward_output<R>(
    mut reader: R,
    session_id: SessionId,
    output_tx: mpsc::Sender<ShellOutput>,
    report_exit: bool,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let output = ShellOutput {
                    session_id: session_id.clone(),
                    event: ShellEvent::Data(Bytes::copy_from_slice(&buf[..n])),
                };
                if output_tx.send(output).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::debug!("Shell output read failed for {}: {}", session_id, e);
                break;
            }
        }
    }

    if report_exit {
        let _ = output_tx
            .send(ShellOutput {
                session_id,
                event: ShellEvent::Exited,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shell_echoes_and_exits() {
        let (tx, mut rx) = mpsc::channel(16);
        let config = AgentConfig::default();
        let mut shell = ShellProcess::spawn(&config, SessionId::from("t1"), tx).unwrap();

        shell.write(b"echo hello\nexit\n").await.unwrap();

        let mut output = Vec::new();
        let mut exited = false;
        while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            assert_eq!(event.session_id.as_str(), "t1");
            match event.event {
                ShellEvent::Data(data) => output.extend_from_slice(&data),
                ShellEvent::Exited => {
                    exited = true;
                    break;
                }
            }
        }

        assert!(exited);
        assert_eq!(String::from_utf8_lossy(&output), "hello\n");
    }

    #[tokio::test]
    async fn test_spawn_missing_shell_fails() {
        let (tx, _rx) = mpsc::channel(1);
        let config = AgentConfig {
            shell: "/nonexistent/shell".to_string(),
            ..Default::default()
        };
        assert!(ShellProcess::spawn(&config, SessionId::from("t2"), tx).is_err());
    }
}
