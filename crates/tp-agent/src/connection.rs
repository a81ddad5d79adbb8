//! Per-connection protocol handling
//!
//! Each WebSocket connection owns at most one shell. Requests that cannot be
//! honoured are answered with a reply of the same type carrying
//! `status = Error` and a human-readable body.

use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;

use tp_core::config::AgentConfig;
use tp_protocol::{Frame, FrameCodec, MessageType, ProtoType, SessionId, Status};

use crate::shell::{ShellEvent, ShellOutput, ShellProcess};

/// Buffered shell output chunks per connection
const OUTPUT_CHANNEL_CAPACITY: usize = 256;

pub const MSG_SHELL_STARTED: &str = "Shell started";
pub const MSG_ALREADY_RUNNING: &str = "shell is already running";
pub const MSG_SESSION_NOT_FOUND: &str = "session not found";

/// Protocol state for one connection
pub struct ConnectionHandler {
    config: Arc<AgentConfig>,
    codec: FrameCodec,
    output_tx: mpsc::Sender<ShellOutput>,
    shell: Option<ShellProcess>,
}

impl ConnectionHandler {
    pub fn new(config: Arc<AgentConfig>, output_tx: mpsc::Sender<ShellOutput>) -> Self {
        let codec = FrameCodec::new(ProtoType::SHELL).with_max_frame_size(config.max_frame_size);
        Self {
            config,
            codec,
            output_tx,
            shell: None,
        }
    }

    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    /// Session id of the running shell
    pub fn session_id(&self) -> Option<&SessionId> {
        self.shell.as_ref().map(ShellProcess::session_id)
    }

    /// Handle one encoded frame from the client, returning the replies
    pub async fn handle_message(&mut self, data: &[u8]) -> Vec<Frame> {
        let frame = match self.codec.decode(data) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Rejecting undecodable frame: {}", e);
                return vec![self.reply(MessageType::Error, None, Status::Error, e.to_string())];
            }
        };

        match frame.message_type().cloned() {
            Some(MessageType::New) => self.handle_new(),
            Some(MessageType::Shell) => self.handle_input(&frame).await,
            Some(MessageType::Stop) => self.handle_stop(&frame).await,
            Some(MessageType::Resize) => {
                if let Some(size) = frame.properties().and_then(|p| p.terminal_size()) {
                    tracing::debug!("Resize to {}x{} ignored (no pty)", size.cols, size.rows);
                }
                vec![]
            }
            Some(MessageType::Ping) => vec![Frame::empty(
                self.codec
                    .header(MessageType::Pong)
                    .with_session(frame.header.session_id),
            )],
            other => {
                let tag = other
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "<none>".to_string());
                tracing::warn!("Unsupported message type: {}", tag);
                vec![self.reply(
                    MessageType::Error,
                    frame.header.session_id,
                    Status::Error,
                    format!("unsupported message type: {}", tag),
                )]
            }
        }
    }

    /// Turn shell output into frames for the client
    pub fn handle_output(&mut self, output: ShellOutput) -> Vec<Frame> {
        if self.session_id() != Some(&output.session_id) {
            return vec![];
        }

        match output.event {
            ShellEvent::Data(data) => vec![self.reply(
                MessageType::Shell,
                Some(output.session_id),
                Status::Normal,
                data,
            )],
            ShellEvent::Exited => {
                tracing::info!("Shell for session {} exited", output.session_id);
                self.shell = None;
                vec![]
            }
        }
    }

    /// Kill the shell, if any
    pub async fn shutdown(&mut self) {
        if let Some(shell) = self.shell.take() {
            shell.kill().await;
        }
    }

    fn handle_new(&mut self) -> Vec<Frame> {
        if self.shell.is_some() {
            tracing::warn!("Rejecting new shell: one is already running");
            return vec![self.reply(MessageType::New, None, Status::Error, MSG_ALREADY_RUNNING)];
        }

        let session_id = SessionId::new(uuid::Uuid::new_v4().to_string());
        match ShellProcess::spawn(&self.config, session_id.clone(), self.output_tx.clone()) {
            Ok(shell) => {
                self.shell = Some(shell);
                vec![self.reply(
                    MessageType::New,
                    Some(session_id),
                    Status::Normal,
                    MSG_SHELL_STARTED,
                )]
            }
            Err(e) => {
                tracing::error!("Failed to start shell: {:#}", e);
                vec![self.reply(
                    MessageType::New,
                    None,
                    Status::Error,
                    format!("failed to start shell: {}", e),
                )]
            }
        }
    }

    async fn handle_input(&mut self, frame: &Frame) -> Vec<Frame> {
        let Some(shell) = self.matching_shell(frame) else {
            return vec![self.reply(
                MessageType::Shell,
                frame.header.session_id.clone(),
                Status::Error,
                MSG_SESSION_NOT_FOUND,
            )];
        };

        match shell.write(frame.body_bytes()).await {
            Ok(()) => vec![],
            Err(e) => {
                tracing::warn!("{:#}", e);
                vec![self.reply(
                    MessageType::Shell,
                    frame.header.session_id.clone(),
                    Status::Error,
                    e.to_string(),
                )]
            }
        }
    }

    async fn handle_stop(&mut self, frame: &Frame) -> Vec<Frame> {
        if self.matching_shell(frame).is_none() {
            return vec![self.reply(
                MessageType::Stop,
                frame.header.session_id.clone(),
                Status::Error,
                MSG_SESSION_NOT_FOUND,
            )];
        }

        self.shutdown().await;
        vec![Frame::empty(
            self.codec
                .header(MessageType::Stop)
                .with_session(frame.header.session_id.clone())
                .with_status(Status::Normal),
        )]
    }

    fn matching_shell(&mut self, frame: &Frame) -> Option<&mut ShellProcess> {
        let sid = frame.session_id()?;
        self.shell.as_mut().filter(|shell| shell.session_id() == sid)
    }

    fn reply(
        &self,
        message_type: MessageType,
        session_id: Option<SessionId>,
        status: Status,
        body: impl Into<Bytes>,
    ) -> Frame {
        Frame::new(
            self.codec
                .header(message_type)
                .with_session(session_id)
                .with_status(status),
            body,
        )
    }
}

/// Serve the shell protocol on an accepted WebSocket until either side closes
pub async fn serve_connection<S>(
    ws: WebSocketStream<S>,
    config: Arc<AgentConfig>,
    cancel: CancellationToken,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = ws.split();
    let (output_tx, mut output_rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
    let mut handler = ConnectionHandler::new(config, output_tx);

    let result: Result<()> = async {
        loop {
            let replies = tokio::select! {
                _ = cancel.cancelled() => break,

                message = stream.next() => match message {
                    None => break,
                    Some(Err(e)) => {
                        tracing::debug!("Connection error: {}", e);
                        break;
                    }
                    Some(Ok(Message::Binary(data))) => handler.handle_message(&data).await,
                    Some(Ok(Message::Text(text))) => handler.handle_message(text.as_str().as_bytes()).await,
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => continue,
                },

                Some(output) = output_rx.recv() => handler.handle_output(output),
            };

            for frame in replies {
                let buf = handler
                    .codec()
                    .encode(&frame)
                    .with_context(|| "Failed to encode reply")?;
                sink.send(Message::Binary(Bytes::from(buf)))
                    .await
                    .with_context(|| "Failed to send reply")?;
            }
        }
        Ok(())
    }
    .await;

    handler.shutdown().await;
    let _ = sink.close().await;
    result
}
