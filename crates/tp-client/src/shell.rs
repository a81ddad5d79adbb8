//! Remote shell session client
//!
//! The agent decides whether a session exists. Starting a second shell or
//! stopping one that is already gone is not a client-side error: the reply
//! comes back with `props.status == Error` and the caller branches on it.

use std::time::Duration;

use bytes::{Bytes, BytesMut};

use tp_core::error::SessionError;
use tp_core::traits::Transport;
use tp_core::{SessionState, TpError};
use tp_protocol::{
    Frame, FrameCodec, MessageType, ProtoType, Properties, SessionId, Status, TerminalSize,
};

/// Client side of one remote shell over one connection
pub struct ShellSession<T: Transport> {
    transport: T,
    codec: FrameCodec,
    session_id: Option<SessionId>,
    state: SessionState,
}

impl<T: Transport> ShellSession<T> {
    /// Create a session client speaking the shell protocol
    pub fn new(transport: T) -> Self {
        Self::with_codec(transport, FrameCodec::new(ProtoType::SHELL))
    }

    /// Create a session client with a custom codec
    pub fn with_codec(transport: T, codec: FrameCodec) -> Self {
        Self {
            transport,
            codec,
            session_id: None,
            state: SessionState::Unstarted,
        }
    }

    /// Session id assigned by the agent, if any
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Ask the agent for a new shell and wait for its reply.
    ///
    /// On a normal reply the session id is taken from the reply header. On a
    /// rejection the current session id is kept.
    pub fn start_shell(&mut self, timeout: Duration) -> Result<Frame, TpError> {
        self.start(None, timeout)
    }

    /// Like [`start_shell`](Self::start_shell), announcing the terminal size
    pub fn start_shell_with_size(
        &mut self,
        size: TerminalSize,
        timeout: Duration,
    ) -> Result<Frame, TpError> {
        self.start(Some(Properties::with_terminal_size(size)), timeout)
    }

    fn start(&mut self, props: Option<Properties>, timeout: Duration) -> Result<Frame, TpError> {
        let mut header = self.codec.header(MessageType::New);
        if let Some(props) = props {
            header = header.with_properties(props);
        }
        self.send_frame(Frame::new(header, Bytes::new()))?;

        let reply = self.expect_reply(MessageType::New, timeout)?;
        if reply.status() == Some(Status::Error) {
            tracing::warn!("Agent rejected shell start: {}", reply.body_text());
            if !self.state.has_session() {
                self.state = SessionState::Errored;
            }
        } else {
            self.session_id = reply.session_id().cloned();
            self.state = SessionState::Started;
            tracing::info!(
                "Shell started (session {})",
                self.session_id
                    .as_ref()
                    .map(SessionId::as_str)
                    .unwrap_or("<none>")
            );
        }
        Ok(reply)
    }

    /// Send terminal input. No reply is awaited.
    pub fn send_input(&mut self, data: &[u8]) -> Result<(), TpError> {
        let header = self
            .codec
            .header(MessageType::Shell)
            .with_session(self.session_id.clone());
        self.send_frame(Frame::new(header, Bytes::copy_from_slice(data)))?;

        if self.state == SessionState::Started {
            self.state = SessionState::Active;
        }
        Ok(())
    }

    /// Collect output until nothing arrives for `timeout`.
    ///
    /// An empty result means the shell produced nothing in that window. Any
    /// frame other than `shell` is a protocol violation.
    pub fn receive_output(&mut self, timeout: Duration) -> Result<Bytes, TpError> {
        let mut output = BytesMut::new();

        loop {
            let frame = match self.recv_frame(timeout) {
                Ok(frame) => frame,
                Err(e) if e.is_timeout() => break,
                Err(e) => return Err(e),
            };

            if !frame.header.is(&MessageType::Shell) {
                return Err(SessionError::UnexpectedMessage {
                    expected: MessageType::Shell,
                    actual: frame.message_type().cloned(),
                }
                .into());
            }
            if frame.header.is_error() {
                tracing::warn!("Agent flagged shell data as error: {}", frame.body_text());
            }
            output.extend_from_slice(frame.body_bytes());
        }

        tracing::debug!("Drained {} bytes of shell output", output.len());
        Ok(output.freeze())
    }

    /// Tell the agent the terminal was resized. No reply is awaited.
    pub fn resize(&mut self, size: TerminalSize) -> Result<(), TpError> {
        let header = self
            .codec
            .header(MessageType::Resize)
            .with_session(self.session_id.clone())
            .with_properties(Properties::with_terminal_size(size));
        self.send_frame(Frame::empty(header))
    }

    /// Ask the agent to stop the shell and wait for its reply.
    ///
    /// A normal reply clears the session id. A rejection (for example
    /// `session not found`) is returned as-is and leaves state untouched.
    pub fn stop_shell(&mut self, timeout: Duration) -> Result<Frame, TpError> {
        let header = self
            .codec
            .header(MessageType::Stop)
            .with_session(self.session_id.clone());
        self.send_frame(Frame::empty(header))?;

        let reply = self.expect_reply(MessageType::Stop, timeout)?;
        if reply.status() == Some(Status::Error) {
            tracing::warn!("Agent rejected shell stop: {}", reply.body_text());
        } else {
            tracing::info!("Shell stopped");
            self.session_id = None;
            self.state = SessionState::Stopped;
        }
        Ok(reply)
    }

    /// Close the underlying transport
    pub fn close(&mut self) -> Result<(), TpError> {
        Ok(self.transport.close()?)
    }

    fn send_frame(&mut self, frame: Frame) -> Result<(), TpError> {
        let buf = self.codec.encode(&frame)?;
        tracing::debug!(
            "-> {:?} sid={:?} ({} bytes)",
            frame.header.message_type,
            frame.header.session_id,
            buf.len()
        );
        self.transport.send(&buf)?;
        Ok(())
    }

    fn recv_frame(&mut self, timeout: Duration) -> Result<Frame, TpError> {
        let data = self.transport.recv(timeout)?;
        let frame = self.codec.decode(&data)?;
        tracing::debug!(
            "<- {:?} sid={:?} status={:?}",
            frame.header.message_type,
            frame.header.session_id,
            frame.status()
        );
        Ok(frame)
    }

    fn expect_reply(&mut self, expected: MessageType, timeout: Duration) -> Result<Frame, TpError> {
        let frame = self.recv_frame(timeout)?;
        if !frame.header.is(&expected) {
            return Err(SessionError::UnexpectedMessage {
                expected,
                actual: frame.message_type().cloned(),
            }
            .into());
        }
        Ok(frame)
    }
}
