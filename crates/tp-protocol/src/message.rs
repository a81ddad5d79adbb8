//! Protocol and message type identifiers
//!
//! Every frame names the sub-protocol it belongs to (`proto`, an integer) and
//! the operation within that sub-protocol (`typ`, a string tag).
//!
//! # Shell message flow
//!
//! 1. Client sends `new` with an empty body
//! 2. Agent replies `new` carrying the assigned session id
//! 3. Client sends `shell` frames with terminal input (no reply)
//! 4. Agent streams `shell` frames with terminal output
//! 5. Client sends `stop`, agent replies `stop`
//!
//! Rejections (`shell is already running`, `session not found`) arrive as a
//! reply of the same type with `props.status == 2`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    /// Number of rows
    pub rows: u16,
    /// Number of columns
    pub cols: u16,
}

impl TerminalSize {
    /// Create a new terminal size
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { rows: 24, cols: 80 }
    }
}

/// Sub-protocol discriminator carried in the `proto` header field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtoType(pub u16);

impl ProtoType {
    /// Unset or unknown protocol
    pub const INVALID: ProtoType = ProtoType(0);
    /// Remote shell
    pub const SHELL: ProtoType = ProtoType(1);
    /// File transfer
    pub const FILE_TRANSFER: ProtoType = ProtoType(2);
    /// Port forwarding
    pub const PORT_FORWARD: ProtoType = ProtoType(3);
    /// Connection-level control messages
    pub const CONTROL: ProtoType = ProtoType(0xFFFF);

    /// Get the raw value
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    fn name(&self) -> Option<&'static str> {
        match *self {
            Self::INVALID => Some("invalid"),
            Self::SHELL => Some("shell"),
            Self::FILE_TRANSFER => Some("file-transfer"),
            Self::PORT_FORWARD => Some("port-forward"),
            Self::CONTROL => Some("control"),
            _ => None,
        }
    }
}

impl fmt::Display for ProtoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", self.0, name),
            None => write!(f, "{}", self.0),
        }
    }
}

impl From<u16> for ProtoType {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

/// Operation tag carried in the `typ` header field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    /// Start a new shell session
    New,
    /// Shell input or output data
    Shell,
    /// Terminal resize
    Resize,
    /// Stop the shell session
    Stop,
    /// Keepalive request
    Ping,
    /// Keepalive response
    Pong,
    /// Protocol-level error report
    Error,
    /// Any tag this client does not know
    Other(String),
}

impl MessageType {
    /// Wire tag for this type
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::New => "new",
            MessageType::Shell => "shell",
            MessageType::Resize => "resize",
            MessageType::Stop => "stop",
            MessageType::Ping => "ping",
            MessageType::Pong => "pong",
            MessageType::Error => "error",
            MessageType::Other(tag) => tag,
        }
    }
}

impl From<&str> for MessageType {
    fn from(tag: &str) -> Self {
        match tag {
            "new" => MessageType::New,
            "shell" => MessageType::Shell,
            "resize" => MessageType::Resize,
            "stop" => MessageType::Stop,
            "ping" => MessageType::Ping,
            "pong" => MessageType::Pong,
            "error" => MessageType::Error,
            other => MessageType::Other(other.to_string()),
        }
    }
}

impl From<String> for MessageType {
    fn from(tag: String) -> Self {
        MessageType::from(tag.as_str())
    }
}

impl From<MessageType> for String {
    fn from(msg_type: MessageType) -> Self {
        match msg_type {
            MessageType::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_tags() {
        for msg_type in [
            MessageType::New,
            MessageType::Shell,
            MessageType::Resize,
            MessageType::Stop,
            MessageType::Ping,
            MessageType::Pong,
            MessageType::Error,
        ] {
            let tag = msg_type.as_str().to_string();
            assert_eq!(MessageType::from(tag), msg_type);
        }
    }

    #[test]
    fn test_unknown_tag_is_preserved() {
        let msg_type = MessageType::from("accept");
        assert_eq!(msg_type, MessageType::Other("accept".to_string()));
        assert_eq!(String::from(msg_type), "accept");
    }

    #[test]
    fn test_proto_type_display() {
        assert_eq!(ProtoType::SHELL.to_string(), "1 (shell)");
        assert_eq!(ProtoType(42).to_string(), "42");
    }

    #[test]
    fn test_terminal_size_default() {
        let size = TerminalSize::default();
        assert_eq!(size.rows, 24);
        assert_eq!(size.cols, 80);
    }
}
