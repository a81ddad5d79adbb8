//! tp-protocol: Wire protocol for termprobe remote-terminal frames
//!
//! This crate defines the msgpack frame format exchanged with a device agent
//! over a message-oriented WebSocket connection. One WebSocket message carries
//! exactly one encoded frame.

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod session;

pub use codec::{Frame, FrameCodec};
pub use error::ProtocolError;
pub use frame::{FrameHeader, PropValue, Properties, Status, DEFAULT_MAX_FRAME_SIZE};
pub use message::{MessageType, ProtoType, TerminalSize};
pub use session::SessionId;
