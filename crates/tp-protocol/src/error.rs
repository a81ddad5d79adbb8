//! Protocol error types

use thiserror::Error;

use crate::message::ProtoType;

/// Errors that can occur while encoding or decoding frames
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Header missing or not a mapping
    #[error("Malformed frame header: {0}")]
    MalformedHeader(String),

    /// Decoded protocol differs from the one the codec was built for
    #[error("Protocol mismatch: expected {expected}, got {actual}")]
    ProtocolMismatch {
        expected: ProtoType,
        actual: ProtoType,
    },

    /// Encoded frame exceeds the configured maximum
    #[error("Frame too large: {size} bytes exceeds maximum of {max} bytes")]
    FrameTooLarge { size: usize, max: usize },

    /// Serialization error
    #[error("Encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Deserialization error (top-level structure is not a frame)
    #[error("Decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}
