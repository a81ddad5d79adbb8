//! tp-core: Core abstractions and configuration for termprobe
//!
//! This crate provides the error taxonomy, configuration structures, and the
//! blocking transport seam shared by the client, the agent emulator, and the
//! CLI.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::TpError;
pub use types::{DeviceId, SessionState};
