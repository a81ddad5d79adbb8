//! termprobe: Command-line interface
//!
//! Runs shell sessions against device agents, probes their lifecycle
//! behavior, and hosts a local agent emulator for testing.

pub mod commands;
pub mod output;
