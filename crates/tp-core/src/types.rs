//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a device registered with the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl DeviceId {
    /// Create a new device ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Client-local view of a shell session.
///
/// The agent is the source of truth for whether a session exists; this only
/// records what the last reply told us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No session has been started
    Unstarted,
    /// Agent confirmed the session and assigned an id
    Started,
    /// Input has been sent on the session
    Active,
    /// Agent confirmed the stop
    Stopped,
    /// Agent rejected the last request and no session is held
    Errored,
}

impl SessionState {
    /// Whether the client currently holds a session id
    pub fn has_session(&self) -> bool {
        matches!(self, SessionState::Started | SessionState::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unstarted => write!(f, "unstarted"),
            SessionState::Started => write!(f, "started"),
            SessionState::Active => write!(f, "active"),
            SessionState::Stopped => write!(f, "stopped"),
            SessionState::Errored => write!(f, "errored"),
        }
    }
}
