//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use tp_protocol::DEFAULT_MAX_FRAME_SIZE;

use super::serde_utils::duration_secs;
use crate::error::ConfigError;
use crate::types::DeviceId;

/// Placeholder substituted with the device id in `connect_path`
pub const DEVICE_ID_PLACEHOLDER: &str = "{device_id}";

/// Configuration for connecting to a device's remote terminal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base WebSocket URL (`ws://` or `wss://`)
    pub server_url: String,

    /// Device to connect to. When unset, `server_url` is used as-is.
    pub device_id: Option<DeviceId>,

    /// Path appended to `server_url` when a device id is set
    pub connect_path: String,

    /// Bearer token sent in the `Authorization` header
    pub auth_token: Option<String>,

    /// Timeout for a single connection attempt
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// How many times a handshake rejection is retried
    pub connect_retries: u32,

    /// Fixed delay between handshake retries
    #[serde(with = "duration_secs")]
    pub retry_delay: Duration,

    /// How long to wait for the reply to `new` and `stop`
    #[serde(with = "duration_secs")]
    pub reply_timeout: Duration,

    /// Quiet period that ends an output drain
    #[serde(with = "duration_secs")]
    pub output_timeout: Duration,

    /// Largest frame accepted or produced
    pub max_frame_size: usize,

    /// Number of attempts for a whole session lifecycle
    pub lifecycle_attempts: u32,

    /// Backoff between lifecycle attempts
    pub backoff: BackoffConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:7681".to_string(),
            device_id: None,
            connect_path: format!(
                "/api/management/v1/deviceconnect/devices/{}/connect",
                DEVICE_ID_PLACEHOLDER
            ),
            auth_token: None,
            connect_timeout: Duration::from_secs(30),
            connect_retries: 3,
            retry_delay: Duration::from_secs(2),
            reply_timeout: Duration::from_secs(30),
            output_timeout: Duration::from_secs(5),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            lifecycle_attempts: 3,
            backoff: BackoffConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Full WebSocket URL to connect to
    pub fn endpoint(&self) -> String {
        match &self.device_id {
            Some(device_id) => format!(
                "{}{}",
                self.server_url.trim_end_matches('/'),
                self.connect_path
                    .replace(DEVICE_ID_PLACEHOLDER, device_id.as_str())
            ),
            None => self.server_url.clone(),
        }
    }

    /// Check values that would only fail later at connect time
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.server_url.starts_with("ws://") || self.server_url.starts_with("wss://")) {
            return Err(ConfigError::Invalid(format!(
                "server_url must start with ws:// or wss://, got '{}'",
                self.server_url
            )));
        }
        if self.device_id.is_some() && !self.connect_path.contains(DEVICE_ID_PLACEHOLDER) {
            return Err(ConfigError::Invalid(format!(
                "connect_path must contain {}",
                DEVICE_ID_PLACEHOLDER
            )));
        }
        if self.lifecycle_attempts == 0 {
            return Err(ConfigError::Invalid(
                "lifecycle_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Exponential backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Initial delay
    #[serde(with = "duration_secs")]
    pub initial: Duration,

    /// Maximum delay
    #[serde(with = "duration_secs")]
    pub max: Duration,

    /// Multiplier for each retry
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(2),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_without_device() {
        let config = ClientConfig {
            server_url: "ws://10.0.0.5:9000/term".to_string(),
            ..Default::default()
        };
        assert_eq!(config.endpoint(), "ws://10.0.0.5:9000/term");
    }

    #[test]
    fn test_endpoint_with_device() {
        let config = ClientConfig {
            server_url: "wss://backend.local/".to_string(),
            device_id: Some(DeviceId::from("abc123")),
            ..Default::default()
        };
        assert_eq!(
            config.endpoint(),
            "wss://backend.local/api/management/v1/deviceconnect/devices/abc123/connect"
        );
    }

    #[test]
    fn test_validate() {
        assert!(ClientConfig::default().validate().is_ok());

        let bad_scheme = ClientConfig {
            server_url: "https://backend.local".to_string(),
            ..Default::default()
        };
        assert!(matches!(bad_scheme.validate(), Err(ConfigError::Invalid(_))));

        let bad_path = ClientConfig {
            device_id: Some(DeviceId::from("abc")),
            connect_path: "/connect".to_string(),
            ..Default::default()
        };
        assert!(matches!(bad_path.validate(), Err(ConfigError::Invalid(_))));
    }
}
