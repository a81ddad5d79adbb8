//! Configuration management for termprobe

mod agent;
mod client;
pub mod serde_utils;

pub use agent::AgentConfig;
pub use client::{BackoffConfig, ClientConfig, DEVICE_ID_PLACEHOLDER};

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk configuration file with one section per role
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// `[client]` section
    pub client: ClientConfig,
    /// `[agent]` section
    pub agent: AgentConfig,
}

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("termprobe")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Load the config file at `path`, or the default location.
///
/// A missing file at the default location yields defaults; a missing file at
/// an explicit path is an error.
pub fn load_or_default(path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let default_path = default_config_path();
            if default_path.exists() {
                load_config(&default_path)
            } else {
                tracing::debug!("No config at {:?}, using defaults", default_path);
                Ok(ConfigFile::default())
            }
        }
    }
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ConfigFile::default();
        config.client.auth_token = Some("secret".to_string());
        config.client.output_timeout = Duration::from_millis(1500);
        config.agent.shell_args = vec!["-i".to_string()];

        save_config(&path, &config).unwrap();
        let loaded: ConfigFile = load_config(&path).unwrap();

        assert_eq!(loaded.client.auth_token.as_deref(), Some("secret"));
        assert_eq!(loaded.client.output_timeout, Duration::from_millis(1500));
        assert_eq!(loaded.agent.shell_args, vec!["-i".to_string()]);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[client]
server_url = "wss://backend.example"
device_id = "d-17"
reply_timeout = 10
"#,
        )
        .unwrap();

        let loaded = load_or_default(Some(&path)).unwrap();
        assert_eq!(loaded.client.server_url, "wss://backend.example");
        assert_eq!(loaded.client.reply_timeout, Duration::from_secs(10));
        assert_eq!(loaded.client.connect_retries, 3);
        assert_eq!(loaded.agent.shell, "/bin/sh");
    }

    #[test]
    fn test_missing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(
            load_or_default(Some(&path)),
            Err(ConfigError::NotFound(_))
        ));
    }
}
