//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::output::{print_error, print_info, print_success};
use tp_core::config::{self, ConfigFile};

fn resolve(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_config_path)
}

/// Render the effective configuration as TOML.
///
/// The source is noted in a leading comment so the output stays loadable.
pub fn config_show(config_path: Option<&Path>) -> Result<String> {
    let path = resolve(config_path);
    let source = if path.exists() {
        format!("# Configuration file: {}\n", path.display())
    } else {
        format!("# No configuration file at {}, showing defaults\n", path.display())
    };

    let file = config::load_or_default(config_path)
        .with_context(|| format!("Failed to load config from {:?}", path))?;
    let body = toml::to_string_pretty(&file).with_context(|| "Failed to render configuration")?;
    Ok(format!("{}\n{}", source, body))
}

/// Path of the configuration file in use
pub fn config_path(config_path: Option<&Path>) -> PathBuf {
    resolve(config_path)
}

/// Write a default configuration file
pub fn config_init(config_path: Option<&Path>, force: bool) -> Result<PathBuf> {
    let path = resolve(config_path);

    if path.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", path));
        print_info("Use --force to overwrite");
        anyhow::bail!("refusing to overwrite {:?}", path);
    }

    config::save_config(&path, &ConfigFile::default())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;
    print_success(&format!("Created configuration file: {:?}", path));
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_then_show() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let written = config_init(Some(&path), false).unwrap();
        assert_eq!(written, path);
        assert!(path.exists());

        let shown = config_show(Some(&path)).unwrap();
        assert!(shown.contains("[client]"));
        assert!(shown.contains("[agent]"));
        assert!(shown.contains("server_url"));
        assert!(shown.starts_with("# Configuration file:"));

        let reloaded: ConfigFile = toml::from_str(&shown).unwrap();
        assert_eq!(reloaded.client.server_url, ConfigFile::default().client.server_url);
    }

    #[test]
    fn test_init_refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[client]\n").unwrap();

        assert!(config_init(Some(&path), false).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[client]\n");

        config_init(Some(&path), true).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("[agent]"));
    }

    #[test]
    fn test_path_prefers_explicit() {
        let explicit = Path::new("/tmp/elsewhere.toml");
        assert_eq!(config_path(Some(explicit)), explicit);
        assert!(config_path(None).ends_with("termprobe/config.toml"));
    }
}
