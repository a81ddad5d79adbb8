//! CLI integration tests
//!
//! Tests the termprobe CLI using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;

use tp_agent::{spawn_background, AgentHandle};
use tp_core::config::AgentConfig;

fn termprobe() -> Command {
    let mut cmd = Command::cargo_bin("termprobe")
        .expect("Failed to locate termprobe binary - ensure it's built before running tests");
    cmd.env_remove("TERMPROBE_URL")
        .env_remove("TERMPROBE_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

fn agent(token: Option<&str>) -> AgentHandle {
    spawn_background(AgentConfig {
        bind_address: "127.0.0.1:0".to_string(),
        auth_token: token.map(str::to_string),
        ..Default::default()
    })
    .unwrap()
}

/// An empty config file so the host's real config never leaks in
fn empty_config() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "").unwrap();
    (dir, path)
}

#[test]
fn test_cli_help() {
    termprobe()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("termprobe"))
        .stdout(predicate::str::contains("Remote terminal protocol probe"));
}

#[test]
fn test_cli_version() {
    termprobe()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("termprobe"));
}

#[test]
fn test_cli_exec_help() {
    termprobe()
        .args(["exec", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--device"))
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn test_cli_requires_subcommand() {
    termprobe().assert().failure();
}

#[test]
fn test_cli_exec_against_agent() {
    let agent = agent(None);
    let (_dir, config) = empty_config();

    termprobe()
        .arg("--config")
        .arg(&config)
        .args(["exec", "echo from-cli", "--url", &agent.url(), "--timeout", "0.5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("from-cli"));
}

#[test]
fn test_cli_exec_json() {
    let agent = agent(None);
    let (_dir, config) = empty_config();

    let output = termprobe()
        .arg("--config")
        .arg(&config)
        .args(["exec", "echo as-json", "--json", "--url", &agent.url(), "-t", "0.5"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["start_status"], "normal");
    assert_eq!(value["stop_status"], "normal");
    assert!(value["output"].as_str().unwrap().contains("as-json"));
    assert!(value["session_id"].is_string());
}

#[test]
fn test_cli_exec_bad_token_fails() {
    let agent = agent(Some("right"));
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(
        &config,
        "[client]\nconnect_retries = 0\nlifecycle_attempts = 1\n",
    )
    .unwrap();

    termprobe()
        .arg("--config")
        .arg(&config)
        .args(["exec", "true", "--url", &agent.url(), "--token", "wrong"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("401"));
}

#[test]
fn test_cli_check_passes_against_agent() {
    let agent = agent(None);
    let (_dir, config) = empty_config();

    termprobe()
        .arg("--config")
        .arg(&config)
        .args(["check", "--url", &agent.url()])
        .assert()
        .success()
        .stdout(predicate::str::contains("happy path"))
        .stdout(predicate::str::contains("double start rejected"));
}

#[test]
fn test_cli_check_fails_without_agent() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[client]\nconnect_retries = 0\n").unwrap();

    termprobe()
        .arg("--config")
        .arg(&config)
        .args(["check", "--url", "ws://127.0.0.1:9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("happy path"));
}

#[test]
fn test_cli_config_init_and_show() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");

    termprobe()
        .arg("--config")
        .arg(&config)
        .args(["config", "init"])
        .assert()
        .success();
    assert!(config.exists());

    termprobe()
        .arg("--config")
        .arg(&config)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[client]"))
        .stdout(predicate::str::contains("bind_address"));

    let output = termprobe()
        .arg("--config")
        .arg(&config)
        .args(["config", "show"])
        .output()
        .unwrap();
    let shown = String::from_utf8(output.stdout).unwrap();
    assert!(toml::from_str::<toml::Table>(&shown).is_ok(), "not TOML: {}", shown);

    termprobe()
        .arg("--config")
        .arg(&config)
        .args(["config", "init"])
        .assert()
        .failure();
}

#[test]
fn test_cli_config_path() {
    termprobe()
        .args(["config", "path", "--config", "/tmp/somewhere.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/tmp/somewhere.toml"));
}

#[test]
fn test_cli_missing_explicit_config_fails() {
    termprobe()
        .args(["exec", "true", "--config", "/nonexistent/termprobe.toml"])
        .assert()
        .failure();
}
