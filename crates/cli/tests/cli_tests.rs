//! CLI integration tests

use std::fs;
use std::process::{Command, Output};
use tempfile::TempDir;

fn limits_check(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_limits-check"))
        .args(args)
        .env_remove("CONFIG_PATH")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = limits_check(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("--config"), "Should show config option");
    assert!(stdout.contains("--docker-socket"), "Should show socket option");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = limits_check(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("limits-check"), "Should show binary name");
}

/// A missing document fails before the runtime is contacted
#[test]
fn test_missing_document_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("container_limits.json");

    let output = limits_check(&["--config", path.to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout.contains("[ERROR]"), "Should report the error");
}

/// A document that is not JSON fails the same way
#[test]
fn test_malformed_document_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("container_limits.json");
    fs::write(&path, "{ not json").unwrap();

    let output = limits_check(&["--config", path.to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout.contains("[ERROR]"));
}

/// The document path is also read from CONFIG_PATH
#[test]
fn test_config_path_from_env() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.json");

    let output = Command::new(env!("CARGO_BIN_EXE_limits-check"))
        .env("CONFIG_PATH", &path)
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute command");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout.contains("absent.json"));
}

/// An empty document needs no runtime calls and succeeds
#[test]
fn test_empty_document_succeeds() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("container_limits.json");
    fs::write(&path, "{}").unwrap();

    let output = limits_check(&["--config", path.to_str().unwrap()]);

    assert!(output.status.success());
}

/// A runtime that cannot be reached is not a document failure
#[test]
fn test_unreachable_runtime_still_exits_zero() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("container_limits.json");
    // Numeric cpus are accepted alongside string values
    fs::write(
        &path,
        r#"{"web-app": {"memory": "512m", "cpus": 1.0}, "cache": {"memory": "256m", "cpus": "0.5"}}"#,
    )
    .unwrap();
    let socket = dir.path().join("missing").join("docker.sock");

    let output = limits_check(&[
        "--config",
        path.to_str().unwrap(),
        "--docker-socket",
        socket.to_str().unwrap(),
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout.contains("[ERROR]"), "Should report the runtime error");
    assert!(stdout.contains("no limits applied"));
    assert!(!stdout.contains("invalid JSON"));
}
