//! Startup validation of the settings file
//!
//! Every case here must fail before the first snapshot is taken.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn run_with_settings(content: &str) -> assert_cmd::assert::Assert {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("settings.toml");
    fs::write(&config_path, content).unwrap();

    Command::new(env!("CARGO_BIN_EXE_usbkill"))
        .args(["--simulate", "--config", config_path.to_str().unwrap()])
        .timeout(std::time::Duration::from_secs(10))
        .assert()
}

#[test]
fn test_missing_settings_file() {
    Command::new(env!("CARGO_BIN_EXE_usbkill"))
        .args(["--config", "/nonexistent/usbkill/settings.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read settings file"));
}

#[test]
fn test_malformed_settings_file() {
    run_with_settings("[config\nsleep = 1.0\n")
        .failure()
        .stderr(predicate::str::contains("invalid settings file"));
}

#[test]
fn test_invalid_sleep_rejected() {
    run_with_settings(
        r#"
[config]
sleep = 0
whitelist = ""
kill_on_missing = 1
"#,
    )
    .failure()
    .stderr(predicate::str::contains("invalid sleep interval"));
}

#[test]
fn test_invalid_kill_on_missing_rejected() {
    run_with_settings(
        r#"
[config]
sleep = 0.5
whitelist = ""
kill_on_missing = 5
"#,
    )
    .failure()
    .stderr(predicate::str::contains("must be 0 or 1"));
}

#[test]
fn test_missing_required_field() {
    run_with_settings(
        r#"
[config]
sleep = 0.5
kill_on_missing = 1
"#,
    )
    .failure()
    .stderr(predicate::str::contains("missing required setting 'whitelist'"));
}
