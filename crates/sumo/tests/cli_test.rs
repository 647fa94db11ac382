//! Integration tests for the `sumo` CLI binary.
//!
//! Argument parsing, configuration commands, and input validation; nothing
//! here needs a SumoRobot on the USB bus.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `sumo` binary with env isolation.
fn sumo_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("sumo");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("NO_COLOR", "1")
        .env_remove("SUMO_CONFIG")
        .env_remove("SUMO_WIFI_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = sumo_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    sumo_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("SumoRobot")
            .and(predicate::str::contains("wifi"))
            .and(predicate::str::contains("firmware"))
            .and(predicate::str::contains("ports")),
    );
}

#[test]
fn test_version_flag() {
    let home = tempfile::tempdir().unwrap();
    sumo_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sumo"));
}

#[test]
fn test_completions_bash() {
    let home = tempfile::tempdir().unwrap();
    sumo_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_wifi_requires_ssid() {
    let home = tempfile::tempdir().unwrap();
    let output = sumo_cmd(home.path()).args(["wifi"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("--ssid"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_flag() {
    let home = tempfile::tempdir().unwrap();
    let file = home.path().join("custom.toml");
    sumo_cmd(home.path())
        .args(["config", "path", "--config"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_init_then_show() {
    let home = tempfile::tempdir().unwrap();
    let file = home.path().join("sumo.toml");

    sumo_cmd(home.path())
        .arg("--config")
        .arg(&file)
        .args(["config", "init"])
        .assert()
        .success();
    let written = std::fs::read_to_string(&file).unwrap();
    assert!(written.contains("[firmware]"));
    assert!(written.contains("esptool.py"));

    // A second init refuses to overwrite.
    let output = sumo_cmd(home.path())
        .arg("--config")
        .arg(&file)
        .args(["config", "init"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(5));
    assert!(combined_output(&output).contains("--force"));

    sumo_cmd(home.path())
        .arg("--config")
        .arg(&file)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("chip_marker = \"firmware/esp32\""));
}

#[test]
fn test_config_show_applies_environment() {
    let home = tempfile::tempdir().unwrap();
    sumo_cmd(home.path())
        .env("SUMO_SERIAL__BAUD", "9600")
        .args(["-o", "json", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"baud\": 9600"));
}

#[test]
fn test_invalid_config_is_reported() {
    let home = tempfile::tempdir().unwrap();
    let file = home.path().join("bad.toml");
    std::fs::write(&file, "[flash]\nsize = \"huge\"\n").unwrap();

    let output = sumo_cmd(home.path())
        .arg("--config")
        .arg(&file)
        .args(["firmware", "--wait", "0"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(5));
    assert!(combined_output(&output).contains("flash.size"));
}

// ── Validation ──────────────────────────────────────────────────────

#[test]
fn test_empty_password_is_rejected_before_waiting() {
    let home = tempfile::tempdir().unwrap();
    let output = sumo_cmd(home.path())
        .args(["wifi", "--ssid", "Office", "--password", "", "--wait", "30"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("password"));
}

#[test]
fn test_placeholder_network_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    let output = sumo_cmd(home.path())
        .args(["wifi", "--ssid", "Network name", "--password", "pw123"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("ssid"));
}
