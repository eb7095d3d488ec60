//! Integration tests for the `briefkasten` CLI binary.
//!
//! Argument parsing, config handling and exit codes, plus the client
//! commands against a wiremock service. No GPIO hardware is needed.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Command with env isolation: no `BRIEFKASTEN_*` variables and config
/// directories pointed at a nonexistent path.
fn briefkasten_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("briefkasten");
    cmd.env("HOME", "/tmp/briefkasten-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/briefkasten-cli-test-nonexistent")
        .env_remove("BRIEFKASTEN_CONFIG")
        .env_remove("BRIEFKASTEN_DEVICE__SERIAL_NUMBER")
        .env_remove("BRIEFKASTEN_DEVICE__API_URL")
        .env_remove("BRIEFKASTEN_SERVER__BIND")
        .env_remove("RUST_LOG");
    cmd
}

fn with_config(config: &Path) -> assert_cmd::Command {
    let mut cmd = briefkasten_cmd();
    cmd.arg("--config").arg(config);
    cmd
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = briefkasten_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "{stderr}");
}

#[test]
fn test_help_lists_commands() {
    briefkasten_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("serve")
            .and(predicate::str::contains("device"))
            .and(predicate::str::contains("send-letter"))
            .and(predicate::str::contains("poll-unlock")),
    );
}

#[test]
fn test_version_flag() {
    briefkasten_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("briefkasten"));
}

#[test]
fn test_completions_bash() {
    briefkasten_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_unlock_needs_a_selector() {
    briefkasten_cmd()
        .arg("unlock")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--serial"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_flag() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("custom.toml");
    with_config(&file)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_init_then_refuse_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("config.toml");

    with_config(&file).args(["config", "init"]).assert().success();
    let written = std::fs::read_to_string(&file).unwrap();
    assert!(written.contains("[device.pins]"), "{written}");

    with_config(&file)
        .args(["config", "init"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("already exists"));

    with_config(&file)
        .args(["config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn test_config_show_merges_env() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("config.toml");
    std::fs::write(&file, "[device]\nserial_number = \"SN_FILE\"\n").unwrap();

    with_config(&file)
        .env("BRIEFKASTEN_DEVICE__API_URL", "http://10.0.0.2:5000")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("SN_FILE")
                .and(predicate::str::contains("http://10.0.0.2:5000"))
                .and(predicate::str::contains("open-on-rising")),
        );
}

#[test]
fn test_device_without_serial_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    with_config(&dir.path().join("missing.toml"))
        .arg("device")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("serial_number"));
}

#[test]
fn test_device_with_invalid_serial_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    with_config(&dir.path().join("missing.toml"))
        .args(["device", "--serial", "SN-1; rm"])
        .assert()
        .code(3);
}

#[test]
fn test_device_without_gpio_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let gpio = tempfile::tempdir().unwrap();
    with_config(&dir.path().join("missing.toml"))
        .args(["device", "--serial", "SN1", "--gpio-root"])
        .arg(gpio.path())
        .assert()
        .code(9)
        .stderr(predicate::str::contains("GPIO"));
}

// ── Client commands ─────────────────────────────────────────────────

#[test]
fn test_status_unreachable_is_connection_error() {
    briefkasten_cmd()
        .args(["--api-url", "http://127.0.0.1:1", "status"])
        .assert()
        .code(7);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_letters_prints_service_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/letters"))
        .and(body_json(json!({ "mac_address": "00:1a:2b:3c:4d:5e" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "letters": [
                { "id": 1, "serial_number": "SN1", "time": "2024-01-01T00:00:00Z" }
            ]
        })))
        .mount(&server)
        .await;

    briefkasten_cmd()
        .args(["--api-url", &server.uri(), "letters", "--mac", "00:1a:2b:3c:4d:5e"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2024-01-01T00:00:00Z"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unlock_unknown_mac_exits_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/entriegeln"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "error": "unknown device" })),
        )
        .mount(&server)
        .await;

    briefkasten_cmd()
        .args(["--api-url", &server.uri(), "unlock", "--mac", "00:1a:2b:3c:4d:5e"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("unknown device"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_send_letter_validates_time_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/new_letter"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    briefkasten_cmd()
        .args([
            "--api-url",
            &server.uri(),
            "send-letter",
            "--serial",
            "SN1",
            "--time",
            "tomorrow",
        ])
        .assert()
        .code(2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_poll_unlock_prints_flag() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/frage_entriegeln"))
        .and(body_json(json!({ "serial_number": "SN1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "entriegeln": true })))
        .expect(1)
        .mount(&server)
        .await;

    briefkasten_cmd()
        .args(["--api-url", &server.uri(), "poll-unlock", "--serial", "SN1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"entriegeln\": true"));
}
