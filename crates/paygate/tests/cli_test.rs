//! Integration tests for the `paygate` CLI binary.
//!
//! Argument parsing, help, completions, config handling and a few
//! server-backed commands against a wiremock extension.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `paygate` binary with env isolation.
///
/// Clears all `PAYGATE_*` env vars and points config directories at
/// `home` so tests never touch the user's real configuration.
fn paygate_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("paygate");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("NO_COLOR", "1")
        .env_remove("PAYGATE_PROFILE")
        .env_remove("PAYGATE_SERVER")
        .env_remove("PAYGATE_WALLET_KEY")
        .env_remove("PAYGATE_WALLET_ID")
        .env_remove("PAYGATE_OUTPUT")
        .env_remove("PAYGATE_INSECURE")
        .env_remove("PAYGATE_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn device_json(id: &str, switches: usize) -> serde_json::Value {
    let switches: Vec<_> = (1..=switches)
        .map(|n| {
            json!({
                "id": format!("sw{n}"),
                "amount": 21,
                "gpio_pin": 4,
                "gpio_duration": 1000,
                "lnurl": format!("LNURL{n}"),
            })
        })
        .collect();
    json!({
        "id": id,
        "title": format!("Device {id}"),
        "wallet": "default",
        "currency": "sat",
        "switches": switches,
        "available_start": "09:00",
        "available_stop": "17:00",
        "timeout": 30,
        "timezone": "Europe/Amsterdam",
    })
}

/// Run the binary off the async runtime so wiremock keeps serving.
async fn run(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

fn server_args(server: &MockServer) -> [String; 4] {
    [
        "--server".into(),
        format!("{}/devicetimer", server.uri()),
        "--wallet-key".into(),
        "adm".into(),
    ]
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = paygate_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let home = tempfile::tempdir().unwrap();
    paygate_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("payment-gated")
            .and(predicate::str::contains("devices"))
            .and(predicate::str::contains("status"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_version_flag() {
    let home = tempfile::tempdir().unwrap();
    paygate_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("paygate"));
}

#[test]
fn test_completions_zsh() {
    let home = tempfile::tempdir().unwrap();
    paygate_cmd(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_devices_list_without_config() {
    let home = tempfile::tempdir().unwrap();
    paygate_cmd(home.path())
        .args(["devices", "list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("config init"));
}

#[test]
fn test_unknown_profile() {
    let home = tempfile::tempdir().unwrap();
    paygate_cmd(home.path())
        .args(["-p", "nope", "devices", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn test_invalid_switch_spec_is_a_usage_error() {
    let home = tempfile::tempdir().unwrap();
    paygate_cmd(home.path())
        .args(["devices", "create", "--title", "X", "--switch", "0:4:1000"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("amount must be positive"));
}

#[test]
fn test_server_url_must_be_http() {
    let home = tempfile::tempdir().unwrap();
    paygate_cmd(home.path())
        .args(["--server", "ftp://node", "--wallet-key", "k", "devices", "list"])
        .assert()
        .code(2);
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_is_under_config_home() {
    let home = tempfile::tempdir().unwrap();
    paygate_cmd(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_show_masks_keys() {
    let home = tempfile::tempdir().unwrap();
    let dir = home.path().join(".config").join("paygate");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("config.toml"),
        r#"
default_profile = "shop"

[profiles.shop]
server = "https://node.example/devicetimer"

[[profiles.shop.wallets]]
id = "w1"
admin_key = "very-secret"
"#,
    )
    .unwrap();

    for format in ["table", "json", "yaml"] {
        paygate_cmd(home.path())
            .args(["config", "show", "-o", format])
            .assert()
            .success()
            .stdout(predicate::str::contains("very-secret").not())
            .stdout(predicate::str::contains("****"));
    }

    paygate_cmd(home.path())
        .args(["config", "use", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("shop"));
}

// ── Server-backed ───────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_devices_list_json_includes_link_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/devicetimer/api/v1/device"))
        .and(header("X-Api-Key", "adm"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([device_json("a", 2), device_json("b", 0)])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/devicetimer/api/v1/ws/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "connected": ["a"] })))
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let mut cmd = paygate_cmd(home.path());
    cmd.args(server_args(&server))
        .args(["devices", "list", "-o", "json"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let listed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["id"], "a");
    assert_eq!(listed[0]["link"], "online");
    assert_eq!(listed[1]["link"], "offline");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_status_plain_counts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/devicetimer/api/v1/device"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([device_json("a", 2), device_json("b", 1)])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/devicetimer/api/v1/ws/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "connected": ["b"] })))
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let mut cmd = paygate_cmd(home.path());
    cmd.args(server_args(&server)).args(["status", "-o", "plain"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "devices=2 switches=3 connected=1 offline=1"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_missing_device_exits_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/devicetimer/api/v1/device/ghost"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "detail": "not found" })))
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let mut cmd = paygate_cmd(home.path());
    cmd.args(server_args(&server)).args(["devices", "get", "ghost"]);
    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(4), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_delete_without_yes_refuses_when_not_interactive() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/devicetimer/api/v1/device/a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(device_json("a", 1)))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let mut cmd = paygate_cmd(home.path());
    cmd.args(server_args(&server))
        .args(["devices", "delete", "a"])
        .write_stdin("");
    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(2), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("--yes"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_delete_with_yes_uses_admin_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/devicetimer/api/v1/device/a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(device_json("a", 1)))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/devicetimer/api/v1/device/a"))
        .and(header("X-Api-Key", "adm"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let mut cmd = paygate_cmd(home.path());
    cmd.args(server_args(&server)).args(["-y", "devices", "delete", "a"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_channel_url_is_hardware_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/devicetimer/api/v1/device/a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(device_json("a", 1)))
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let mut cmd = paygate_cmd(home.path());
    cmd.args(server_args(&server))
        .args(["devices", "channel-url", "a", "-o", "plain"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let url = String::from_utf8_lossy(&output.stdout).trim().to_owned();
    assert!(url.starts_with("ws://"), "{url}");
    assert!(url.ends_with("/devicetimer/api/v1/ws/a"), "{url}");
}
