//! Integration tests for the `touchwand` CLI binary.
//!
//! Argument parsing, help output, shell completions and error handling run
//! without a hub; unit commands run against a wiremock hub.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a command for the `touchwand` binary with env isolation.
///
/// Clears all `TOUCHWAND_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn touchwand_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("touchwand");
    cmd.env("HOME", "/tmp/touchwand-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/touchwand-cli-test-nonexistent")
        .env_remove("TOUCHWAND_PROFILE")
        .env_remove("TOUCHWAND_HOST")
        .env_remove("TOUCHWAND_USERNAME")
        .env_remove("TOUCHWAND_PASSWORD")
        .env_remove("TOUCHWAND_OUTPUT")
        .env_remove("TOUCHWAND_TIMEOUT");
    cmd
}

/// A command pointed at `server` with credentials on the command line.
fn hub_cmd(server: &MockServer) -> assert_cmd::Command {
    let mut cmd = touchwand_cmd();
    cmd.args([
        "--host",
        "127.0.0.1",
        "--port",
        &server.address().port().to_string(),
        "--username",
        "admin",
        "--password",
        "pw",
    ]);
    cmd
}

async fn mock_hub() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/login"))
        .and(query_param("user", "admin"))
        .and(query_param("psw", "pw"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

/// A command whose config directories live in `dir`.
fn config_cmd(dir: &std::path::Path) -> assert_cmd::Command {
    let mut cmd = touchwand_cmd();
    cmd.env("HOME", dir).env("XDG_CONFIG_HOME", dir);
    cmd
}

/// Write `contents` where the binary looks for its config under `dir`.
fn write_config(dir: &std::path::Path, contents: &str) -> std::path::PathBuf {
    let output = config_cmd(dir).args(["config", "path"]).output().unwrap();
    let path = std::path::PathBuf::from(String::from_utf8(output.stdout).unwrap().trim());
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, contents).unwrap();
    path
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = touchwand_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    touchwand_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("TouchWand")
            .and(predicate::str::contains("units"))
            .and(predicate::str::contains("discover"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_completions_bash() {
    touchwand_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("touchwand"));
}

#[test]
fn test_config_path() {
    touchwand_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_invalid_dim_level_is_usage_error() {
    let output = touchwand_cmd()
        .args(["--host", "127.0.0.1", "units", "dim", "7", "300"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_units_without_hub_reports_missing_config() {
    let output = touchwand_cmd().args(["units", "list"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("No hub configured"), "got:\n{text}");
}

#[test]
fn test_config_use_sets_default_profile() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
        default_profile = "office"

        [profiles.office]
        host = "10.0.0.9"

        [profiles.lab]
        host = "10.0.0.10"
        "#,
    );

    config_cmd(dir.path())
        .args(["config", "use", "lab"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Default profile set to 'lab'"));
    let saved = std::fs::read_to_string(&path).unwrap();
    assert!(saved.contains(r#"default_profile = "lab""#), "got:\n{saved}");

    let output = config_cmd(dir.path())
        .args(["config", "use", "attic"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    let text = combined_output(&output);
    assert!(text.contains("attic"), "got:\n{text}");
    let saved = std::fs::read_to_string(&path).unwrap();
    assert!(saved.contains(r#"default_profile = "lab""#), "got:\n{saved}");
}

// ── Against a mock hub ──────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_units_list_json() {
    let server = mock_hub().await;
    Mock::given(method("GET"))
        .and(path("/units/listUnits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 7, "name": "Switch A", "type": "Switch", "connectivity": "zwave", "currStatus": 255 }
        ])))
        .mount(&server)
        .await;

    hub_cmd(&server)
        .args(["-o", "json", "units", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Switch A\"").and(predicate::str::contains("\"7\"")));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_units_get_not_found() {
    let server = mock_hub().await;
    Mock::given(method("GET"))
        .and(path("/units/getUnitByID"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let output = hub_cmd(&server).args(["units", "get", "99"]).output().unwrap();
    assert_eq!(output.status.code(), Some(4));
    let text = combined_output(&output);
    assert!(text.contains("unit '99' not found"), "got:\n{text}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_units_switch_posts_action() {
    let server = mock_hub().await;
    Mock::given(method("POST"))
        .and(path("/units/action"))
        .and(body_json(json!({ "id": 7, "value": 255 })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    hub_cmd(&server)
        .args(["units", "switch", "7", "on"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Command sent"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_login_rejected_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let output = hub_cmd(&server).args(["units", "list"]).output().unwrap();
    assert_eq!(output.status.code(), Some(3));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_lone_profile_is_used_without_flags() {
    let server = mock_hub().await;
    Mock::given(method("GET"))
        .and(path("/units/listUnits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 7, "name": "Switch A", "type": "Switch", "currStatus": 0 }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_config(
        dir.path(),
        &format!(
            "[profiles.office]\nhost = \"127.0.0.1\"\nport = {}\nusername = \"admin\"\n",
            server.address().port()
        ),
    );

    config_cmd(dir.path())
        .env("TOUCHWAND_PASSWORD", "pw")
        .args(["-o", "json", "units", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Switch A\""));
}
