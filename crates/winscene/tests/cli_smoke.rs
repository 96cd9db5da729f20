//! CLI smoke tests for `wsc`.
//!
//! Each test writes its scenario into a temp dir and runs the built binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

#[allow(deprecated)]
fn wsc_cmd() -> Command {
    let mut cmd = Command::cargo_bin("wsc").expect("wsc binary should be built");
    cmd.env("RUST_LOG", "warn");
    cmd.env_remove("WSC_CONFIG");
    cmd
}

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("write fixture");
    path
}

const LIFECYCLE: &str = r#"
[[windows]]
name = "editor"
window_type = "app_main_window"
rect = { x = 0, y = 0, width = 1280, height = 800 }

[[steps]]
op = "connect"
window = "editor"
token = "editor-token"

[[steps]]
op = "foreground"
window = "editor"

[[steps]]
op = "first_frame"
window = "editor"

[[steps]]
op = "background"
window = "editor"

[[steps]]
op = "disconnect"
window = "editor"
from_client = true
token = "editor-token"
"#;

// =============================================================================
// Global flags
// =============================================================================

#[test]
fn help_lists_subcommands() {
    wsc_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("check-config"));
}

#[test]
fn version_flag_works() {
    wsc_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("wsc"));
}

#[test]
fn states_prints_transition_table() {
    wsc_cmd()
        .arg("states")
        .assert()
        .success()
        .stdout(predicate::str::contains("disconnect -> connect, end"));
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn lifecycle_scenario_ends_the_session() {
    let dir = TempDir::new().unwrap();
    let scenario = write(&dir, "lifecycle.toml", LIFECYCLE);

    let output = wsc_cmd()
        .args(["run", "--strict"])
        .arg(&scenario)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: serde_json::Value = serde_json::from_slice(&output).expect("report is JSON");
    assert_eq!(report["passed"], true);
    assert_eq!(report["windows"]["editor"]["state"], "end");
    assert_eq!(report["steps"].as_array().map(Vec::len), Some(5));
}

#[test]
fn strict_mode_fails_on_unexpected_result() {
    let dir = TempDir::new().unwrap();
    let scenario = write(
        &dir,
        "bad.toml",
        r#"
[[windows]]
name = "editor"

[[steps]]
op = "foreground"
window = "editor"
"#,
    );

    wsc_cmd()
        .args(["run", "--strict"])
        .arg(&scenario)
        .assert()
        .code(2)
        .stdout(predicate::str::contains("\"passed\":false"));
}

#[test]
fn expected_errors_count_as_passing() {
    let dir = TempDir::new().unwrap();
    let scenario = write(
        &dir,
        "expected.toml",
        r#"
[[windows]]
name = "editor"

[[steps]]
op = "foreground"
window = "editor"
expect = "invalid_state"
"#,
    );

    wsc_cmd()
        .args(["run", "--strict"])
        .arg(&scenario)
        .assert()
        .success();
}

#[test]
fn json_scenarios_are_accepted() {
    let dir = TempDir::new().unwrap();
    let scenario = write(
        &dir,
        "scenario.json",
        r#"{
  "windows": [{ "name": "toast", "window_type": "toast" }],
  "steps": [
    { "op": "connect", "window": "toast" },
    { "op": "show", "window": "toast", "expect": "invalid_parent" }
  ]
}"#,
    );

    wsc_cmd()
        .args(["run", "--strict"])
        .arg(&scenario)
        .assert()
        .success()
        .stdout(predicate::str::contains("invalid_parent"));
}

#[test]
fn unknown_window_is_a_hard_error() {
    let dir = TempDir::new().unwrap();
    let scenario = write(
        &dir,
        "ghost.toml",
        r#"
[[steps]]
op = "background"
window = "ghost"
"#,
    );

    wsc_cmd()
        .arg("run")
        .arg(&scenario)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown window"));
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn check_config_prints_defaults() {
    wsc_cmd()
        .arg("check-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("max_floating_window_size"));
}

#[test]
fn invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = write(
        &dir,
        "winscene.toml",
        "[limits]\nmax_floating_window_size = 0\n",
    );

    wsc_cmd()
        .arg("--config")
        .arg(&config)
        .arg("check-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}
