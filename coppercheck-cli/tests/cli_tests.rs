//! CLI integration tests

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

/// Build command for the coppercheck binary (found in target/debug when run
/// via cargo test).
fn coppercheck_cli() -> Command {
    cargo_bin_cmd!("coppercheck")
}

/// Path to the library crate's test fixtures (relative to the workspace).
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("coppercheck")
        .join("tests")
        .join("fixtures")
}

#[test]
fn test_cli_help() {
    let mut cmd = coppercheck_cli();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("design rule"));
}

#[test]
fn test_cli_version() {
    let mut cmd = coppercheck_cli();
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_check_human_output() {
    let mut cmd = coppercheck_cli();
    cmd.arg("check")
        .arg(fixtures_dir().join("board.json"))
        .arg(fixtures_dir().join("rules.json"));

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("min_line_width"))
        .stdout(predicate::str::contains("Summary"));
}

#[test]
fn test_cli_check_fail_on_violations() {
    let mut cmd = coppercheck_cli();
    cmd.arg("check")
        .arg(fixtures_dir().join("board.json"))
        .arg(fixtures_dir().join("rules.json"))
        .arg("--fail-on-violations");

    cmd.assert().failure();
}

#[test]
fn test_cli_check_json_output() {
    let mut cmd = coppercheck_cli();
    cmd.arg("check")
        .arg(fixtures_dir().join("board.json"))
        .arg(fixtures_dir().join("rules.json"))
        .arg("--format")
        .arg("json");

    let output = cmd.assert().success().get_output().stdout.clone();
    let parsed: serde_json::Value = serde_json::from_slice(&output).expect("valid JSON");
    let violations = parsed["violations"].as_array().expect("violations array");
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0]["rule"], "min_line_width");
    assert_eq!(parsed["summary"]["total"], 1);
}

#[test]
fn test_cli_check_csv_output() {
    let mut cmd = coppercheck_cli();
    cmd.arg("check")
        .arg(fixtures_dir().join("board.json"))
        .arg(fixtures_dir().join("rules.json"))
        .arg("--format")
        .arg("csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("rule,name,"));
}

#[test]
fn test_cli_check_writes_netlist() {
    let dir = tempfile::tempdir().unwrap();
    let netlist = dir.path().join("board.356");

    let mut cmd = coppercheck_cli();
    cmd.arg("check")
        .arg(fixtures_dir().join("board.json"))
        .arg(fixtures_dir().join("rules.json"))
        .arg("--netlist")
        .arg(&netlist);

    cmd.assert().success();
    let text = std::fs::read_to_string(&netlist).unwrap();
    assert!(text.contains("NET SIG1"));
    assert!(text.ends_with("999\n"));
}

#[test]
fn test_cli_check_missing_file() {
    let mut cmd = coppercheck_cli();
    cmd.arg("check")
        .arg("no_such_board.json")
        .arg(fixtures_dir().join("rules.json"));

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_cli_rules_listing() {
    let mut cmd = coppercheck_cli();
    cmd.arg("rules").arg("--verbose");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("min_line_width"))
        .stdout(predicate::str::contains("back_drill_stub_length"))
        .stdout(predicate::str::contains("impedance_diff_pair"));
}
