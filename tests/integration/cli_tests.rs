//! Integration tests for the CLI binary.
//!
//! Drives the `sid` binary through generate, export, verify, show and
//! lookup against files in a temporary directory.
//!
//! This test is registered as a [[test]] in the sovereign-identity-cli
//! crate so that CARGO_BIN_EXE_sid is available.

use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

/// Get a Command pointing to the `sid` binary.
fn sid_binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_sid"))
}

fn run(args: &[&str]) -> Output {
    sid_binary()
        .args(args)
        .output()
        .expect("failed to execute sid")
}

fn assert_success(output: &Output, what: &str) {
    assert!(
        output.status.success(),
        "{what} should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp paths are utf-8")
}

fn generate(dir: &Path, file: &str, name: &str) -> std::path::PathBuf {
    let path = dir.join(file);
    let output = run(&[
        "generate",
        "--name",
        name,
        "--network",
        "testnet",
        "--output",
        path_str(&path),
    ]);
    assert_success(&output, "sid generate");
    path
}

#[test]
fn cli_responds_to_help() {
    let output = run(&["--help"]);
    assert_success(&output, "sid --help");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("sid") || stdout.contains("Usage"),
        "sid --help output should contain usage information, got: {stdout}"
    );
}

#[test]
fn cli_responds_to_version() {
    let output = run(&["--version"]);
    assert_success(&output, "sid --version");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("0.3"), "unexpected version output: {stdout}");
}

#[test]
fn cli_exits_with_error_on_unknown_flag() {
    let output = run(&["--nonexistent-flag"]);
    assert!(!output.status.success());
}

#[test]
fn cli_generate_export_verify() {
    let dir = tempfile::tempdir().unwrap();
    let private = generate(dir.path(), "ted.json", "Ted");

    let record: Value =
        serde_json::from_str(&std::fs::read_to_string(&private).unwrap()).unwrap();
    assert_eq!(record["name"]["formatted"], "Ted");
    assert_eq!(record["pubkeys"].as_array().unwrap().len(), 4);
    assert!(record["pubkeys"][0].get("priv").is_some());

    let public = dir.path().join("ted.pub.json");
    let output = run(&[
        "export",
        "--input",
        path_str(&private),
        "--output",
        path_str(&public),
    ]);
    assert_success(&output, "sid export");
    let signed: Value = serde_json::from_str(&std::fs::read_to_string(&public).unwrap()).unwrap();
    assert!(signed["pubkeys"][0].get("_sig").is_some());
    assert!(signed["pubkeys"][0].get("priv").is_none());

    let output = run(&["verify", "--input", path_str(&public)]);
    assert_success(&output, "sid verify");
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("OK "));
}

#[test]
fn cli_verify_rejects_tampered_export() {
    let dir = tempfile::tempdir().unwrap();
    let private = generate(dir.path(), "ted.json", "Ted");
    let public = dir.path().join("ted.pub.json");
    assert_success(
        &run(&["export", "--input", path_str(&private), "--output", path_str(&public)]),
        "sid export",
    );

    let mut signed: Value =
        serde_json::from_str(&std::fs::read_to_string(&public).unwrap()).unwrap();
    signed["name"]["formatted"] = Value::from("Rufus");
    std::fs::write(&public, serde_json::to_string(&signed).unwrap()).unwrap();

    let output = run(&["verify", "--input", path_str(&public)]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid signature"));
}

#[test]
fn cli_export_requires_private_keys() {
    let dir = tempfile::tempdir().unwrap();
    let private = generate(dir.path(), "ted.json", "Ted");
    let public = dir.path().join("ted.pub.json");
    assert_success(
        &run(&["export", "--input", path_str(&private), "--output", path_str(&public)]),
        "sid export",
    );

    let output = run(&["export", "--input", path_str(&public)]);
    assert!(!output.status.success());
}

#[test]
fn cli_verify_with_config() {
    let dir = tempfile::tempdir().unwrap();
    let private = generate(dir.path(), "ted.json", "Ted");
    let config = dir.path().join("config.json");
    std::fs::write(&config, r#"{"requiredKeys": [{"type": "dsa"}]}"#).unwrap();

    let output = run(&[
        "verify",
        "--input",
        path_str(&private),
        "--config",
        path_str(&config),
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("dsa"));
}

#[test]
fn cli_show_lists_keys() {
    let dir = tempfile::tempdir().unwrap();
    let private = generate(dir.path(), "ted.json", "Ted");
    let output = run(&["show", "--input", path_str(&private)]);
    assert_success(&output, "sid show");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Ted"));
    assert!(stdout.contains("bitcoin"));
    assert!(stdout.contains("payment"));
    assert!(stdout.contains("(private)"));
}

#[test]
fn cli_lookup_finds_owner() {
    let dir = tempfile::tempdir().unwrap();
    let ted = generate(dir.path(), "ted.json", "Ted");
    let bill = generate(dir.path(), "bill.json", "Bill");

    let record: Value = serde_json::from_str(&std::fs::read_to_string(&bill).unwrap()).unwrap();
    let fingerprint = record["pubkeys"][0]["fingerprint"].as_str().unwrap().to_string();

    let output = run(&[
        "lookup",
        "--index",
        "fingerprint",
        "--value",
        &fingerprint,
        path_str(&ted),
        path_str(&bill),
    ]);
    assert_success(&output, "sid lookup");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("bill.json"));
    assert!(!stdout.contains("ted.json"));

    let output = run(&[
        "lookup",
        "--index",
        "networkName",
        "--value",
        "testnet",
        path_str(&ted),
        path_str(&bill),
    ]);
    assert_success(&output, "sid lookup networkName");
    assert_eq!(String::from_utf8_lossy(&output.stdout).lines().count(), 4);
}
