//! CLI Tests
//!
//! Runs the `hakobi` binary against scratch directories.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn hakobi() -> Command {
    let mut cmd = Command::cargo_bin("hakobi").unwrap();
    cmd.env_remove("RUST_LOG").arg("--log-level").arg("error");
    cmd
}

fn scratch() -> (TempDir, TempDir) {
    (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap())
}

#[test]
fn test_copies_file_and_prints_descriptor() {
    let (src, dest) = scratch();
    let source = src.path().join("Notes File.txt");
    fs::write(&source, b"hello").unwrap();

    let output = hakobi()
        .arg("--upload-dir")
        .arg(dest.path())
        .arg("--content-type")
        .arg("text/plain")
        .arg(&source)
        .output()
        .unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["name"], "Notes File.txt");
    assert_eq!(json["type"], "text/plain");
    assert_eq!(json["size"], 5);
    assert_eq!(json["ext"], "txt");

    let stored = json["path"].as_str().unwrap();
    assert_eq!(fs::read(stored).unwrap(), b"hello");
    assert!(source.exists(), "copy mode leaves the source in place");
}

#[test]
fn test_move_consumes_source() {
    let (src, dest) = scratch();
    let source = src.path().join("a.txt");
    fs::write(&source, b"abc").unwrap();

    hakobi()
        .arg("--upload-dir")
        .arg(dest.path())
        .arg("--move")
        .arg(&source)
        .assert()
        .success();

    assert!(!source.exists());
    assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 1);
}

#[test]
fn test_rejected_file_exits_with_failure() {
    let (src, dest) = scratch();
    let source = src.path().join("empty.txt");
    fs::write(&source, b"").unwrap();

    hakobi()
        .arg("--upload-dir")
        .arg(dest.path())
        .arg(&source)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Minimum file size error"));
}

#[test]
fn test_throw_mode_reports_error() {
    let (src, dest) = scratch();
    let source = src.path().join("empty.txt");
    fs::write(&source, b"").unwrap();

    hakobi()
        .arg("--upload-dir")
        .arg(dest.path())
        .arg("--throw")
        .arg(&source)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Minimum file size error"));
}

#[test]
fn test_several_files_produce_ordered_array() {
    let (src, dest) = scratch();
    let first = src.path().join("first.txt");
    let second = src.path().join("second.txt");
    fs::write(&first, b"1").unwrap();
    fs::write(&second, b"2").unwrap();

    let output = hakobi()
        .arg("--upload-dir")
        .arg(dest.path())
        .arg(&first)
        .arg(src.path().join("missing.txt"))
        .arg(&second)
        .output()
        .unwrap();

    assert!(!output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let items = json.as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["name"], "first.txt");
    assert_eq!(items[1]["upload_err"], "No file uploaded");
    assert_eq!(items[2]["name"], "second.txt");
}

#[test]
fn test_stdin_with_name() {
    let (_src, dest) = scratch();

    let output = hakobi()
        .arg("--upload-dir")
        .arg(dest.path())
        .arg("--name")
        .arg("piped.log")
        .arg("-")
        .write_stdin("from stdin")
        .output()
        .unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["name"], "piped.log");
    assert_eq!(json["size"], 10);
    assert_eq!(fs::read(json["path"].as_str().unwrap()).unwrap(), b"from stdin");
}

#[test]
fn test_named_policy_from_config() {
    let (src, dest) = scratch();
    let config = src.path().join("hakobi.yaml");
    fs::write(
        &config,
        format!(
            "policies:\n  docs:\n    upload_dir: {}\n    file_extensions: pdf\n",
            dest.path().display()
        ),
    )
    .unwrap();
    let source = src.path().join("a.txt");
    fs::write(&source, b"abc").unwrap();

    hakobi()
        .arg("--config")
        .arg(&config)
        .arg("--policy")
        .arg("docs")
        .arg(&source)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Invalid file extension"));

    hakobi()
        .arg("--config")
        .arg(&config)
        .arg("--policy")
        .arg("avatars")
        .arg(&source)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid Upload Configuration: avatars"));
}

#[test]
fn test_relative_upload_dir() {
    let (src, dest) = scratch();
    let source = src.path().join("a.txt");
    fs::write(&source, b"abc").unwrap();

    hakobi()
        .current_dir(dest.path())
        .arg("--upload-dir")
        .arg(".")
        .arg(&source)
        .assert()
        .success();

    assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 1);
}

#[test]
fn test_missing_upload_dir_is_reported() {
    let (src, dest) = scratch();
    let source = src.path().join("a.txt");
    fs::write(&source, b"abc").unwrap();

    hakobi()
        .arg("--upload-dir")
        .arg(dest.path().join("missing"))
        .arg(&source)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Upload directory not writable"));
}

#[test]
fn test_requires_files() {
    hakobi().assert().failure();
}
