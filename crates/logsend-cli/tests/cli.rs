//! End-to-end tests for the `logsend` binary.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn logsend() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_logsend"));
    cmd.env_remove("LOGSEND_DIR")
        .env_remove("LOGSEND_PREFIX")
        .env_remove("LOGSEND_FLUSH_INTERVAL_MS")
        .env_remove("LOGSEND_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

fn payloads(n: usize) -> String {
    (0..n).map(|i| format!("{{\"i\":{i}}}\n")).collect()
}

// ==================== Help ====================

#[test]
fn test_help_lists_commands() {
    logsend()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("collect"))
        .stdout(predicate::str::contains("inspect"))
        .stdout(predicate::str::contains("pack"));
}

#[test]
fn test_unknown_command_fails() {
    logsend().arg("frobnicate").assert().failure();
}

// ==================== Pack and Inspect ====================

#[test]
fn test_pack_then_inspect() {
    let dir = TempDir::new().expect("tempdir");

    logsend()
        .args(["--format", "json", "pack", "--samples", "10", "--base", "run", "--dir"])
        .arg(dir.path())
        .write_stdin(payloads(25))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"blocks\": 3"));

    let packed = dir.path().join("run.0000.lsb");
    assert!(packed.exists());

    logsend()
        .args(["--format", "json", "inspect"])
        .arg(&packed)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"samples\": 25"));
}

#[test]
fn test_inspect_corrupt_file_fails() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("garbage.lsb");
    fs::write(&path, b"not a block file").expect("write");

    logsend()
        .arg("inspect")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("garbage.lsb"));
}

// ==================== Collect ====================

#[test]
fn test_collect_forwards_and_writes_blocks() {
    let dir = TempDir::new().expect("tempdir");
    let input: String = (0..12)
        .map(|i| format!("{{\"schema\":\"cpu\",\"priority\":\"info\",\"payload\":{{\"i\":{i}}}}}\n"))
        .chain(std::iter::once("{\"payload\":\"hello\"}\n".to_string()))
        .collect();

    logsend()
        .args(["collect", "--samples", "10", "--prefix", "t", "--dir"])
        .arg(dir.path())
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("hello"))
        .stderr(predicate::str::contains("Messages: 13"));

    let bytes = fs::read(dir.path().join("t.cpu.0")).expect("block file");
    assert!(bytes.starts_with(b"LSB1"));
}

#[test]
fn test_collect_without_dir_fails() {
    logsend()
        .arg("collect")
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("dir"));
}

// ==================== Echo ====================

#[test]
fn test_echo_prefixes_priority() {
    logsend()
        .args(["echo", "--priority", "warning"])
        .write_stdin("{\"a\":1}\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("[p=warning]"))
        .stdout(predicate::str::contains("\"a\":1"));
}
