// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Init command tests.

#![allow(clippy::unwrap_used)]

use super::common::*;

#[test]
fn creates_msync_directory() {
    let temp = TempDir::new().unwrap();

    msync()
        .arg("init")
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized sync store"))
        .stdout(predicate::str::contains("ws://127.0.0.1:7890"));

    assert!(temp.path().join(".msync/config.toml").exists());
    assert!(temp.path().join(".msync/store.db").exists());
}

#[test]
fn init_with_url_and_path() {
    let temp = TempDir::new().unwrap();

    msync()
        .args(["init", "project", "--url", "wss://sync.example.com/ws"])
        .current_dir(temp.path())
        .assert()
        .success();

    let config = std::fs::read_to_string(temp.path().join("project/.msync/config.toml")).unwrap();
    assert!(config.contains("url = \"wss://sync.example.com/ws\""));
}

#[test]
fn fails_if_already_initialized() {
    let temp = init_temp();

    msync()
        .arg("init")
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn rejects_non_websocket_url() {
    let temp = TempDir::new().unwrap();

    msync()
        .args(["init", "--url", "http://example.com"])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be ws:// or wss://"));
}

#[test]
fn commands_require_init() {
    let temp = TempDir::new().unwrap();

    msync()
        .arg("pending")
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("run 'marketsync init' first"));
}

#[test]
fn directory_flag() {
    let temp = init_temp();
    let nested = temp.path().join("a/b");
    std::fs::create_dir_all(&nested).unwrap();

    msync()
        .arg("-C")
        .arg(&nested)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains(UNREACHABLE_URL));
}
