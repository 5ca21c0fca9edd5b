// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test files,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use assert_cmd::Command;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// Nothing listens here; connections are refused right away.
pub const UNREACHABLE_URL: &str = "ws://127.0.0.1:1";

pub fn msync() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("marketsync").unwrap();
    cmd.env("RUST_LOG", "off");
    cmd
}

/// Helper to create an initialized temp directory
pub fn init_temp() -> TempDir {
    let temp = TempDir::new().unwrap();
    msync()
        .arg("init")
        .arg("--url")
        .arg(UNREACHABLE_URL)
        .current_dir(temp.path())
        .assert()
        .success();
    temp
}

/// Queue an action and return its id.
pub fn enqueue(temp: &TempDir, kind: &str, target: &str, payload: &str) -> String {
    let output = msync()
        .args(["enqueue", kind, target, payload, "-o", "json"])
        .current_dir(temp.path())
        .output()
        .unwrap();
    assert!(output.status.success(), "enqueue failed: {:?}", output);
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    value["id"].as_str().unwrap().to_string()
}

/// Parse the JSON output of a successful command.
pub fn json(temp: &TempDir, args: &[&str]) -> serde_json::Value {
    let output = msync().args(args).current_dir(temp.path()).output().unwrap();
    assert!(output.status.success(), "command failed: {:?}", output);
    serde_json::from_slice(&output.stdout).unwrap()
}
