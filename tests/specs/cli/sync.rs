// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot sync tests against an unreachable service.

#![allow(clippy::unwrap_used)]

use super::common::*;

fn sign_in(temp: &TempDir) {
    let path = temp.path().join(".msync/config.toml");
    let config = std::fs::read_to_string(&path).unwrap();
    let config = config.replace("[remote]\n", "[remote]\nsession_token = \"tok\"\n");
    std::fs::write(&path, config).unwrap();
}

#[test]
fn sync_while_unreachable_keeps_queue() {
    let temp = init_temp();
    sign_in(&temp);
    enqueue(&temp, "update", "orders", r#"{"id":"O1","status":"delivered"}"#);

    msync()
        .arg("sync")
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot sync while offline"));

    let status = json(&temp, &["status", "-o", "json"]);
    assert_eq!(status["pending"], 1);
    assert_eq!(status["signed_in"], true);
    assert_eq!(status["retrying"], 0);
    assert!(status["last_synced_at"].is_null());
}

#[test]
fn sync_signed_out_is_offline() {
    let temp = init_temp();

    msync()
        .arg("sync")
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("offline"));
}
