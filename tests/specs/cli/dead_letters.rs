// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Dead-letter command tests.

#![allow(clippy::unwrap_used)]

use super::common::*;

#[test]
fn empty_dead_letters() {
    let temp = init_temp();

    msync()
        .args(["dead-letters", "list"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout("No dead letters\n");

    let letters = json(&temp, &["dead-letters", "list", "-o", "json"]);
    assert_eq!(letters, serde_json::json!([]));
}

#[test]
fn requeue_unknown_id_fails() {
    let temp = init_temp();

    msync()
        .args(["dead-letters", "requeue", "no-such-id"])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("action not found: no-such-id"));
}

#[test]
fn requeue_pending_action_is_not_a_dead_letter() {
    let temp = init_temp();
    let id = enqueue(&temp, "create", "orders", r#"{"sku":"A1"}"#);

    msync()
        .args(["dead-letters", "requeue", &id])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("action not found"));
}

#[test]
fn purge_empty() {
    let temp = init_temp();

    msync()
        .args(["dead-letters", "purge"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout("Purged 0 dead letters\n");
}
