// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Status and cache command tests.

#![allow(clippy::unwrap_used)]

use super::common::*;

#[test]
fn status_of_fresh_project() {
    let temp = init_temp();

    let output = msync().arg("status").current_dir(temp.path()).output().unwrap();
    assert!(output.status.success());
    similar_asserts::assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        format!(
            "Remote: {}\n\
             Session: signed out\n\
             Agent: not running\n\
             Pending actions: 0 (0 in flight, 0 retrying)\n\
             Dead letters: 0\n\
             Last sync: never\n",
            UNREACHABLE_URL
        )
    );
}

#[test]
fn status_counts_queue() {
    let temp = init_temp();
    enqueue(&temp, "create", "orders", r#"{"sku":"A1"}"#);
    enqueue(&temp, "delete", "carts", r#"{"id":"C9"}"#);

    let status = json(&temp, &["status", "-o", "json"]);
    assert_eq!(status["pending"], 2);
    assert_eq!(status["in_flight"], 0);
    assert_eq!(status["dead_letters"], 0);
    assert_eq!(status["agent_running"], false);
    assert!(status["last_synced_at"].is_null());
}

#[test]
fn cache_purge_on_empty_cache() {
    let temp = init_temp();

    msync()
        .args(["cache", "purge"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout("Purged 0 expired cache entries\n");
}
