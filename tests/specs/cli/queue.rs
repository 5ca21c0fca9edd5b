// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Enqueue and pending command tests.

#![allow(clippy::unwrap_used)]

use super::common::*;

#[test]
fn enqueue_then_list_in_order() {
    let temp = init_temp();

    let first = enqueue(&temp, "create", "orders", r#"{"sku":"A1","qty":2}"#);
    let second = enqueue(&temp, "update", "orders", r#"{"id":"O1","status":"delivered"}"#);
    let third = enqueue(&temp, "delete", "carts", r#"{"id":"C9"}"#);

    let actions = json(&temp, &["pending", "-o", "json"]);
    let ids: Vec<&str> = actions
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![first.as_str(), second.as_str(), third.as_str()]);

    msync()
        .arg("pending")
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(first))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("carts"));
}

#[test]
fn enqueue_text_output() {
    let temp = init_temp();

    msync()
        .args(["enqueue", "create", "orders", r#"{"sku":"A1"}"#])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Queued create "))
        .stdout(predicate::str::contains("Pending: 1"));
}

#[test]
fn empty_queue() {
    let temp = init_temp();

    msync()
        .arg("pending")
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout("No pending actions\n");
}

#[test]
fn enqueue_rejects_invalid_actions() {
    let temp = init_temp();

    msync()
        .args(["enqueue", "upsert", "orders", "{}"])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid action kind"));

    msync()
        .args(["enqueue", "update", "orders", r#"{"status":"x"}"#])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires an 'id' field"));

    msync()
        .args(["enqueue", "create", "orders", "[1,2]"])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be a JSON object"));

    msync()
        .arg("pending")
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout("No pending actions\n");
}

#[test]
fn queue_survives_between_processes() {
    let temp = init_temp();
    for n in 0..5 {
        enqueue(&temp, "create", "orders", &format!(r#"{{"n":{}}}"#, n));
    }

    let actions = json(&temp, &["pending", "-o", "json"]);
    let ns: Vec<i64> = actions
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["payload"]["n"].as_i64().unwrap())
        .collect();
    assert_eq!(ns, vec![0, 1, 2, 3, 4]);
}
