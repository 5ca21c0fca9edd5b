// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::test_helpers::{memory_queue, payload};
use ms_core::ActionKind;
use serde_json::json;

fn render(queue: &MutationQueue, output: OutputFormat) -> String {
    let mut out = Vec::new();
    run_impl(queue, output, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn empty_queue() {
    let queue = memory_queue();
    assert_eq!(render(&queue, OutputFormat::Text), "No pending actions\n");
    assert_eq!(render(&queue, OutputFormat::Json).trim(), "[]");
}

#[test]
fn lists_in_fifo_order_with_errors() {
    let queue = memory_queue();
    let first = queue
        .enqueue(ActionKind::Create, "orders", payload(json!({"sku": "A"})))
        .unwrap();
    let second = queue
        .enqueue(ActionKind::Delete, "carts", payload(json!({"id": "C9"})))
        .unwrap();
    queue.mark_in_flight(&second).unwrap();
    queue.mark_failed(&second, "rejected by remote: nope").unwrap();

    let text = render(&queue, OutputFormat::Text);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with(&first));
    assert!(lines[0].contains("create"));
    assert!(lines[0].contains("pending"));
    assert!(lines[1].starts_with(&second));
    assert!(lines[1].contains("failed"));
    assert!(lines[1].contains("retries=1"));
    assert_eq!(lines[2], "  last error: rejected by remote: nope");
}

#[test]
fn json_lists_actions() {
    let queue = memory_queue();
    queue
        .enqueue(ActionKind::Update, "orders", payload(json!({"id": "O1"})))
        .unwrap();

    let value: serde_json::Value = serde_json::from_str(&render(&queue, OutputFormat::Json)).unwrap();
    let actions = value.as_array().unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0]["kind"], "update");
    assert_eq!(actions[0]["state"], "pending");
    assert_eq!(actions[0]["payload"]["id"], "O1");
}
