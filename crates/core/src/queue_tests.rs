// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::stamp::ManualClock;
use serde_json::{json, Value};
use tempfile::tempdir;
use yare::parameterized;

fn payload(value: Value) -> Payload {
    value.as_object().cloned().unwrap()
}

fn memory_queue() -> MutationQueue {
    MutationQueue::new(Arc::new(Store::open_in_memory().unwrap())).unwrap()
}

/// Queue whose clock never moves, so ordering rests on the counter alone.
fn frozen_queue() -> MutationQueue {
    let store = Arc::new(Store::open_in_memory().unwrap());
    MutationQueue::with_clock(store, Arc::new(ManualClock::new(1_000))).unwrap()
}

#[test]
fn enqueue_creates_pending_action() {
    let queue = memory_queue();
    let id = queue
        .enqueue(ActionKind::Create, "orders", payload(json!({"sku": "A"})))
        .unwrap();

    let action = queue.get(&id).unwrap().unwrap();
    assert_eq!(action.state, ActionState::Pending);
    assert_eq!(action.retry_count, 0);
    assert_eq!(action.target, "orders");
    assert_eq!(queue.pending_count().unwrap(), 1);
}

#[test]
fn enqueue_ids_are_unique_uuids() {
    let queue = memory_queue();
    let a = queue
        .enqueue(ActionKind::Create, "orders", Payload::new())
        .unwrap();
    let b = queue
        .enqueue(ActionKind::Create, "orders", Payload::new())
        .unwrap();

    assert_ne!(a, b);
    assert!(Uuid::parse_str(&a).is_ok());
}

#[parameterized(
    update_without_id = { ActionKind::Update, "orders", json!({"status": "x"}) },
    delete_without_id = { ActionKind::Delete, "orders", json!({}) },
    blank_target = { ActionKind::Create, "", json!({"sku": "A"}) },
)]
fn enqueue_rejects_invalid(kind: ActionKind, target: &str, body: Value) {
    let queue = memory_queue();
    let err = queue.enqueue(kind, target, payload(body)).unwrap_err();
    assert!(matches!(err, Error::InvalidAction(_)));
    assert_eq!(queue.pending_count().unwrap(), 0);
}

#[test]
fn list_pending_is_fifo_within_one_millisecond() {
    let queue = frozen_queue();
    let ids: Vec<_> = (0..5)
        .map(|i| {
            queue
                .enqueue(ActionKind::Create, "orders", payload(json!({"n": i})))
                .unwrap()
        })
        .collect();

    let listed: Vec<_> = queue
        .list_pending()
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(listed, ids);
}

#[test]
fn list_pending_excludes_in_flight() {
    let queue = memory_queue();
    let a = queue
        .enqueue(ActionKind::Create, "orders", Payload::new())
        .unwrap();
    let b = queue
        .enqueue(ActionKind::Create, "orders", Payload::new())
        .unwrap();

    queue.mark_in_flight(&a).unwrap();

    let listed: Vec<_> = queue
        .list_pending()
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(listed, vec![b]);
    // In-flight actions still count as pending work
    assert_eq!(queue.pending_count().unwrap(), 2);
}

#[test]
fn mark_in_flight_twice_fails() {
    let queue = memory_queue();
    let id = queue
        .enqueue(ActionKind::Create, "orders", Payload::new())
        .unwrap();

    queue.mark_in_flight(&id).unwrap();
    let err = queue.mark_in_flight(&id).unwrap_err();
    assert!(matches!(err, Error::AlreadyInFlight(_)));
}

#[test]
fn unknown_ids_are_not_found() {
    let queue = memory_queue();
    assert!(matches!(
        queue.mark_in_flight("missing"),
        Err(Error::ActionNotFound(_))
    ));
    assert!(matches!(
        queue.mark_failed("missing", "boom"),
        Err(Error::ActionNotFound(_))
    ));
    assert!(matches!(
        queue.requeue_dead_letter("missing"),
        Err(Error::ActionNotFound(_))
    ));
    assert!(!queue.remove("missing").unwrap());
}

#[test]
fn mark_failed_records_error_and_retries() {
    let queue = memory_queue();
    let id = queue
        .enqueue(ActionKind::Create, "orders", Payload::new())
        .unwrap();
    queue.mark_in_flight(&id).unwrap();

    let outcome = queue.mark_failed(&id, "rejected").unwrap();
    assert_eq!(outcome, FailOutcome::Retry { retry_count: 1 });

    let action = queue.get(&id).unwrap().unwrap();
    assert_eq!(action.state, ActionState::Failed);
    assert_eq!(action.last_error.as_deref(), Some("rejected"));
    // Failed actions are eligible again
    assert_eq!(queue.list_pending().unwrap().len(), 1);
}

#[test]
fn third_failure_moves_action_to_dead_letters() {
    let queue = memory_queue();
    let id = queue
        .enqueue(ActionKind::Create, "orders", Payload::new())
        .unwrap();

    assert_eq!(
        queue.mark_failed(&id, "e1").unwrap(),
        FailOutcome::Retry { retry_count: 1 }
    );
    assert_eq!(
        queue.mark_failed(&id, "e2").unwrap(),
        FailOutcome::Retry { retry_count: 2 }
    );
    assert_eq!(
        queue.mark_failed(&id, "e3").unwrap(),
        FailOutcome::Dropped { retry_count: 3 }
    );

    assert!(queue.list_pending().unwrap().is_empty());
    assert_eq!(queue.pending_count().unwrap(), 0);

    let letters = queue.dead_letters().unwrap();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].action.id, id);
    assert_eq!(letters[0].action.retry_count, 3);
    assert_eq!(letters[0].action.last_error.as_deref(), Some("e3"));
}

#[test]
fn custom_retry_cap() {
    let queue = memory_queue().with_max_retries(1);
    let id = queue
        .enqueue(ActionKind::Create, "orders", Payload::new())
        .unwrap();
    assert_eq!(
        queue.mark_failed(&id, "nope").unwrap(),
        FailOutcome::Dropped { retry_count: 1 }
    );
}

#[test]
fn retry_cap_has_floor_of_one() {
    assert_eq!(memory_queue().with_max_retries(0).max_retries(), 1);
}

#[test]
fn remove_deletes_action() {
    let queue = memory_queue();
    let id = queue
        .enqueue(ActionKind::Create, "orders", Payload::new())
        .unwrap();
    assert!(queue.remove(&id).unwrap());
    assert!(queue.get(&id).unwrap().is_none());
}

#[test]
fn recover_in_flight_resets_stranded_actions() {
    let queue = memory_queue();
    let a = queue
        .enqueue(ActionKind::Create, "orders", Payload::new())
        .unwrap();
    let _b = queue
        .enqueue(ActionKind::Create, "orders", Payload::new())
        .unwrap();
    queue.mark_in_flight(&a).unwrap();

    assert_eq!(queue.recover_in_flight().unwrap(), 1);
    assert_eq!(queue.list_pending().unwrap().len(), 2);
    assert_eq!(queue.get(&a).unwrap().unwrap().state, ActionState::Failed);
    assert_eq!(queue.recover_in_flight().unwrap(), 0);
}

#[test]
fn requeue_dead_letter_goes_to_the_back() {
    let queue = memory_queue().with_max_retries(1);
    let dropped = queue
        .enqueue(ActionKind::Create, "orders", Payload::new())
        .unwrap();
    queue.mark_failed(&dropped, "boom").unwrap();
    let later = queue
        .enqueue(ActionKind::Create, "orders", Payload::new())
        .unwrap();

    let id = queue.requeue_dead_letter(&dropped).unwrap();
    assert_eq!(id, dropped);
    assert_eq!(queue.dead_letter_count().unwrap(), 0);

    let pending = queue.list_pending().unwrap();
    let order: Vec<_> = pending.iter().map(|a| a.id.clone()).collect();
    assert_eq!(order, vec![later, dropped]);
    assert_eq!(pending[1].retry_count, 0);
    assert_eq!(pending[1].state, ActionState::Pending);
    assert!(pending[1].last_error.is_none());
}

#[test]
fn purge_dead_letters_counts() {
    let queue = memory_queue().with_max_retries(1);
    for _ in 0..2 {
        let id = queue
            .enqueue(ActionKind::Create, "orders", Payload::new())
            .unwrap();
        queue.mark_failed(&id, "x").unwrap();
    }

    assert_eq!(queue.purge_dead_letters().unwrap(), 2);
    assert!(queue.dead_letters().unwrap().is_empty());
}

#[test]
fn reopened_queue_keeps_fifo_with_lagging_clock() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.db");

    let first = {
        let store = Arc::new(Store::open(&path).unwrap());
        let queue =
            MutationQueue::with_clock(store, Arc::new(ManualClock::new(50_000))).unwrap();
        queue
            .enqueue(ActionKind::Create, "orders", Payload::new())
            .unwrap()
    };

    // Wall clock went backwards between runs
    let store = Arc::new(Store::open(&path).unwrap());
    let queue = MutationQueue::with_clock(store, Arc::new(ManualClock::new(10))).unwrap();
    let second = queue
        .enqueue(ActionKind::Create, "orders", Payload::new())
        .unwrap();

    let order: Vec<_> = queue
        .list_pending()
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(order, vec![first, second]);
}

#[test]
fn dropped_action_leaves_pending_partition() {
    let queue = memory_queue().with_max_retries(1);
    let id = queue
        .enqueue(ActionKind::Delete, "carts", payload(json!({"id": "C1"})))
        .unwrap();

    queue.mark_failed(&id, "gone").unwrap();

    let store = queue.store();
    assert_eq!(store.count(Partition::PendingActions).unwrap(), 0);
    assert_eq!(store.count(Partition::DeadLetters).unwrap(), 1);

    queue.requeue_dead_letter(&id).unwrap();
    assert_eq!(store.count(Partition::PendingActions).unwrap(), 1);
    assert_eq!(store.count(Partition::DeadLetters).unwrap(), 0);
}

#[parameterized(
    fresh = { 0, ActionState::Pending },
    retried = { 1, ActionState::Failed },
)]
fn release_returns_claimed_action(failures: u32, expected: ActionState) {
    let queue = memory_queue();
    let id = queue
        .enqueue(ActionKind::Create, "orders", Payload::new())
        .unwrap();
    for n in 0..failures {
        queue.mark_failed(&id, &format!("e{n}")).unwrap();
    }
    queue.mark_in_flight(&id).unwrap();
    assert!(queue.list_pending().unwrap().is_empty());

    assert!(queue.release(&id).unwrap());

    let action = queue.get(&id).unwrap().unwrap();
    assert_eq!(action.state, expected);
    assert_eq!(action.retry_count, failures);
    assert_eq!(queue.list_pending().unwrap().len(), 1);
}

#[test]
fn release_ignores_unclaimed_and_missing_actions() {
    let queue = memory_queue();
    let id = queue
        .enqueue(ActionKind::Create, "orders", Payload::new())
        .unwrap();
    assert!(!queue.release(&id).unwrap());
    assert!(!queue.release("missing").unwrap());
    assert_eq!(queue.get(&id).unwrap().unwrap().state, ActionState::Pending);
}
