// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory remote and channel doubles shared by unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ms_core::{MutationQueue, Payload, Store};
use serde_json::Value;
use tokio::time::Instant;

use crate::remote::{
    ChannelEvent, RealtimeChannel, RemoteError, RemoteFuture, RemoteResult, RemoteTables,
};

/// A call received by [`MockRemote`].
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Insert { table: String, document: Payload },
    Update { table: String, id: String, patch: Payload },
    Delete { table: String, id: String },
}

/// Remote tables that record every call.
#[derive(Default)]
pub struct MockRemote {
    calls: Mutex<Vec<RemoteCall>>,
    rejected_tables: Mutex<HashSet<String>>,
    failures: Mutex<VecDeque<RemoteError>>,
    delay: Mutex<Option<Duration>>,
    assign_ids: Mutex<bool>,
    next_id: AtomicU64,
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(MockRemote::default())
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Every write to `table` is rejected.
    pub fn reject_table(&self, table: &str) {
        self.rejected_tables.lock().unwrap().insert(table.to_string());
    }

    /// The next call fails with `err`.
    pub fn fail_next(&self, err: RemoteError) {
        self.failures.lock().unwrap().push_back(err);
    }

    /// Every call sleeps this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Inserts answer with server ids `srv-1`, `srv-2`, ...
    pub fn assign_ids(&self) {
        *self.assign_ids.lock().unwrap() = true;
    }

    async fn answer(&self, call: RemoteCall) -> RemoteResult<Option<String>> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let table = match &call {
            RemoteCall::Insert { table, .. }
            | RemoteCall::Update { table, .. }
            | RemoteCall::Delete { table, .. } => table.clone(),
        };
        let is_insert = matches!(call, RemoteCall::Insert { .. });
        self.calls.lock().unwrap().push(call);

        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        if self.rejected_tables.lock().unwrap().contains(&table) {
            return Err(RemoteError::Rejected(format!("{table} is read-only")));
        }
        if is_insert && *self.assign_ids.lock().unwrap() {
            let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
            return Ok(Some(format!("srv-{n}")));
        }
        Ok(None)
    }
}

impl RemoteTables for MockRemote {
    fn insert<'a>(
        &'a self,
        table: &'a str,
        document: Payload,
    ) -> RemoteFuture<'a, RemoteResult<Option<String>>> {
        Box::pin(self.answer(RemoteCall::Insert {
            table: table.to_string(),
            document,
        }))
    }

    fn update_by_id<'a>(
        &'a self,
        table: &'a str,
        id: &'a str,
        patch: Payload,
    ) -> RemoteFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            self.answer(RemoteCall::Update {
                table: table.to_string(),
                id: id.to_string(),
                patch,
            })
            .await
            .map(|_| ())
        })
    }

    fn delete_by_id<'a>(&'a self, table: &'a str, id: &'a str) -> RemoteFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            self.answer(RemoteCall::Delete {
                table: table.to_string(),
                id: id.to_string(),
            })
            .await
            .map(|_| ())
        })
    }
}

/// Realtime channel answering from a script, then with a fallback.
pub struct MockChannel {
    script: Mutex<VecDeque<ChannelEvent>>,
    fallback: Mutex<ChannelEvent>,
    attempts: Mutex<Vec<Instant>>,
}

impl MockChannel {
    /// A channel that always answers `fallback`.
    pub fn new(fallback: ChannelEvent) -> Arc<Self> {
        Arc::new(MockChannel {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            attempts: Mutex::new(Vec::new()),
        })
    }

    pub fn healthy() -> Arc<Self> {
        Self::new(ChannelEvent::Subscribed)
    }

    /// Answers the next subscriptions with `events`, in order.
    pub fn script(&self, events: impl IntoIterator<Item = ChannelEvent>) {
        self.script.lock().unwrap().extend(events);
    }

    pub fn set_fallback(&self, event: ChannelEvent) {
        *self.fallback.lock().unwrap() = event;
    }

    /// When each subscription attempt was made.
    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }
}

impl RealtimeChannel for MockChannel {
    fn subscribe(&self) -> RemoteFuture<'_, ChannelEvent> {
        Box::pin(async move {
            self.attempts.lock().unwrap().push(Instant::now());
            let scripted = self.script.lock().unwrap().pop_front();
            scripted.unwrap_or_else(|| self.fallback.lock().unwrap().clone())
        })
    }
}

pub fn payload(value: Value) -> Payload {
    value.as_object().cloned().unwrap()
}

pub fn memory_queue() -> Arc<MutationQueue> {
    let store = Arc::new(Store::open_in_memory().unwrap());
    Arc::new(MutationQueue::new(store).unwrap())
}

/// Lets spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
