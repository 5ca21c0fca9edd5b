// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-subscriber callback lists.
//!
//! Every event stream in the engine (connection status, sync status,
//! progress, success, error) is an [`ObserverList`]: any number of
//! subscribers, each removable by the id returned from `subscribe`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Handle returned by `subscribe`, used to unsubscribe.
///
/// Unique across all lists in the process.
pub type SubscriptionId = u64;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub struct ObserverList<T> {
    observers: Mutex<Vec<(SubscriptionId, Callback<T>)>>,
}

impl<T> ObserverList<T> {
    pub fn new() -> Self {
        ObserverList {
            observers: Mutex::new(Vec::new()),
        }
    }

    fn observers(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Callback<T>)>> {
        self.observers.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionId {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        self.observers().push((id, Arc::new(callback)));
        id
    }

    /// Returns whether the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers();
        let before = observers.len();
        observers.retain(|(sid, _)| *sid != id);
        observers.len() != before
    }

    /// Calls every subscriber in subscription order.
    ///
    /// The list lock is released before the callbacks run, so a callback may
    /// subscribe or unsubscribe.
    pub fn notify(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = self
            .observers()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(value);
        }
    }

    pub fn len(&self) -> usize {
        self.observers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for ObserverList<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "observer_tests.rs"]
mod tests;
