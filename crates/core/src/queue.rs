// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent mutation queue.
//!
//! Writes that cannot reach the remote service are recorded here as
//! [`PendingAction`]s in the `pending_actions` partition of the [`Store`].
//! The queue owns all retry bookkeeping: once an action has failed
//! `max_retries` times it is moved to the `dead_letters` partition, where it
//! stays inspectable until it is requeued or purged.

use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::action::{ActionId, ActionKind, ActionState, DeadLetter, Payload, PendingAction};
use crate::error::{Error, Result};
use crate::stamp::{ClockSource, StampClock, SystemClock};
use crate::store::{Partition, Store};

/// Default number of failed attempts before an action is dropped.
pub const MAX_RETRIES: u32 = 3;

/// What happened to an action after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// The action stays queued and will be retried.
    Retry { retry_count: u32 },
    /// The retry budget is spent; the action was moved to dead letters.
    Dropped { retry_count: u32 },
}

/// Queue of pending remote writes backed by the persistent store.
pub struct MutationQueue {
    store: Arc<Store>,
    stamps: StampClock<Arc<dyn ClockSource>>,
    max_retries: u32,
    /// Serializes read-modify-write transitions on single actions.
    write_lock: Mutex<()>,
}

impl MutationQueue {
    /// Opens the queue over `store` using the system clock.
    pub fn new(store: Arc<Store>) -> Result<Self> {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Opens the queue with a custom clock source.
    pub fn with_clock(store: Arc<Store>, clock: Arc<dyn ClockSource>) -> Result<Self> {
        let queue = MutationQueue {
            store,
            stamps: StampClock::with_clock(clock),
            max_retries: MAX_RETRIES,
            write_lock: Mutex::new(()),
        };

        // New stamps must sort after everything already queued
        if let Some(latest) = queue.all()?.iter().map(|a| a.enqueued_at).max() {
            queue.stamps.observe(latest);
        }

        Ok(queue)
    }

    /// Overrides the retry cap (minimum 1).
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records a new pending write and returns its id.
    ///
    /// Only touches local storage.
    pub fn enqueue(&self, kind: ActionKind, target: &str, payload: Payload) -> Result<ActionId> {
        let id = Uuid::new_v4().to_string();
        let action = PendingAction::new(id.clone(), kind, target, payload, self.stamps.now());
        action.validate()?;

        self.store.put(Partition::PendingActions, &id, &action)?;
        Ok(id)
    }

    /// Every queued action, in FIFO order, regardless of state.
    pub fn all(&self) -> Result<Vec<PendingAction>> {
        let mut actions: Vec<PendingAction> = self.store.get_all(Partition::PendingActions)?;
        actions.sort_by(|a, b| a.enqueued_at.cmp(&b.enqueued_at));
        Ok(actions)
    }

    /// Actions eligible for draining, in ascending enqueue order.
    ///
    /// In-flight actions are excluded.
    pub fn list_pending(&self) -> Result<Vec<PendingAction>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|a| !a.is_in_flight())
            .collect())
    }

    /// Number of queued actions, in flight or not.
    pub fn pending_count(&self) -> Result<usize> {
        self.store.count(Partition::PendingActions)
    }

    pub fn get(&self, id: &str) -> Result<Option<PendingAction>> {
        self.store.get(Partition::PendingActions, id)
    }

    fn require(&self, id: &str) -> Result<PendingAction> {
        self.get(id)?
            .ok_or_else(|| Error::ActionNotFound(id.to_string()))
    }

    /// Claims an action for the current drain cycle.
    pub fn mark_in_flight(&self, id: &str) -> Result<PendingAction> {
        let _guard = self.lock();
        let mut action = self.require(id)?;
        if action.is_in_flight() {
            return Err(Error::AlreadyInFlight(id.to_string()));
        }

        action.state = ActionState::InFlight;
        self.store.put(Partition::PendingActions, id, &action)?;
        Ok(action)
    }

    /// Records a failed attempt.
    ///
    /// When the retry count reaches the cap the action leaves the queue and
    /// is archived as a [`DeadLetter`].
    pub fn mark_failed(&self, id: &str, error: &str) -> Result<FailOutcome> {
        let _guard = self.lock();
        let mut action = self.require(id)?;

        action.retry_count = action.retry_count.saturating_add(1);
        action.last_error = Some(error.to_string());
        action.state = ActionState::Failed;
        let retry_count = action.retry_count;

        if retry_count >= self.max_retries {
            let letter = DeadLetter {
                action,
                dropped_at: self.stamps.wall(),
            };
            self.store
                .move_entry(Partition::PendingActions, Partition::DeadLetters, id, &letter)?;
            return Ok(FailOutcome::Dropped { retry_count });
        }

        self.store.put(Partition::PendingActions, id, &action)?;
        Ok(FailOutcome::Retry { retry_count })
    }

    /// Removes an action after it was applied remotely.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let _guard = self.lock();
        self.store.delete(Partition::PendingActions, id)
    }

    /// Hands a claimed action back to the queue without recording an
    /// attempt. Returns whether the action was in flight.
    pub fn release(&self, id: &str) -> Result<bool> {
        let _guard = self.lock();
        let Some(mut action) = self.get(id)? else {
            return Ok(false);
        };
        if !action.is_in_flight() {
            return Ok(false);
        }
        action.state = if action.retry_count == 0 {
            ActionState::Pending
        } else {
            ActionState::Failed
        };
        self.store.put(Partition::PendingActions, id, &action)?;
        Ok(true)
    }

    /// Returns actions stranded in flight (e.g. by a crash) to the queue.
    ///
    /// Only safe to call while no drain is running.
    pub fn recover_in_flight(&self) -> Result<usize> {
        let _guard = self.lock();
        let mut recovered = 0;
        for mut action in self.all()?.into_iter().filter(|a| a.is_in_flight()) {
            action.state = ActionState::Failed;
            self.store.put(Partition::PendingActions, &action.id, &action)?;
            recovered += 1;
        }
        Ok(recovered)
    }

    /// Dropped actions, oldest first.
    pub fn dead_letters(&self) -> Result<Vec<DeadLetter>> {
        let mut letters: Vec<DeadLetter> = self.store.get_all(Partition::DeadLetters)?;
        letters.sort_by(|a, b| a.dropped_at.cmp(&b.dropped_at));
        Ok(letters)
    }

    pub fn dead_letter_count(&self) -> Result<usize> {
        self.store.count(Partition::DeadLetters)
    }

    /// Puts a dead letter back at the end of the queue with a fresh budget.
    pub fn requeue_dead_letter(&self, id: &str) -> Result<ActionId> {
        let _guard = self.lock();
        let letter: DeadLetter = self
            .store
            .get(Partition::DeadLetters, id)?
            .ok_or_else(|| Error::ActionNotFound(id.to_string()))?;

        let mut action = letter.action;
        action.enqueued_at = self.stamps.now();
        action.state = ActionState::Pending;
        action.retry_count = 0;
        action.last_error = None;

        self.store
            .move_entry(Partition::DeadLetters, Partition::PendingActions, id, &action)?;
        Ok(action.id)
    }

    /// Deletes every dead letter. Returns how many were removed.
    pub fn purge_dead_letters(&self) -> Result<usize> {
        self.store.clear(Partition::DeadLetters)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
