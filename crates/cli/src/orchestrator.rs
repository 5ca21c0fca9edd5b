// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync orchestrator.
//!
//! Drains the mutation queue against the remote tables. At most one drain
//! runs at a time ([`DrainGate`]); a request that finds a drain in progress
//! returns [`DrainOutcome::AlreadyRunning`] without doing anything.
//!
//! Drains start on demand (`force_sync`), whenever the connection monitor
//! reports an online edge, and when a [`SyncTrigger`] fires while online.
//! Triggers and online edges that arrive while a drain runs are dropped.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ms_core::{
    ActionId, ActionKind, EnqueueStamp, FailOutcome, MutationQueue, Partition, Payload,
    PendingAction, Store,
};

use crate::error::{Error, Result};
use crate::monitor::ConnectionMonitor;
use crate::observer::{ObserverList, SubscriptionId};
use crate::remote::{RemoteError, RemoteTables};

/// Key of the last successful drain time in the `sync_meta` partition.
pub const LAST_SYNCED_AT_KEY: &str = "last_synced_at";

/// Default deadline for one remote call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Idle,
    Syncing,
    Success,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Drain progress, reported after every action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
}

/// Summary of one drain cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrainReport {
    pub total: usize,
    pub applied: usize,
    /// Failed attempts in this cycle, dropped actions included.
    pub failed: usize,
    /// Actions moved to dead letters in this cycle.
    pub dropped: Vec<ActionId>,
    pub finished_at: DateTime<Utc>,
}

impl DrainReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Payload of the `on_error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    pub failed: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrainOutcome {
    Completed(DrainReport),
    /// Another drain held the gate; nothing was done.
    AlreadyRunning,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Written straight to the remote.
    Applied { remote_id: Option<String> },
    /// Recorded in the queue for a later drain.
    Queued(ActionId),
}

/// What happened to one claimed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settled {
    Applied,
    Retry,
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainPhase {
    Idle,
    Draining,
}

/// Single-flight guard for drain cycles.
pub struct DrainGate {
    lock: tokio::sync::Mutex<()>,
    phase: Mutex<DrainPhase>,
}

/// Proof of holding the [`DrainGate`]. Releases it on drop.
pub struct DrainPermit<'a> {
    gate: &'a DrainGate,
    _guard: tokio::sync::MutexGuard<'a, ()>,
}

impl DrainGate {
    pub fn new() -> Self {
        DrainGate {
            lock: tokio::sync::Mutex::new(()),
            phase: Mutex::new(DrainPhase::Idle),
        }
    }

    fn set_phase(&self, phase: DrainPhase) {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner()) = phase;
    }

    pub fn phase(&self) -> DrainPhase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claims the gate, or returns `None` if a drain is in progress.
    pub fn try_enter(&self) -> Option<DrainPermit<'_>> {
        let guard = self.lock.try_lock().ok()?;
        self.set_phase(DrainPhase::Draining);
        Some(DrainPermit {
            gate: self,
            _guard: guard,
        })
    }
}

impl Default for DrainGate {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DrainPermit<'_> {
    fn drop(&mut self) {
        self.gate.set_phase(DrainPhase::Idle);
    }
}

/// Handle for asking the orchestrator to drain, e.g. from a background
/// worker. Requests made while one is already waiting are coalesced.
///
/// A request made while a drain is running is dropped, not saved for later.
#[derive(Clone)]
pub struct SyncTrigger {
    tx: mpsc::Sender<()>,
    gate: Arc<DrainGate>,
}

impl SyncTrigger {
    /// Returns `false` if a drain is running or a request was already
    /// waiting.
    pub fn trigger(&self) -> bool {
        if self.gate.phase() == DrainPhase::Draining {
            debug!("sync trigger dropped during drain");
            return false;
        }
        self.tx.try_send(()).is_ok()
    }
}

struct OrchestratorInner {
    queue: Arc<MutationQueue>,
    remote: Arc<dyn RemoteTables>,
    monitor: ConnectionMonitor,
    call_timeout: Duration,
    gate: Arc<DrainGate>,
    status: Mutex<SyncStatus>,
    status_tx: watch::Sender<SyncStatus>,
    status_observers: ObserverList<SyncStatus>,
    progress_observers: ObserverList<Progress>,
    success_observers: ObserverList<DrainReport>,
    error_observers: ObserverList<SyncFailure>,
    trigger_tx: mpsc::Sender<()>,
    trigger_rx: Mutex<Option<mpsc::Receiver<()>>>,
    cancel: CancellationToken,
}

/// Serializes queue drains and reports their status.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Arc<OrchestratorInner>,
}

impl SyncOrchestrator {
    pub fn new(
        queue: Arc<MutationQueue>,
        remote: Arc<dyn RemoteTables>,
        monitor: ConnectionMonitor,
        call_timeout: Duration,
    ) -> Self {
        let (status_tx, _) = watch::channel(SyncStatus::Idle);
        let (trigger_tx, trigger_rx) = mpsc::channel(1);

        SyncOrchestrator {
            inner: Arc::new(OrchestratorInner {
                queue,
                remote,
                monitor,
                call_timeout,
                gate: Arc::new(DrainGate::new()),
                status: Mutex::new(SyncStatus::Idle),
                status_tx,
                status_observers: ObserverList::new(),
                progress_observers: ObserverList::new(),
                success_observers: ObserverList::new(),
                error_observers: ObserverList::new(),
                trigger_tx,
                trigger_rx: Mutex::new(Some(trigger_rx)),
                cancel: CancellationToken::new(),
            }),
        }
    }

    fn store(&self) -> &Arc<Store> {
        self.inner.queue.store()
    }

    fn status_lock(&self) -> MutexGuard<'_, SyncStatus> {
        self.inner.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn status(&self) -> SyncStatus {
        *self.status_lock()
    }

    pub fn status_receiver(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn phase(&self) -> DrainPhase {
        self.inner.gate.phase()
    }

    pub fn is_syncing(&self) -> bool {
        self.phase() == DrainPhase::Draining
    }

    pub fn trigger(&self) -> SyncTrigger {
        SyncTrigger {
            tx: self.inner.trigger_tx.clone(),
            gate: Arc::clone(&self.inner.gate),
        }
    }

    /// When the last drain cycle finished, if ever.
    pub fn last_synced_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.store().get(Partition::SyncMeta, LAST_SYNCED_AT_KEY)?)
    }

    pub fn on_status_change(
        &self,
        callback: impl Fn(&SyncStatus) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.inner.status_observers.subscribe(callback)
    }

    pub fn on_progress(&self, callback: impl Fn(&Progress) + Send + Sync + 'static) -> SubscriptionId {
        self.inner.progress_observers.subscribe(callback)
    }

    pub fn on_success(
        &self,
        callback: impl Fn(&DrainReport) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.inner.success_observers.subscribe(callback)
    }

    pub fn on_error(&self, callback: impl Fn(&SyncFailure) + Send + Sync + 'static) -> SubscriptionId {
        self.inner.error_observers.subscribe(callback)
    }

    /// Removes a subscription made with any of the `on_*` methods.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.status_observers.unsubscribe(id)
            || self.inner.progress_observers.unsubscribe(id)
            || self.inner.success_observers.unsubscribe(id)
            || self.inner.error_observers.unsubscribe(id)
    }

    // Observers run after the lock is released, so they may read the
    // orchestrator. Only the drain holding the gate changes the status.
    fn set_status(&self, next: SyncStatus) {
        {
            let mut status = self.status_lock();
            if *status == next {
                return;
            }
            debug!(from = %*status, to = %next, "sync status changed");
            *status = next;
        }
        self.inner.status_observers.notify(&next);
        self.inner.status_tx.send_replace(next);
    }

    /// Drains now. Fails with [`Error::Offline`] unless connected.
    pub async fn force_sync(&self) -> Result<DrainOutcome> {
        if !self.inner.monitor.is_connected() {
            return Err(Error::Offline);
        }
        self.drain().await
    }

    /// Runs one drain cycle unless one is already running.
    pub async fn drain(&self) -> Result<DrainOutcome> {
        let Some(_permit) = self.inner.gate.try_enter() else {
            debug!("drain already running");
            return Ok(DrainOutcome::AlreadyRunning);
        };

        match self.run_cycle().await {
            Ok(report) => Ok(DrainOutcome::Completed(report)),
            Err(e) => {
                warn!(error = %e, "drain aborted");
                self.set_status(SyncStatus::Error);
                Err(e)
            }
        }
    }

    async fn run_cycle(&self) -> Result<DrainReport> {
        let pending = self.inner.queue.list_pending()?;
        let total = pending.len();
        self.set_status(SyncStatus::Syncing);
        info!(total, "drain started");

        let mut applied = 0;
        let mut failed = 0;
        let mut dropped = Vec::new();

        for (index, action) in pending.into_iter().enumerate() {
            let action = match self.inner.queue.mark_in_flight(&action.id) {
                Ok(action) => action,
                // Removed or claimed since listing
                Err(ms_core::Error::ActionNotFound(_)) | Err(ms_core::Error::AlreadyInFlight(_)) => {
                    debug!(action_id = %action.id, "skipping action");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let outcome = match self.settle(&action).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.release(&action.id);
                    return Err(e);
                }
            };
            match outcome {
                Settled::Applied => applied += 1,
                Settled::Retry => failed += 1,
                Settled::Dropped => {
                    failed += 1;
                    dropped.push(action.id.clone());
                }
            }

            self.inner.progress_observers.notify(&Progress {
                current: index + 1,
                total,
            });
        }

        let finished_at = Utc::now();
        self.store()
            .put(Partition::SyncMeta, LAST_SYNCED_AT_KEY, &finished_at)?;

        let report = DrainReport {
            total,
            applied,
            failed,
            dropped,
            finished_at,
        };
        info!(
            applied = report.applied,
            failed = report.failed,
            dropped = report.dropped.len(),
            "drain finished"
        );

        if report.is_success() {
            self.set_status(SyncStatus::Success);
            self.inner.success_observers.notify(&report);
        } else {
            self.set_status(SyncStatus::Error);
            self.inner.error_observers.notify(&SyncFailure {
                failed: report.failed,
                dropped: report.dropped.len(),
            });
        }

        Ok(report)
    }

    /// Applies a claimed action and records the result in the queue.
    ///
    /// An error here is local; the caller hands the action back.
    async fn settle(&self, action: &PendingAction) -> Result<Settled> {
        match self.apply(action).await? {
            Ok(()) => {
                self.inner.queue.remove(&action.id)?;
                debug!(
                    action_id = %action.id,
                    kind = %action.kind,
                    table = %action.target,
                    "action applied"
                );
                Ok(Settled::Applied)
            }
            Err(remote_err) => {
                let err = Error::ActionApply {
                    action_id: action.id.clone(),
                    reason: remote_err.to_string(),
                };
                warn!(error = %err, "action failed");

                match self.inner.queue.mark_failed(&action.id, &remote_err.to_string())? {
                    FailOutcome::Retry { retry_count } => {
                        debug!(action_id = %action.id, retry_count, "action will be retried");
                        Ok(Settled::Retry)
                    }
                    FailOutcome::Dropped { retry_count } => {
                        let err = Error::MaxRetriesExceeded {
                            action_id: action.id.clone(),
                            retries: retry_count,
                        };
                        warn!(error = %err, "action dropped");
                        Ok(Settled::Dropped)
                    }
                }
            }
        }
    }

    fn release(&self, action_id: &str) {
        match self.inner.queue.release(action_id) {
            Ok(true) => debug!(action_id, "claimed action released"),
            Ok(false) => {}
            Err(e) => warn!(action_id, error = %e, "failed to release claimed action"),
        }
    }

    /// Dispatches one action. The outer result is a local storage failure,
    /// the inner one the remote outcome.
    async fn apply(&self, action: &PendingAction) -> Result<std::result::Result<(), RemoteError>> {
        let local_id = action.remote_id();
        let remote_id = match &local_id {
            Some(id) => Some(self.resolve_id(id)?),
            None => None,
        };

        let outcome = self
            .dispatch(action.kind, &action.target, action, remote_id.as_deref())
            .await;

        match outcome {
            Ok(assigned) => {
                self.record_id(action.kind, local_id.as_deref(), assigned.as_deref())?;
                Ok(Ok(()))
            }
            Err(e) => Ok(Err(e)),
        }
    }

    /// Sends one write, bounded by the call timeout.
    async fn dispatch(
        &self,
        kind: ActionKind,
        target: &str,
        action: &PendingAction,
        remote_id: Option<&str>,
    ) -> std::result::Result<Option<String>, RemoteError> {
        let remote = &self.inner.remote;
        let call = async {
            match (kind, remote_id) {
                (ActionKind::Create, _) => remote.insert(target, action.payload.clone()).await,
                (ActionKind::Update, Some(id)) => {
                    remote.update_by_id(target, id, action.patch()).await?;
                    Ok(None)
                }
                (ActionKind::Delete, Some(id)) => {
                    remote.delete_by_id(target, id).await?;
                    Ok(None)
                }
                (_, None) => Err(RemoteError::Rejected(format!(
                    "{kind} on '{target}' has no record id"
                ))),
            }
        };

        match tokio::time::timeout(self.inner.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(self.inner.call_timeout)),
        }
    }

    /// Maps a client-side id to the id the remote assigned, if any.
    fn resolve_id(&self, local_id: &str) -> Result<String> {
        let mapped: Option<String> = self.store().get(Partition::IdMap, local_id)?;
        Ok(mapped.unwrap_or_else(|| local_id.to_string()))
    }

    fn record_id(&self, kind: ActionKind, local_id: Option<&str>, assigned: Option<&str>) -> Result<()> {
        match (kind, local_id, assigned) {
            (ActionKind::Create, Some(local), Some(remote)) if local != remote => {
                debug!(local, remote, "recording remote id");
                self.store().put(Partition::IdMap, local, remote)?;
            }
            (ActionKind::Delete, Some(local), _) => {
                self.store().delete(Partition::IdMap, local)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Writes straight to the remote when connected and nothing is queued;
    /// otherwise, or if the direct write fails, queues the write.
    pub async fn submit(&self, kind: ActionKind, target: &str, payload: Payload) -> Result<SubmitOutcome> {
        let draft = PendingAction::new(String::new(), kind, target, payload, EnqueueStamp::min());
        draft.validate()?;

        // Direct writes may not overtake queued ones
        if self.inner.monitor.is_connected() && self.inner.queue.pending_count()? == 0 {
            let local_id = draft.remote_id();
            let remote_id = match &local_id {
                Some(id) => Some(self.resolve_id(id)?),
                None => None,
            };

            match self.dispatch(kind, target, &draft, remote_id.as_deref()).await {
                Ok(assigned) => {
                    self.record_id(kind, local_id.as_deref(), assigned.as_deref())?;
                    return Ok(SubmitOutcome::Applied {
                        remote_id: assigned.or(remote_id),
                    });
                }
                Err(e) => warn!(error = %e, %kind, table = target, "direct write failed, queueing"),
            }
        }

        let id = self.inner.queue.enqueue(kind, target, draft.payload)?;
        Ok(SubmitOutcome::Queued(id))
    }

    /// Starts draining automatically on online edges and triggers.
    ///
    /// Must be called from within a tokio runtime. Later calls are no-ops.
    pub fn start(&self) {
        let trigger_rx = self
            .inner
            .trigger_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(mut trigger_rx) = trigger_rx else {
            debug!("auto sync already started");
            return;
        };

        let orchestrator = self.clone();
        let mut online_rx = self.inner.monitor.online_receiver();
        let cancel = self.inner.cancel.clone();

        tokio::spawn(async move {
            if *online_rx.borrow_and_update() {
                orchestrator.auto_drain("online").await;
                discard_requests(&mut online_rx, &mut trigger_rx);
            }

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = online_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let online = *online_rx.borrow_and_update();
                        if online {
                            orchestrator.auto_drain("online").await;
                            discard_requests(&mut online_rx, &mut trigger_rx);
                        }
                    }
                    msg = trigger_rx.recv() => {
                        if msg.is_none() {
                            break;
                        }
                        if orchestrator.inner.monitor.is_connected() {
                            orchestrator.auto_drain("trigger").await;
                            discard_requests(&mut online_rx, &mut trigger_rx);
                        } else {
                            debug!("sync trigger ignored while offline");
                        }
                    }
                }
            }
            debug!("auto sync stopped");
        });
    }

    async fn auto_drain(&self, reason: &str) {
        debug!(reason, "auto sync");
        if let Err(e) = self.drain().await {
            warn!(error = %e, reason, "auto sync failed");
        }
    }

    /// Stops automatic draining. A drain in progress runs to completion.
    pub fn dispose(&self) {
        self.inner.cancel.cancel();
    }
}

/// Marks requests that arrived during a drain as handled; the drain already
/// covered them.
fn discard_requests(online_rx: &mut watch::Receiver<bool>, trigger_rx: &mut mpsc::Receiver<()>) {
    online_rx.borrow_and_update();
    while trigger_rx.try_recv().is_ok() {}
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
