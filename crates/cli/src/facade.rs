// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Offline-state facade.
//!
//! One read-only view of the engine for UI-style consumers: whether we are
//! online, how much work is queued, when the last drain finished and what
//! the orchestrator is doing. The view is published through a `watch`
//! channel, so slow readers only ever see the latest snapshot.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use ms_core::MutationQueue;

use crate::error::Result;
use crate::monitor::{ConnectionMonitor, ConnectionStatus};
use crate::observer::SubscriptionId;
use crate::orchestrator::{DrainOutcome, SyncOrchestrator, SyncStatus};

/// Default interval for re-reading the queue size while offline.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfflineSnapshot {
    pub is_online: bool,
    pub pending_actions_count: usize,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub sync_status: SyncStatus,
}

struct FacadeInner {
    queue: Arc<MutationQueue>,
    monitor: ConnectionMonitor,
    orchestrator: SyncOrchestrator,
    poll_interval: Duration,
    tx: watch::Sender<OfflineSnapshot>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
    cancel: CancellationToken,
}

/// Derived offline state. Holds nothing it cannot recompute.
#[derive(Clone)]
pub struct OfflineFacade {
    inner: Arc<FacadeInner>,
}

impl OfflineFacade {
    /// Builds the view from the current queue, monitor and orchestrator
    /// state. Fails if local storage cannot be read.
    pub fn new(
        queue: Arc<MutationQueue>,
        monitor: ConnectionMonitor,
        orchestrator: SyncOrchestrator,
        poll_interval: Duration,
    ) -> Result<Self> {
        let initial = OfflineSnapshot {
            is_online: monitor.is_connected(),
            pending_actions_count: queue.pending_count()?,
            last_sync_time: orchestrator.last_synced_at()?,
            sync_status: orchestrator.status(),
        };
        let (tx, _) = watch::channel(initial);

        Ok(OfflineFacade {
            inner: Arc::new(FacadeInner {
                queue,
                monitor,
                orchestrator,
                poll_interval,
                tx,
                subscriptions: Mutex::new(Vec::new()),
                cancel: CancellationToken::new(),
            }),
        })
    }

    pub fn snapshot(&self) -> OfflineSnapshot {
        self.inner.tx.borrow().clone()
    }

    /// Receiver that sees every change of the snapshot.
    pub fn subscribe(&self) -> watch::Receiver<OfflineSnapshot> {
        self.inner.tx.subscribe()
    }

    pub fn is_online(&self) -> bool {
        self.inner.tx.borrow().is_online
    }

    pub fn pending_actions_count(&self) -> usize {
        self.inner.tx.borrow().pending_actions_count
    }

    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        self.inner.tx.borrow().last_sync_time
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.inner.tx.borrow().sync_status
    }

    /// Forces a drain, then refreshes the view.
    pub async fn force_sync(&self) -> Result<DrainOutcome> {
        let outcome = self.inner.orchestrator.force_sync().await;
        self.refresh()?;
        outcome
    }

    /// Re-derives every field from its source.
    pub fn refresh(&self) -> Result<()> {
        let pending = self.inner.queue.pending_count()?;
        let last_sync = self.inner.orchestrator.last_synced_at()?;
        let online = self.inner.monitor.is_connected();
        let status = self.inner.orchestrator.status();
        self.update(|snap| {
            snap.is_online = online;
            snap.pending_actions_count = pending;
            snap.last_sync_time = last_sync;
            snap.sync_status = status;
        });
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut OfflineSnapshot)) {
        self.inner.tx.send_if_modified(|snap| {
            let before = snap.clone();
            apply(snap);
            *snap != before
        });
    }

    fn refresh_pending(&self) {
        match self.inner.queue.pending_count() {
            Ok(pending) => self.update(|snap| snap.pending_actions_count = pending),
            Err(e) => warn!(error = %e, "failed to read pending count"),
        }
    }

    fn on_sync_status(&self, status: SyncStatus) {
        let last_sync = match self.inner.orchestrator.last_synced_at() {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "failed to read last sync time");
                self.last_sync_time()
            }
        };
        let pending = self.inner.queue.pending_count().ok();
        self.update(|snap| {
            snap.sync_status = status;
            snap.last_sync_time = last_sync;
            if let Some(pending) = pending {
                snap.pending_actions_count = pending;
            }
        });
    }

    fn on_connection_status(&self, status: ConnectionStatus) {
        let online = status == ConnectionStatus::Connected;
        self.update(|snap| snap.is_online = online);
        self.refresh_pending();
    }

    /// Starts following orchestrator and monitor events, and polling the
    /// queue while offline.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let weak = Arc::downgrade(&self.inner);
        let status_sub = self.inner.orchestrator.on_status_change(move |status| {
            if let Some(facade) = upgrade(&weak) {
                facade.on_sync_status(*status);
            }
        });
        let weak = Arc::downgrade(&self.inner);
        let progress_sub = self.inner.orchestrator.on_progress(move |_| {
            if let Some(facade) = upgrade(&weak) {
                facade.refresh_pending();
            }
        });
        self.inner
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend([status_sub, progress_sub]);

        if let Err(e) = self.refresh() {
            warn!(error = %e, "initial facade refresh failed");
        }

        let weak = Arc::downgrade(&self.inner);
        let mut status_rx = self.inner.monitor.status_receiver();
        let cancel = self.inner.cancel.clone();
        let poll_interval = self.inner.poll_interval;

        tokio::spawn(async move {
            let mut online = *status_rx.borrow_and_update() == ConnectionStatus::Connected;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = status_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let status = *status_rx.borrow_and_update();
                        online = status == ConnectionStatus::Connected;
                        let Some(facade) = upgrade(&weak) else { break };
                        facade.on_connection_status(status);
                    }
                    _ = poll_tick(online, poll_interval) => {
                        let Some(facade) = upgrade(&weak) else { break };
                        facade.refresh_pending();
                    }
                }
            }
            debug!("facade stopped");
        });
    }

    /// Stops the background task and detaches from the orchestrator.
    pub fn dispose(&self) {
        self.inner.cancel.cancel();
        let subs: Vec<SubscriptionId> = self
            .inner
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for id in subs {
            self.inner.orchestrator.unsubscribe(id);
        }
    }
}

fn upgrade(weak: &Weak<FacadeInner>) -> Option<OfflineFacade> {
    weak.upgrade().map(|inner| OfflineFacade { inner })
}

/// Resolves after `interval` while offline, never while online.
async fn poll_tick(online: bool, interval: Duration) {
    if online {
        std::future::pending::<()>().await;
    } else {
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
#[path = "facade_tests.rs"]
mod tests;
