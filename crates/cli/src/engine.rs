// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The sync engine service.
//!
//! Wires store, queue, cache, connection monitor, orchestrator and facade
//! together over injected remote and channel implementations. Every engine
//! is independent; there is no process-wide instance.
//!
//! ```rust,ignore
//! let engine = SyncEngine::new(EngineConfig::default(), store, remote.clone(), remote)?;
//! engine.start()?;
//! engine.set_authenticated(true);
//! engine.set_network_online(true);
//! engine.enqueue(ActionKind::Update, "orders", payload)?;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use ms_core::{
    ActionId, ActionKind, EntityCache, MutationQueue, Payload, SharedStore, Store, MAX_RETRIES,
};

use crate::error::Result;
use crate::facade::{OfflineFacade, DEFAULT_POLL_INTERVAL};
use crate::monitor::{ConnectionMonitor, ReconnectPolicy};
use crate::orchestrator::{
    DrainOutcome, SubmitOutcome, SyncOrchestrator, SyncTrigger, DEFAULT_CALL_TIMEOUT,
};
use crate::remote::{RealtimeChannel, RemoteTables};

/// Tunables for one engine instance.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub reconnect: ReconnectPolicy,
    pub max_retries: u32,
    pub cache_ttl: chrono::Duration,
    pub call_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            reconnect: ReconnectPolicy::default(),
            max_retries: MAX_RETRIES,
            cache_ttl: chrono::Duration::seconds(ms_core::cache::DEFAULT_TTL_SECS),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

pub struct SyncEngine {
    store: Arc<Store>,
    queue: Arc<MutationQueue>,
    cache: Arc<EntityCache>,
    monitor: ConnectionMonitor,
    orchestrator: SyncOrchestrator,
    facade: OfflineFacade,
    started: AtomicBool,
}

impl SyncEngine {
    pub fn new(
        config: EngineConfig,
        store: Arc<Store>,
        remote: Arc<dyn RemoteTables>,
        channel: Arc<dyn RealtimeChannel>,
    ) -> Result<Self> {
        let queue = Arc::new(
            MutationQueue::new(Arc::clone(&store))?.with_max_retries(config.max_retries),
        );
        let cache = Arc::new(EntityCache::new(Arc::clone(&store)).with_ttl(config.cache_ttl));
        let monitor = ConnectionMonitor::new(channel, config.reconnect);
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&queue),
            remote,
            monitor.clone(),
            config.call_timeout,
        );
        let facade = OfflineFacade::new(
            Arc::clone(&queue),
            monitor.clone(),
            orchestrator.clone(),
            config.poll_interval,
        )?;

        Ok(SyncEngine {
            store,
            queue,
            cache,
            monitor,
            orchestrator,
            facade,
            started: AtomicBool::new(false),
        })
    }

    /// Builds an engine over a lazily opened store.
    pub async fn open(
        config: EngineConfig,
        store: &SharedStore,
        remote: Arc<dyn RemoteTables>,
        channel: Arc<dyn RealtimeChannel>,
    ) -> Result<Self> {
        let store = store.get().await?;
        Self::new(config, store, remote, channel)
    }

    /// Recovers actions left in flight by a previous process, then starts
    /// the monitor, auto sync and the facade.
    ///
    /// Must be called from within a tokio runtime. Later calls are no-ops.
    pub fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("engine already started");
            return Ok(());
        }

        let recovered = self.queue.recover_in_flight()?;
        info!(
            recovered,
            pending = self.queue.pending_count()?,
            dead_letters = self.queue.dead_letter_count()?,
            "sync engine starting"
        );

        self.monitor.start();
        self.orchestrator.start();
        self.facade.start();
        Ok(())
    }

    /// Stops every background task. A drain in progress runs to completion.
    pub fn dispose(&self) {
        self.facade.dispose();
        self.orchestrator.dispose();
        self.monitor.dispose();
        info!("sync engine stopped");
    }

    /// Records a write for a later drain.
    pub fn enqueue(&self, kind: ActionKind, target: &str, payload: Payload) -> Result<ActionId> {
        let id = self.queue.enqueue(kind, target, payload)?;
        self.facade.refresh()?;
        Ok(id)
    }

    /// Writes through when possible, queues otherwise.
    pub async fn submit(&self, kind: ActionKind, target: &str, payload: Payload) -> Result<SubmitOutcome> {
        let outcome = self.orchestrator.submit(kind, target, payload).await?;
        self.facade.refresh()?;
        Ok(outcome)
    }

    pub async fn force_sync(&self) -> Result<DrainOutcome> {
        self.facade.force_sync().await
    }

    pub fn trigger(&self) -> SyncTrigger {
        self.orchestrator.trigger()
    }

    pub fn set_network_online(&self, online: bool) {
        self.monitor.set_network_online(online);
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        self.monitor.set_authenticated(authenticated);
    }

    pub fn facade(&self) -> &OfflineFacade {
        &self.facade
    }

    pub fn monitor(&self) -> &ConnectionMonitor {
        &self.monitor
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator {
        &self.orchestrator
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    pub fn queue(&self) -> &Arc<MutationQueue> {
        &self.queue
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
