// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection monitor.
//!
//! Fuses three inputs into one [`ConnectionStatus`]:
//! - network reachability (`set_network_online`)
//! - session presence (`set_authenticated`)
//! - realtime channel health ([`ChannelEvent`]s)
//!
//! After a channel failure the monitor re-subscribes with exponential
//! backoff in a background task, so callers never block on reconnects.
//!
//! Transitions are queued while the state is locked and handed to
//! observers after it is released, in the order they happened.
//!
//! ```text
//! disconnected ──schedule──► connecting ──subscribed──► connected
//!      ▲                        │                          │
//!      └──────timeout───────────┼──────timeout/offline─────┘
//!                               └──channel error──► error
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::observer::{ObserverList, SubscriptionId};
use crate::remote::{ChannelEvent, RealtimeChannel};

/// Derived connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Connecting,
    Disconnected,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reconnection schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt.
    pub base_delay: Duration,
    /// Consecutive failed attempts before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy {
            base_delay: Duration::from_millis(1000),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt `attempt` (0-indexed): `base_delay * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Point-in-time view of the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonitorSnapshot {
    pub status: ConnectionStatus,
    pub network_online: bool,
    pub authenticated: bool,
    pub attempts: u32,
    pub exhausted: bool,
}

struct MonitorState {
    status: ConnectionStatus,
    network_online: bool,
    authenticated: bool,
    channel_live: bool,
    attempts: u32,
    exhausted: bool,
    started: bool,
    /// Bumped whenever a scheduled attempt must be abandoned.
    generation: u64,
}

struct MonitorInner {
    channel: Arc<dyn RealtimeChannel>,
    policy: ReconnectPolicy,
    state: Mutex<MonitorState>,
    observers: ObserverList<ConnectionStatus>,
    /// Transitions not yet handed to observers.
    outbox: Mutex<VecDeque<ConnectionStatus>>,
    /// Held by whoever is emptying the outbox.
    delivery: Mutex<()>,
    status_tx: watch::Sender<ConnectionStatus>,
    online_tx: watch::Sender<bool>,
    cancel: CancellationToken,
}

/// Tracks connectivity and re-subscribes the realtime channel with backoff.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ConnectionMonitor {
    inner: Arc<MonitorInner>,
}

impl ConnectionMonitor {
    pub fn new(channel: Arc<dyn RealtimeChannel>, policy: ReconnectPolicy) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        let (online_tx, _) = watch::channel(false);

        ConnectionMonitor {
            inner: Arc::new(MonitorInner {
                channel,
                policy,
                state: Mutex::new(MonitorState {
                    status: ConnectionStatus::Disconnected,
                    network_online: false,
                    authenticated: false,
                    channel_live: false,
                    attempts: 0,
                    exhausted: false,
                    started: false,
                    generation: 0,
                }),
                observers: ObserverList::new(),
                outbox: Mutex::new(VecDeque::new()),
                delivery: Mutex::new(()),
                status_tx,
                online_tx,
                cancel: CancellationToken::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MonitorState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn outbox(&self) -> MutexGuard<'_, VecDeque<ConnectionStatus>> {
        self.inner.outbox.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_outgoing(&self) -> Option<ConnectionStatus> {
        self.outbox().pop_front()
    }

    fn has_outgoing(&self) -> bool {
        !self.outbox().is_empty()
    }

    /// Changes the state, then notifies observers of any transitions.
    fn update(&self, apply: impl FnOnce(&mut MonitorState)) {
        {
            let mut state = self.state();
            apply(&mut state);
        }
        self.deliver();
    }

    /// Hands queued transitions to observers.
    ///
    /// Only one thread delivers at a time. A transition queued by an
    /// observer, or by another thread mid-delivery, is picked up by the
    /// delivering loop.
    fn deliver(&self) {
        loop {
            let delivering = match self.inner.delivery.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(e)) => e.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };
            while let Some(status) = self.next_outgoing() {
                self.inner.observers.notify(&status);
            }
            drop(delivering);

            if !self.has_outgoing() {
                return;
            }
        }
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.inner.policy
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state().status
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        let state = self.state();
        MonitorSnapshot {
            status: state.status,
            network_online: state.network_online,
            authenticated: state.authenticated,
            attempts: state.attempts,
            exhausted: state.exhausted,
        }
    }

    /// Registers `callback`, calls it with the current status, then with
    /// every transition in order.
    ///
    /// Callbacks may read the monitor and change its inputs. They must not
    /// subscribe.
    pub fn subscribe(
        &self,
        callback: impl Fn(&ConnectionStatus) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let callback = Arc::new(callback);
        let delivering = self.inner.delivery.lock().unwrap_or_else(|e| e.into_inner());

        // Earlier transitions go to earlier observers only
        let (id, current) = loop {
            let state = self.state();
            if !self.has_outgoing() {
                let observer = Arc::clone(&callback);
                let id = self.inner.observers.subscribe(move |status| observer(status));
                break (id, state.status);
            }
            drop(state);
            while let Some(status) = self.next_outgoing() {
                self.inner.observers.notify(&status);
            }
        };

        callback(&current);
        drop(delivering);
        self.deliver();
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.observers.unsubscribe(id)
    }

    /// Online flag, `true` exactly while the status is `connected`.
    pub fn online_receiver(&self) -> watch::Receiver<bool> {
        self.inner.online_tx.subscribe()
    }

    pub fn status_receiver(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Performs the initial channel subscription if the network is up and a
    /// session exists.
    pub fn start(&self) {
        let mut state = self.state();
        if state.started {
            return;
        }
        state.started = true;
        info!(status = %state.status, "connection monitor started");
        if state.network_online && state.authenticated && !state.channel_live {
            self.spawn_attempt(&state, Duration::ZERO);
        }
    }

    /// Cancels any scheduled reconnect. The monitor cannot be restarted.
    pub fn dispose(&self) {
        self.inner.cancel.cancel();
        let mut state = self.state();
        state.generation += 1;
        debug!("connection monitor disposed");
    }

    /// Network reachability input.
    pub fn set_network_online(&self, online: bool) {
        self.update(|state| {
            if state.network_online == online {
                return;
            }
            state.network_online = online;
            state.generation += 1;

            if online {
                // A fresh online edge restarts the reconnect sequence
                state.attempts = 0;
                state.exhausted = false;
                if state.authenticated {
                    self.transition(state, ConnectionStatus::Connected);
                    if state.started && !state.channel_live {
                        self.spawn_attempt(state, Duration::ZERO);
                    }
                } else {
                    self.transition(state, ConnectionStatus::Disconnected);
                }
            } else {
                state.channel_live = false;
                self.transition(state, ConnectionStatus::Disconnected);
            }
        });
    }

    /// Session input: sign-in or sign-out.
    pub fn set_authenticated(&self, authenticated: bool) {
        self.update(|state| {
            if state.authenticated == authenticated {
                return;
            }
            state.authenticated = authenticated;

            if authenticated {
                if state.network_online {
                    self.transition(state, ConnectionStatus::Connected);
                    if state.started && !state.channel_live {
                        state.generation += 1;
                        self.spawn_attempt(state, Duration::ZERO);
                    }
                }
            } else {
                state.generation += 1;
                state.channel_live = false;
                self.transition(state, ConnectionStatus::Disconnected);
            }
        });
    }

    /// Channel health input.
    ///
    /// Called with the result of every subscription attempt, and by hosts
    /// that observe channel drops on their own.
    pub fn handle_channel_event(&self, event: ChannelEvent) {
        self.update(|state| self.apply_channel_event(state, event));
    }

    /// Clears the attempt counter and subscribes again right away.
    pub fn reset(&self) {
        self.update(|state| {
            state.attempts = 0;
            state.exhausted = false;
            state.generation += 1;
            info!("reconnect sequence reset");

            if state.started && state.network_online && state.authenticated && !state.channel_live {
                self.transition(state, ConnectionStatus::Connecting);
                self.spawn_attempt(state, Duration::ZERO);
            }
        });
    }

    fn apply_channel_event(&self, state: &mut MonitorState, event: ChannelEvent) {
        match event {
            ChannelEvent::Subscribed => {
                if !(state.network_online && state.authenticated) {
                    debug!("ignoring channel subscription while signed out or offline");
                    return;
                }
                state.channel_live = true;
                state.attempts = 0;
                state.exhausted = false;
                self.transition(state, ConnectionStatus::Connected);
            }
            ChannelEvent::TimedOut => {
                state.channel_live = false;
                warn!("realtime channel timed out");
                self.transition(state, ConnectionStatus::Disconnected);
                self.schedule_reconnect(state);
            }
            ChannelEvent::ChannelError(reason) => {
                state.channel_live = false;
                warn!(%reason, "realtime channel error");
                self.transition(state, ConnectionStatus::Error);
                self.schedule_reconnect(state);
            }
        }
    }

    fn schedule_reconnect(&self, state: &mut MonitorState) {
        if !(state.started && state.network_online && state.authenticated) {
            return;
        }
        if self.inner.cancel.is_cancelled() {
            return;
        }

        if state.attempts >= self.inner.policy.max_attempts {
            state.exhausted = true;
            let err = Error::ReconnectExhausted {
                attempts: state.attempts,
            };
            warn!(error = %err, "reconnect exhausted");
            self.transition(state, ConnectionStatus::Error);
            return;
        }

        let delay = self.inner.policy.delay_for(state.attempts);
        state.attempts += 1;
        state.generation += 1;
        info!(
            attempt = state.attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "scheduling reconnect"
        );
        self.transition(state, ConnectionStatus::Connecting);
        self.spawn_attempt(state, delay);
    }

    /// Spawns one subscription attempt after `delay`.
    ///
    /// The attempt is abandoned if the generation moves on before it runs or
    /// before its result arrives.
    fn spawn_attempt(&self, state: &MonitorState, delay: Duration) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("no async runtime, channel subscription skipped");
                return;
            }
        };

        let generation = state.generation;
        let monitor = self.clone();
        let cancel = self.inner.cancel.clone();

        handle.spawn(async move {
            if !delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            let current = monitor.state().generation;
            if current != generation {
                return;
            }

            let event = tokio::select! {
                _ = cancel.cancelled() => return,
                event = monitor.inner.channel.subscribe() => event,
            };

            monitor.update(|state| {
                if state.generation != generation {
                    debug!(?event, "discarding stale channel result");
                    return;
                }
                monitor.apply_channel_event(state, event);
            });
        });
    }

    fn transition(&self, state: &mut MonitorState, next: ConnectionStatus) {
        if state.status == next {
            return;
        }
        info!(from = %state.status, to = %next, "connection status changed");
        state.status = next;

        self.outbox().push_back(next);
        self.inner.status_tx.send_replace(next);
        let online = next == ConnectionStatus::Connected;
        self.inner.online_tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
