// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! msync - offline-first sync and connection-resilience engine.
//!
//! This crate provides the runtime half of `marketsync`: the remote
//! transports, the connection monitor, the sync orchestrator, the offline
//! facade and the [`SyncEngine`] service that wires them together, plus the
//! `marketsync` CLI.
//!
//! # Main Components
//!
//! - [`SyncEngine`] - start/dispose lifecycle over injected store, remote and channel
//! - [`ConnectionMonitor`] - network, session and channel health fused into one status
//! - [`SyncOrchestrator`] - single-flight FIFO drains of the mutation queue
//! - [`OfflineFacade`] - read-only snapshot for UI consumers
//! - [`WsRemote`] - WebSocket implementation of the remote traits
//!
//! # Usage
//!
//! ```rust,ignore
//! use msync::{EngineConfig, SyncEngine, WsRemote};
//!
//! let store = Arc::new(Store::open(&path)?);
//! let remote = Arc::new(WsRemote::new("wss://sync.example/ws", Some(token)));
//! let engine = SyncEngine::new(EngineConfig::default(), store, remote.clone(), remote)?;
//! engine.start()?;
//! engine.set_authenticated(true);
//! engine.set_network_online(true);
//! ```

mod agent;
mod cli;
mod commands;

pub mod config;
pub mod engine;
pub mod error;
pub mod facade;
pub mod monitor;
pub mod observer;
pub mod orchestrator;
pub mod remote;

#[cfg(test)]
mod test_helpers;

pub use cli::{CacheCommand, Cli, Command, DeadLetterCommand, OutputFormat};
pub use config::{find_work_dir, get_store_path, init_work_dir, Config};
pub use engine::{EngineConfig, SyncEngine};
pub use error::{Error, Result};
pub use facade::{OfflineFacade, OfflineSnapshot};
pub use monitor::{ConnectionMonitor, ConnectionStatus, MonitorSnapshot, ReconnectPolicy};
pub use observer::{ObserverList, SubscriptionId};
pub use orchestrator::{
    DrainOutcome, DrainReport, Progress, SubmitOutcome, SyncFailure, SyncOrchestrator,
    SyncStatus, SyncTrigger,
};
pub use remote::{ChannelEvent, RealtimeChannel, RemoteError, RemoteTables, WsRemote};

/// Execute a CLI command. This is the main entry point for library users
/// and provides a testable way to run commands without process execution.
pub fn run(command: Command) -> Result<()> {
    match command {
        Command::Init { path, url } => commands::init::run(path, url),
        Command::Enqueue {
            kind,
            target,
            payload,
            output,
        } => commands::enqueue::run(&kind, &target, &payload, output),
        Command::Pending { output } => commands::pending::run(output),
        Command::DeadLetters(cmd) => commands::dead_letters::run(cmd),
        Command::Status { output } => commands::status::run(output),
        Command::Sync { output } => commands::sync::run(output),
        Command::Run => agent::run(),
        Command::Cache(cmd) => commands::cache::run(cmd),
    }
}
