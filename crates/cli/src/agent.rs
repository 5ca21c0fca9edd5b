// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The foreground sync agent (`marketsync run`).
//!
//! Holds `.msync/agent.lock` for its lifetime, logs to `.msync/agent.log`,
//! feeds network reachability to the engine from a periodic TCP check and
//! shuts down on Ctrl-C.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::http::Uri;
use tracing::{debug, error, info};

use crate::commands::{new_runtime, open_context};
use crate::config::{get_lock_path, get_log_path};
use crate::engine::SyncEngine;
use crate::error::{Error, Result};
use crate::remote::WsRemote;

const REACH_TIMEOUT: Duration = Duration::from_secs(2);

pub fn run() -> Result<()> {
    let ctx = open_context()?;
    let lock_file = acquire_lock(&get_lock_path(&ctx.work_dir))?;
    setup_logging(&get_log_path(&ctx.work_dir));

    let (host, port) = reach_target(&ctx.config.remote.url)?;
    info!(
        remote = %ctx.config.remote.url,
        work_dir = %ctx.work_dir.display(),
        "agent starting"
    );
    println!("Sync agent running against {} (Ctrl-C to stop)", ctx.config.remote.url);

    let rt = new_runtime()?;
    let result = rt.block_on(async {
        let remote = Arc::new(WsRemote::new(
            ctx.config.remote.url.clone(),
            ctx.config.remote.session_token.clone(),
        ));
        let engine = SyncEngine::new(
            ctx.config.engine_config(),
            Arc::clone(&ctx.store),
            remote.clone(),
            remote.clone(),
        )?;
        engine.start()?;
        engine.set_authenticated(ctx.config.remote.session_token.is_some());

        let mut snapshots = engine.facade().subscribe();
        let mut ticker = tokio::time::interval(ctx.config.check_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                    break;
                }
                _ = ticker.tick() => {
                    let reachable = is_reachable(&host, port).await;
                    debug!(reachable, "reachability checked");
                    engine.set_network_online(reachable);
                }
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snap = snapshots.borrow_and_update().clone();
                    info!(
                        online = snap.is_online,
                        pending = snap.pending_actions_count,
                        status = %snap.sync_status,
                        "sync state"
                    );
                }
            }
        }

        engine.dispose();
        remote.disconnect().await;
        Ok::<_, Error>(())
    });

    if let Err(e) = &result {
        error!(error = %e, "agent failed");
    }
    drop(lock_file);
    info!("agent stopped");
    result
}

/// Host and port the reachability check connects to.
pub(crate) fn reach_target(url: &str) -> Result<(String, u16)> {
    let uri: Uri = url
        .parse()
        .map_err(|e| Error::Config(format!("invalid remote URL '{}': {}", url, e)))?;
    let host = uri
        .host()
        .ok_or_else(|| Error::Config(format!("remote URL '{}' has no host", url)))?;
    let port = match (uri.port_u16(), uri.scheme_str()) {
        (Some(port), _) => port,
        (None, Some("wss")) => 443,
        (None, _) => 80,
    };
    Ok((host.trim_matches(|c| c == '[' || c == ']').to_string(), port))
}

/// Whether a TCP connection to the remote host succeeds in time.
pub(crate) async fn is_reachable(host: &str, port: u16) -> bool {
    matches!(
        tokio::time::timeout(REACH_TIMEOUT, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

/// Whether another process holds the agent lock.
pub fn agent_running(lock_path: &Path) -> bool {
    use fs2::FileExt;

    let Ok(file) = fs::OpenOptions::new().read(true).write(true).open(lock_path) else {
        return false;
    };
    match file.try_lock_exclusive() {
        Ok(()) => {
            let _ = FileExt::unlock(&file);
            false
        }
        Err(_) => true,
    }
}

fn acquire_lock(lock_path: &Path) -> Result<fs::File> {
    use fs2::FileExt;

    let file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(lock_path)?;
    file.try_lock_exclusive()
        .map_err(|_| Error::Runtime("another sync agent is already running".to_string()))?;
    Ok(file)
}

fn setup_logging(log_path: &Path) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Try to open log file, fall back to stderr
    let result = if let Ok(file) = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
    {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file)
            .with_ansi(false)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("warning: logging not initialized: {}", e);
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
