// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot sync: connect, drain the queue once, report.

use std::io::Write;
use std::sync::Arc;

use ms_core::Store;
use tracing::debug;

use super::{new_runtime, open_context};
use crate::agent::agent_running;
use crate::cli::OutputFormat;
use crate::config::{get_lock_path, Config};
use crate::engine::SyncEngine;
use crate::error::{Error, Result};
use crate::orchestrator::{DrainOutcome, DrainReport};
use crate::remote::{RealtimeChannel, RemoteTables, WsRemote};

pub fn run(output: OutputFormat) -> Result<()> {
    let ctx = open_context()?;
    if agent_running(&get_lock_path(&ctx.work_dir)) {
        return Err(Error::Runtime(
            "the sync agent is running and drains the queue on its own".to_string(),
        ));
    }

    let rt = new_runtime()?;
    rt.block_on(async {
        let remote = Arc::new(WsRemote::new(
            ctx.config.remote.url.clone(),
            ctx.config.remote.session_token.clone(),
        ));
        let result = sync_once(&ctx.store, &ctx.config, remote.clone(), remote.clone()).await;
        remote.disconnect().await;
        render(&result?, output, &mut std::io::stdout())
    })
}

/// Subscribes the channel once to establish connectivity, then drains.
pub(crate) async fn sync_once(
    store: &Arc<Store>,
    config: &Config,
    remote: Arc<dyn RemoteTables>,
    channel: Arc<dyn RealtimeChannel>,
) -> Result<DrainReport> {
    let engine = SyncEngine::new(config.engine_config(), Arc::clone(store), remote, Arc::clone(&channel))?;
    let recovered = engine.queue().recover_in_flight()?;
    if recovered > 0 {
        debug!(recovered, "recovered interrupted actions");
    }

    engine.set_authenticated(config.remote.session_token.is_some());
    engine.set_network_online(true);
    if engine.monitor().is_connected() {
        let event = channel.subscribe().await;
        engine.monitor().handle_channel_event(event);
    }

    match engine.force_sync().await? {
        DrainOutcome::Completed(report) => Ok(report),
        DrainOutcome::AlreadyRunning => Err(Error::Runtime("a drain is already running".to_string())),
    }
}

pub(crate) fn render(report: &DrainReport, output: OutputFormat, out: &mut impl Write) -> Result<()> {
    match output {
        OutputFormat::Text => {
            writeln!(out, "Applied {} of {} actions", report.applied, report.total)?;
            if report.failed > 0 {
                writeln!(out, "Failed: {} ({} dropped)", report.failed, report.dropped.len())?;
            }
            for id in &report.dropped {
                writeln!(out, "Dropped: {}", id)?;
            }
        }
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(report)?)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
