// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ms_core::{ActionState, MutationQueue, Partition, Store};
use serde::Serialize;

use super::{format_time, open_context};
use crate::agent::agent_running;
use crate::cli::OutputFormat;
use crate::config::{get_lock_path, Config};
use crate::error::Result;
use crate::orchestrator::LAST_SYNCED_AT_KEY;

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct StatusJson {
    remote_url: String,
    signed_in: bool,
    agent_running: bool,
    pending: usize,
    in_flight: usize,
    retrying: usize,
    dead_letters: usize,
    last_synced_at: Option<DateTime<Utc>>,
}

pub fn run(output: OutputFormat) -> Result<()> {
    let ctx = open_context()?;
    let running = agent_running(&get_lock_path(&ctx.work_dir));
    let status = collect(&ctx.store, &ctx.config, running)?;
    render(&status, output, &mut std::io::stdout())
}

pub(crate) fn collect(store: &Arc<Store>, config: &Config, agent_running: bool) -> Result<StatusJson> {
    let queue = MutationQueue::new(Arc::clone(store))?;
    let actions = queue.all()?;
    let count = |state| actions.iter().filter(|a| a.state == state).count();

    Ok(StatusJson {
        remote_url: config.remote.url.clone(),
        signed_in: config.remote.session_token.is_some(),
        agent_running,
        pending: actions.len(),
        in_flight: count(ActionState::InFlight),
        retrying: count(ActionState::Failed),
        dead_letters: queue.dead_letter_count()?,
        last_synced_at: store.get(Partition::SyncMeta, LAST_SYNCED_AT_KEY)?,
    })
}

pub(crate) fn render(status: &StatusJson, output: OutputFormat, out: &mut impl Write) -> Result<()> {
    match output {
        OutputFormat::Text => {
            writeln!(out, "Remote: {}", status.remote_url)?;
            writeln!(
                out,
                "Session: {}",
                if status.signed_in { "signed in" } else { "signed out" }
            )?;
            writeln!(
                out,
                "Agent: {}",
                if status.agent_running { "running" } else { "not running" }
            )?;
            writeln!(
                out,
                "Pending actions: {} ({} in flight, {} retrying)",
                status.pending, status.in_flight, status.retrying
            )?;
            writeln!(out, "Dead letters: {}", status.dead_letters)?;
            match &status.last_synced_at {
                Some(t) => writeln!(out, "Last sync: {}", format_time(t))?,
                None => writeln!(out, "Last sync: never")?,
            }
        }
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(status)?)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
