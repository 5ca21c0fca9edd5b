// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;
use std::sync::Arc;

use ms_core::{MutationQueue, PendingAction};

use super::{format_time, open_context};
use crate::cli::OutputFormat;
use crate::error::Result;

pub fn run(output: OutputFormat) -> Result<()> {
    let ctx = open_context()?;
    let queue = MutationQueue::new(Arc::clone(&ctx.store))?;
    run_impl(&queue, output, &mut std::io::stdout())
}

pub(crate) fn run_impl(queue: &MutationQueue, output: OutputFormat, out: &mut impl Write) -> Result<()> {
    // In-flight actions are shown too; they are still queued
    let actions = queue.all()?;

    match output {
        OutputFormat::Text => {
            if actions.is_empty() {
                writeln!(out, "No pending actions")?;
            }
            for action in &actions {
                writeln!(out, "{}", format_action(action))?;
                if let Some(err) = &action.last_error {
                    writeln!(out, "  last error: {}", err)?;
                }
            }
        }
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(&actions)?)?;
        }
    }
    Ok(())
}

pub(crate) fn format_action(action: &PendingAction) -> String {
    format!(
        "{}  {:<6} {:<16} {:<9} retries={}  queued {}",
        action.id,
        action.kind.as_str(),
        action.target,
        action.state.as_str(),
        action.retry_count,
        format_time(&action.enqueued_at.to_datetime()),
    )
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod tests;
