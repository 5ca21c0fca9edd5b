// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Dead-letter inspection commands.

use std::io::Write;
use std::sync::Arc;

use ms_core::MutationQueue;

use super::pending::format_action;
use super::{format_time, open_context};
use crate::cli::{DeadLetterCommand, OutputFormat};
use crate::error::Result;

pub fn run(cmd: DeadLetterCommand) -> Result<()> {
    let ctx = open_context()?;
    let queue = MutationQueue::new(Arc::clone(&ctx.store))?;
    let mut out = std::io::stdout();
    match cmd {
        DeadLetterCommand::List { output } => list(&queue, output, &mut out),
        DeadLetterCommand::Requeue { id } => requeue(&queue, &id, &mut out),
        DeadLetterCommand::Purge => purge(&queue, &mut out),
    }
}

pub(crate) fn list(queue: &MutationQueue, output: OutputFormat, out: &mut impl Write) -> Result<()> {
    let letters = queue.dead_letters()?;
    match output {
        OutputFormat::Text => {
            if letters.is_empty() {
                writeln!(out, "No dead letters")?;
            }
            for letter in &letters {
                writeln!(out, "{}", format_action(&letter.action))?;
                writeln!(out, "  dropped {}", format_time(&letter.dropped_at))?;
                if let Some(err) = &letter.action.last_error {
                    writeln!(out, "  last error: {}", err)?;
                }
            }
        }
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(&letters)?)?;
        }
    }
    Ok(())
}

pub(crate) fn requeue(queue: &MutationQueue, id: &str, out: &mut impl Write) -> Result<()> {
    let id = queue.requeue_dead_letter(id)?;
    writeln!(out, "Requeued {}", id)?;
    Ok(())
}

pub(crate) fn purge(queue: &MutationQueue, out: &mut impl Write) -> Result<()> {
    let n = queue.purge_dead_letters()?;
    writeln!(out, "Purged {} dead letter{}", n, if n == 1 { "" } else { "s" })?;
    Ok(())
}

#[cfg(test)]
#[path = "dead_letters_tests.rs"]
mod tests;
