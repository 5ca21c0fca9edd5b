// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;
use std::sync::Arc;

use ms_core::{ActionKind, MutationQueue};
use serde::Serialize;

use super::{open_context, parse_payload};
use crate::cli::OutputFormat;
use crate::error::Result;

#[derive(Serialize)]
struct EnqueueJson<'a> {
    id: &'a str,
    kind: ActionKind,
    target: &'a str,
    pending: usize,
}

pub fn run(kind: &str, target: &str, payload: &str, output: OutputFormat) -> Result<()> {
    let ctx = open_context()?;
    let queue = MutationQueue::new(Arc::clone(&ctx.store))?
        .with_max_retries(ctx.config.queue.max_retries);
    run_impl(&queue, kind, target, payload, output, &mut std::io::stdout())
}

pub(crate) fn run_impl(
    queue: &MutationQueue,
    kind: &str,
    target: &str,
    payload: &str,
    output: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let kind: ActionKind = kind.parse()?;
    let payload = parse_payload(payload)?;
    let id = queue.enqueue(kind, target, payload)?;
    let pending = queue.pending_count()?;

    match output {
        OutputFormat::Text => {
            writeln!(out, "Queued {} {} on {}", kind, id, target)?;
            writeln!(out, "Pending: {}", pending)?;
        }
        OutputFormat::Json => {
            let json = EnqueueJson {
                id: &id,
                kind,
                target,
                pending,
            };
            writeln!(out, "{}", serde_json::to_string(&json)?)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "enqueue_tests.rs"]
mod tests;
