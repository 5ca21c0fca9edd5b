// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;
use std::sync::Arc;

use ms_core::EntityCache;

use super::open_context;
use crate::cli::CacheCommand;
use crate::error::Result;

pub fn run(cmd: CacheCommand) -> Result<()> {
    let ctx = open_context()?;
    let cache = EntityCache::new(Arc::clone(&ctx.store))
        .with_ttl(ctx.config.engine_config().cache_ttl);
    match cmd {
        CacheCommand::Purge => purge(&cache, &mut std::io::stdout()),
    }
}

pub(crate) fn purge(cache: &EntityCache, out: &mut impl Write) -> Result<()> {
    let n = cache.purge_expired()?;
    writeln!(out, "Purged {} expired cache entr{}", n, if n == 1 { "y" } else { "ies" })?;
    Ok(())
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
