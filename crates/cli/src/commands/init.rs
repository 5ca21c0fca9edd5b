// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use ms_core::Store;

use crate::config::{get_store_path, init_work_dir, Config};
use crate::error::Result;

pub fn run(path: Option<String>, url: Option<String>) -> Result<()> {
    let target_path = match path {
        Some(p) => PathBuf::from(p),
        None => std::env::current_dir()?,
    };

    let work_dir = init_work_dir(&target_path, url.as_deref())?;
    let config = Config::load(&work_dir)?;

    // Create the store so later commands find a valid database
    Store::open(&get_store_path(&work_dir, &config))?;

    println!("Initialized sync store at {}", work_dir.display());
    println!("Remote: {}", config.remote.url);
    Ok(())
}
