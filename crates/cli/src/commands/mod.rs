// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod cache;
pub mod dead_letters;
pub mod enqueue;
pub mod init;
pub mod pending;
pub mod status;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ms_core::{Payload, Store};

use crate::config::{find_work_dir, get_store_path, Config};
use crate::error::{Error, Result};

/// An opened project: its `.msync/` directory, config and store.
pub struct Context {
    pub work_dir: PathBuf,
    pub config: Config,
    pub store: Arc<Store>,
}

/// Helper to open the store from the current context.
pub fn open_context() -> Result<Context> {
    let work_dir = find_work_dir()?;
    let config = Config::load(&work_dir)?;
    let store_path = get_store_path(&work_dir, &config);
    let store = Arc::new(Store::open(&store_path)?);
    Ok(Context {
        work_dir,
        config,
        store,
    })
}

/// Parses a command-line payload, which must be a JSON object.
pub fn parse_payload(raw: &str) -> Result<Payload> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(Error::Core(ms_core::Error::InvalidAction(format!(
            "payload must be a JSON object, got {}",
            json_type(&other)
        )))),
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

pub fn format_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub(crate) fn new_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Runtime(format!("failed to start async runtime: {}", e)))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
