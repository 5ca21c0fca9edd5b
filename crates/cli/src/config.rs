// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Project configuration management.
//!
//! Configuration is stored in `.msync/config.toml`. Every field has a
//! default, so an empty file is a valid configuration:
//! - `store`: optional path to the store database
//! - `[remote]`: service URL, session token, call timeout, check interval
//! - `[reconnect]`: backoff base delay and attempt cap
//! - `[queue]`: retry cap before dead-lettering
//! - `[cache]`: entity TTL
//! - `[facade]`: offline polling interval

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::EngineConfig;
use crate::error::{Error, Result};
use crate::monitor::ReconnectPolicy;

const WORK_DIR_NAME: &str = ".msync";
const CONFIG_FILE_NAME: &str = "config.toml";
const STORE_FILE_NAME: &str = "store.db";
const LOG_FILE_NAME: &str = "agent.log";
const LOCK_FILE_NAME: &str = "agent.lock";

/// Project configuration stored in `.msync/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Optional path for the store database (relative to project root or absolute).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub facade: FacadeConfig,
}

/// Remote data service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// WebSocket URL of the remote table service.
    #[serde(default = "default_url")]
    pub url: String,
    /// Session token sent with the channel subscription. Absent means
    /// signed out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    /// Deadline for one remote call in seconds (default: 30).
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    /// Interval between reachability checks in milliseconds (default: 5000).
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            url: default_url(),
            session_token: None,
            call_timeout_secs: default_call_timeout_secs(),
            check_interval_ms: default_check_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt in milliseconds (default: 1000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Consecutive failed attempts before giving up (default: 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        ReconnectConfig {
            base_delay_ms: default_base_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Failed attempts before an action moves to dead letters (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entity lifetime in seconds (default: 7 days).
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl_secs: default_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacadeConfig {
    /// Queue polling interval while offline in milliseconds (default: 5000).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        FacadeConfig {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_url() -> String {
    "ws://127.0.0.1:7890".to_string()
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_check_interval_ms() -> u64 {
    5_000
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_max_retries() -> u32 {
    ms_core::MAX_RETRIES
}

fn default_ttl_secs() -> i64 {
    ms_core::cache::DEFAULT_TTL_SECS
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

impl Config {
    /// Loads configuration from the given `.msync/` directory.
    pub fn load(work_dir: &Path) -> Result<Self> {
        let config_path = work_dir.join(CONFIG_FILE_NAME);
        let content = fs::read_to_string(&config_path)
            .map_err(|e| Error::Config(format!("failed to read config: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to the given `.msync/` directory.
    pub fn save(&self, work_dir: &Path) -> Result<()> {
        let config_path = work_dir.join(CONFIG_FILE_NAME);
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(&config_path, content)?;
        Ok(())
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let url = &self.remote.url;
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(Error::Config(format!(
                "invalid remote URL '{}': must be ws:// or wss://",
                url
            )));
        }
        if self.remote.call_timeout_secs == 0 {
            return Err(Error::Config("remote.call_timeout_secs must be positive".to_string()));
        }
        if self.cache.ttl_secs <= 0 {
            return Err(Error::Config("cache.ttl_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// Engine tunables derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            reconnect: ReconnectPolicy {
                base_delay: Duration::from_millis(self.reconnect.base_delay_ms),
                max_attempts: self.reconnect.max_attempts,
            },
            max_retries: self.queue.max_retries,
            cache_ttl: chrono::Duration::seconds(self.cache.ttl_secs),
            call_timeout: Duration::from_secs(self.remote.call_timeout_secs),
            poll_interval: Duration::from_millis(self.facade.poll_interval_ms),
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.remote.check_interval_ms)
    }
}

/// Find the .msync directory by walking up from the current directory
pub fn find_work_dir() -> Result<PathBuf> {
    find_work_dir_from(&std::env::current_dir()?)
}

/// Find the .msync directory by walking up from `start`
pub fn find_work_dir_from(start: &Path) -> Result<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let work_dir = current.join(WORK_DIR_NAME);
        if work_dir.is_dir() {
            return Ok(work_dir);
        }
        if !current.pop() {
            return Err(Error::NotInitialized);
        }
    }
}

/// Get the store path from config
pub fn get_store_path(work_dir: &Path, config: &Config) -> PathBuf {
    match &config.store {
        Some(store) => {
            let store_path = Path::new(store);
            if store_path.is_absolute() {
                store_path.to_path_buf()
            } else {
                // Relative to work_dir's parent (the project root)
                work_dir.parent().unwrap_or(work_dir).join(store)
            }
        }
        None => work_dir.join(STORE_FILE_NAME),
    }
}

pub fn get_log_path(work_dir: &Path) -> PathBuf {
    work_dir.join(LOG_FILE_NAME)
}

pub fn get_lock_path(work_dir: &Path) -> PathBuf {
    work_dir.join(LOCK_FILE_NAME)
}

/// Initialize a new .msync directory at the given path
pub fn init_work_dir(path: &Path, url: Option<&str>) -> Result<PathBuf> {
    let work_dir = path.join(WORK_DIR_NAME);

    if work_dir.join(CONFIG_FILE_NAME).exists() {
        return Err(Error::AlreadyInitialized(work_dir.display().to_string()));
    }

    let mut config = Config::default();
    if let Some(url) = url {
        config.remote.url = url.to_string();
    }
    config.validate()?;

    fs::create_dir_all(&work_dir)?;
    config.save(&work_dir)?;

    Ok(work_dir)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
