// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::remote::RemoteError;

/// All possible errors that can occur in the msync library.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not initialized: run 'marketsync init' first")]
    NotInitialized,

    #[error("already initialized at {0}")]
    AlreadyInitialized(String),

    #[error(transparent)]
    Core(#[from] ms_core::Error),

    #[error("cannot sync while offline\n  hint: pending actions are kept and drained once the connection is back")]
    Offline,

    #[error("failed to apply action {action_id}: {reason}")]
    ActionApply { action_id: String, reason: String },

    #[error("action {action_id} dropped after {retries} failed attempts\n  hint: inspect it with 'marketsync dead-letters list'")]
    MaxRetriesExceeded { action_id: String, retries: u32 },

    #[error("gave up reconnecting after {attempts} attempts\n  hint: the connection is retried on the next network change or reset")]
    ReconnectExhausted { attempts: u32 },

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

/// A specialized Result type for msync operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
