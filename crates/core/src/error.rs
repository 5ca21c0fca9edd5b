// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for ms-core operations.

use thiserror::Error;

/// All possible errors that can occur in ms-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("storage unavailable: {0}\n  hint: check that the store path is writable and not locked by another process")]
    StorageUnavailable(String),

    #[error("action not found: {0}")]
    ActionNotFound(String),

    #[error("action already in flight: {0}")]
    AlreadyInFlight(String),

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("invalid action kind: '{0}'\n  hint: valid kinds are: create, update, delete")]
    InvalidKind(String),

    #[error("partition '{0}' does not hold cached entities")]
    InvalidPartition(String),

    #[error("invalid stamp: {0}")]
    InvalidStamp(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

/// A specialized Result type for ms-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
