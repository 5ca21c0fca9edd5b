// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed persistent store with named partitions.
//!
//! The [`Store`] is a small key/value layer: every record lives in exactly one
//! [`Partition`] under a string key, with its value serialized as JSON.
//! `put` is an upsert and every single-key write is atomic.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::error::{Error, Result};

/// SQL schema for the store.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    partition TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (partition, key)
);

CREATE INDEX IF NOT EXISTS idx_entries_partition ON entries(partition);
"#;

/// Named partitions, one per entity family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    PendingActions,
    CachedProfile,
    CachedOrganization,
    CachedSubscription,
    CachedSession,
    SyncMeta,
    DeadLetters,
    IdMap,
}

impl Partition {
    pub const ALL: [Partition; 8] = [
        Partition::PendingActions,
        Partition::CachedProfile,
        Partition::CachedOrganization,
        Partition::CachedSubscription,
        Partition::CachedSession,
        Partition::SyncMeta,
        Partition::DeadLetters,
        Partition::IdMap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::PendingActions => "pending_actions",
            Partition::CachedProfile => "cached_profile",
            Partition::CachedOrganization => "cached_organization",
            Partition::CachedSubscription => "cached_subscription",
            Partition::CachedSession => "cached_session",
            Partition::SyncMeta => "sync_meta",
            Partition::DeadLetters => "dead_letters",
            Partition::IdMap => "id_map",
        }
    }

    /// Whether this partition holds TTL-bounded cache entries.
    pub fn is_cache(&self) -> bool {
        matches!(
            self,
            Partition::CachedProfile
                | Partition::CachedOrganization
                | Partition::CachedSubscription
                | Partition::CachedSession
        )
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Partition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Partition::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| Error::InvalidPartition(s.to_string()))
    }
}

/// Durable partitioned key/value storage.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Opens or creates a store at the given path.
    ///
    /// Any failure to open the file or apply the schema is reported as
    /// [`Error::StorageUnavailable`].
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| unavailable(path, e))?;
            }
        }

        let conn = Connection::open(path).map_err(|e| unavailable(path, e))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| unavailable(path, e))?;
        conn.execute_batch(SCHEMA).map_err(|e| unavailable(path, e))?;

        Ok(Store {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::StorageUnavailable(format!("in-memory: {e}")))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| Error::StorageUnavailable(format!("in-memory: {e}")))?;
        Ok(Store {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Inserts or replaces the value stored under `key`.
    pub fn put<T: Serialize + ?Sized>(&self, partition: Partition, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.conn().execute(
            "INSERT INTO entries (partition, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(partition, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![partition.as_str(), key, json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Writes several entries in a single transaction.
    pub fn put_many<T: Serialize>(&self, partition: Partition, entries: &[(String, T)]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        for (key, value) in entries {
            let json = serde_json::to_string(value)?;
            tx.execute(
                "INSERT INTO entries (partition, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(partition, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![partition.as_str(), key, json, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Moves `key` into another partition with `value` as its new content.
    ///
    /// The write and the removal commit together.
    pub fn move_entry<T: Serialize + ?Sized>(
        &self,
        from: Partition,
        to: Partition,
        key: &str,
        value: &T,
    ) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO entries (partition, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(partition, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![to.as_str(), key, json, Utc::now().to_rfc3339()],
        )?;
        tx.execute(
            "DELETE FROM entries WHERE partition = ?1 AND key = ?2",
            params![from.as_str(), key],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Reads the value stored under `key`.
    pub fn get<T: DeserializeOwned>(&self, partition: Partition, key: &str) -> Result<Option<T>> {
        let raw: Option<String> = self
            .conn()
            .query_row(
                "SELECT value FROM entries WHERE partition = ?1 AND key = ?2",
                params![partition.as_str(), key],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|json| decode(partition, key, &json)).transpose()
    }

    /// Reads every value in a partition, ordered by key.
    pub fn get_all<T: DeserializeOwned>(&self, partition: Partition) -> Result<Vec<T>> {
        let rows: Vec<(String, String)> = {
            let conn = self.conn();
            let mut stmt =
                conn.prepare("SELECT key, value FROM entries WHERE partition = ?1 ORDER BY key")?;
            let rows = stmt
                .query_map(params![partition.as_str()], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        rows.iter()
            .map(|(key, json)| decode(partition, key, json))
            .collect()
    }

    /// Lists the keys of a partition.
    pub fn keys(&self, partition: Partition) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT key FROM entries WHERE partition = ?1 ORDER BY key")?;
        let keys = stmt
            .query_map(params![partition.as_str()], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    /// Deletes the entry under `key`. Returns whether it existed.
    pub fn delete(&self, partition: Partition, key: &str) -> Result<bool> {
        let changed = self.conn().execute(
            "DELETE FROM entries WHERE partition = ?1 AND key = ?2",
            params![partition.as_str(), key],
        )?;
        Ok(changed > 0)
    }

    /// Deletes every entry in a partition. Returns the number removed.
    pub fn clear(&self, partition: Partition) -> Result<usize> {
        let changed = self.conn().execute(
            "DELETE FROM entries WHERE partition = ?1",
            params![partition.as_str()],
        )?;
        Ok(changed)
    }

    /// Counts the entries in a partition.
    pub fn count(&self, partition: Partition) -> Result<usize> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM entries WHERE partition = ?1",
            params![partition.as_str()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn unavailable(path: &Path, e: impl fmt::Display) -> Error {
    Error::StorageUnavailable(format!("{}: {}", path.display(), e))
}

fn decode<T: DeserializeOwned>(partition: Partition, key: &str, json: &str) -> Result<T> {
    serde_json::from_str(json).map_err(|e| {
        Error::CorruptedData(format!("invalid value for '{key}' in partition '{partition}': {e}"))
    })
}

/// Where a [`SharedStore`] opens its backing database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    Memory,
}

/// Lazily-opened store handle shared by every component.
///
/// The first caller of [`SharedStore::get`] opens the database; concurrent
/// callers wait for that single open and receive the same [`Store`]. A failed
/// open is returned to every waiting caller and retried on the next call.
pub struct SharedStore {
    location: StoreLocation,
    cell: OnceCell<Arc<Store>>,
}

impl SharedStore {
    pub fn new(location: StoreLocation) -> Self {
        SharedStore {
            location,
            cell: OnceCell::new(),
        }
    }

    /// Wraps an already opened store.
    pub fn from_store(store: Arc<Store>) -> Self {
        SharedStore {
            location: StoreLocation::Memory,
            cell: OnceCell::new_with(Some(store)),
        }
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Returns the store, opening it on first use.
    pub async fn get(&self) -> Result<Arc<Store>> {
        let store = self
            .cell
            .get_or_try_init(|| async {
                let store = match &self.location {
                    StoreLocation::File(path) => Store::open(path)?,
                    StoreLocation::Memory => Store::open_in_memory()?,
                };
                Ok::<_, Error>(Arc::new(store))
            })
            .await?;
        Ok(Arc::clone(store))
    }

    /// Returns the store if it has already been opened.
    pub fn try_get(&self) -> Option<Arc<Store>> {
        self.cell.get().cloned()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
