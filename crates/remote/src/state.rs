// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Server state: the in-memory tables.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use ms_core::action::{payload_id, ID_FIELD};
use ms_core::Payload;

/// Behavior switches for drills against the server.
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    /// Tables whose writes are always refused.
    pub reject_tables: HashSet<String>,
    /// Whether channel subscriptions need a session token.
    pub require_token: bool,
}

/// Why a request was refused. Sent back as the reply's reason.
#[derive(Debug, Clone, PartialEq)]
pub enum Refusal {
    TableRejected(String),
    DuplicateId { table: String, id: String },
    NotFound { table: String, id: String },
    Unauthorized,
}

impl std::fmt::Display for Refusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Refusal::TableRejected(table) => write!(f, "writes to '{}' are rejected", table),
            Refusal::DuplicateId { table, id } => {
                write!(f, "record '{}' already exists in '{}'", id, table)
            }
            Refusal::NotFound { table, id } => write!(f, "no record '{}' in '{}'", id, table),
            Refusal::Unauthorized => write!(f, "unauthorized: session token required"),
        }
    }
}

type Table = BTreeMap<String, Payload>;

/// Shared server state containing every table.
#[derive(Clone)]
pub struct ServerState {
    inner: Arc<ServerStateInner>,
}

struct ServerStateInner {
    tables: Mutex<HashMap<String, Table>>,
    options: ServerOptions,
    /// Source of server-assigned record ids.
    next_id: AtomicU64,
}

impl ServerState {
    pub fn new(options: ServerOptions) -> Self {
        ServerState {
            inner: Arc::new(ServerStateInner {
                tables: Mutex::new(HashMap::new()),
                options,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    fn check_writable(&self, table: &str) -> Result<(), Refusal> {
        if self.inner.options.reject_tables.contains(table) {
            return Err(Refusal::TableRejected(table.to_string()));
        }
        Ok(())
    }

    /// Stores a new record, assigning an id when the document has none.
    ///
    /// Returns the id the record is stored under.
    pub async fn insert(&self, table: &str, mut document: Payload) -> Result<String, Refusal> {
        self.check_writable(table)?;

        let mut tables = self.inner.tables.lock().await;
        let rows = tables.entry(table.to_string()).or_default();

        let id = match payload_id(&document) {
            Some(id) => id,
            None => {
                let n = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                format!("srv-{}", n)
            }
        };
        if rows.contains_key(&id) {
            return Err(Refusal::DuplicateId {
                table: table.to_string(),
                id,
            });
        }

        document.insert(ID_FIELD.to_string(), id.clone().into());
        rows.insert(id.clone(), document);
        Ok(id)
    }

    /// Merges `patch` into an existing record. The id field is not patchable.
    pub async fn update(&self, table: &str, id: &str, patch: Payload) -> Result<(), Refusal> {
        self.check_writable(table)?;

        let mut tables = self.inner.tables.lock().await;
        let record = tables
            .get_mut(table)
            .and_then(|rows| rows.get_mut(id))
            .ok_or_else(|| Refusal::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            })?;

        for (key, value) in patch {
            if key != ID_FIELD {
                record.insert(key, value);
            }
        }
        Ok(())
    }

    /// Removes a record. Deleting a missing record succeeds, so a retried
    /// delete whose first reply was lost converges.
    ///
    /// Returns whether a record was removed.
    pub async fn delete(&self, table: &str, id: &str) -> Result<bool, Refusal> {
        self.check_writable(table)?;

        let mut tables = self.inner.tables.lock().await;
        Ok(tables
            .get_mut(table)
            .map(|rows| rows.remove(id).is_some())
            .unwrap_or(false))
    }

    /// Decides whether a channel subscription is allowed.
    pub fn authorize(&self, token: Option<&str>) -> Result<(), Refusal> {
        match token {
            None if self.inner.options.require_token => Err(Refusal::Unauthorized),
            Some("") if self.inner.options.require_token => Err(Refusal::Unauthorized),
            _ => Ok(()),
        }
    }

    /// Returns a copy of one record.
    #[cfg(test)]
    pub async fn get(&self, table: &str, id: &str) -> Option<Payload> {
        let tables = self.inner.tables.lock().await;
        tables.get(table).and_then(|rows| rows.get(id)).cloned()
    }

    /// Number of records in a table.
    #[cfg(test)]
    pub async fn len(&self, table: &str) -> usize {
        let tables = self.inner.tables.lock().await;
        tables.get(table).map_or(0, BTreeMap::len)
    }
}
