// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! TTL-bounded read cache for reference entities.
//!
//! Entries live in the `cached_*` partitions of the [`Store`]. An entry read
//! at or after its `expires_at` is a miss and is deleted on that read.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::stamp::{ClockSource, SystemClock};
use crate::store::{Partition, Store};

/// Default time-to-live for cached entities (7 days).
pub const DEFAULT_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// A cached value with its validity window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEntity<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<T> CachedEntity<T> {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub struct EntityCache {
    store: Arc<Store>,
    clock: Arc<dyn ClockSource>,
    ttl: Duration,
}

impl EntityCache {
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<Store>, clock: Arc<dyn ClockSource>) -> Self {
        EntityCache {
            store,
            clock,
            ttl: Duration::seconds(DEFAULT_TTL_SECS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Stores `data`, replacing any previous entry and restarting its TTL.
    pub fn put<T: Serialize>(&self, partition: Partition, key: &str, data: &T) -> Result<()> {
        check(partition)?;
        let cached_at = self.clock.now();
        let entry = CachedEntity {
            data,
            cached_at,
            expires_at: cached_at + self.ttl,
        };
        self.store.put(partition, key, &entry)
    }

    /// Returns the cached value, or `None` if absent or expired.
    pub fn get<T: DeserializeOwned>(&self, partition: Partition, key: &str) -> Result<Option<T>> {
        Ok(self.get_entry(partition, key)?.map(|e| e.data))
    }

    /// Like [`EntityCache::get`] but keeps the validity window.
    pub fn get_entry<T: DeserializeOwned>(
        &self,
        partition: Partition,
        key: &str,
    ) -> Result<Option<CachedEntity<T>>> {
        check(partition)?;
        let Some(entry) = self.store.get::<CachedEntity<T>>(partition, key)? else {
            return Ok(None);
        };

        if entry.is_expired(self.clock.now()) {
            debug!(%partition, key, "cache entry expired");
            self.store.delete(partition, key)?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    pub fn invalidate(&self, partition: Partition, key: &str) -> Result<bool> {
        check(partition)?;
        self.store.delete(partition, key)
    }

    /// Deletes every expired entry across all cache partitions.
    pub fn purge_expired(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut purged = 0;

        for partition in Partition::ALL.into_iter().filter(Partition::is_cache) {
            for key in self.store.keys(partition)? {
                // Only the window is needed; the payload stays opaque
                let entry: Option<CachedEntity<serde_json::Value>> =
                    self.store.get(partition, &key)?;
                if entry.is_some_and(|e| e.is_expired(now)) && self.store.delete(partition, &key)? {
                    purged += 1;
                }
            }
        }

        Ok(purged)
    }
}

fn check(partition: Partition) -> Result<()> {
    if partition.is_cache() {
        Ok(())
    } else {
        Err(Error::InvalidPartition(partition.to_string()))
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
