// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Monotonic enqueue stamps for FIFO ordering of queued actions.
//!
//! A stamp pairs wall clock milliseconds with a logical counter so that two
//! actions enqueued within the same millisecond (or after the wall clock
//! stepped backwards) still get distinct, strictly increasing sort keys.
//!
//! Format: `{wall_ms}-{counter}`
//!
//! Ordering rules:
//! 1. Higher wall_ms wins
//! 2. If wall_ms equal, higher counter wins

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};

/// An enqueue timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnqueueStamp {
    /// Wall clock time in milliseconds since Unix epoch.
    pub wall_ms: u64,
    /// Logical counter for actions enqueued at the same wall time.
    pub counter: u32,
}

impl EnqueueStamp {
    pub fn new(wall_ms: u64, counter: u32) -> Self {
        EnqueueStamp { wall_ms, counter }
    }

    /// The earliest possible stamp.
    pub fn min() -> Self {
        EnqueueStamp { wall_ms: 0, counter: 0 }
    }

    /// Wall clock part as a UTC datetime.
    pub fn to_datetime(&self) -> DateTime<Utc> {
        millis_to_datetime(self.wall_ms)
    }
}

impl Ord for EnqueueStamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.wall_ms
            .cmp(&other.wall_ms)
            .then_with(|| self.counter.cmp(&other.counter))
    }
}

impl PartialOrd for EnqueueStamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for EnqueueStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.wall_ms, self.counter)
    }
}

impl FromStr for EnqueueStamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (wall, counter) = s.split_once('-').ok_or_else(|| {
            Error::InvalidStamp(format!("expected format 'wall_ms-counter', got '{s}'"))
        })?;

        let wall_ms = wall
            .parse::<u64>()
            .map_err(|_| Error::InvalidStamp(format!("invalid wall_ms '{wall}' in '{s}'")))?;
        let counter = counter
            .parse::<u32>()
            .map_err(|_| Error::InvalidStamp(format!("invalid counter '{counter}' in '{s}'")))?;

        Ok(EnqueueStamp::new(wall_ms, counter))
    }
}

/// Trait for getting the current wall clock time.
///
/// This allows injecting a controllable clock for testing.
pub trait ClockSource: Send + Sync {
    /// Returns the current time in milliseconds since Unix epoch.
    fn now_ms(&self) -> u64;

    /// Returns the current time as a UTC datetime.
    fn now(&self) -> DateTime<Utc> {
        millis_to_datetime(self.now_ms())
    }
}

/// System clock implementation using `std::time::SystemTime`.
#[derive(Debug, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    time_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(initial_ms: u64) -> Self {
        ManualClock {
            time_ms: AtomicU64::new(initial_ms),
        }
    }

    pub fn set(&self, ms: u64) {
        self.time_ms.store(ms, AtomicOrdering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.time_ms.fetch_add(ms, AtomicOrdering::SeqCst);
    }
}

impl ClockSource for ManualClock {
    fn now_ms(&self) -> u64 {
        self.time_ms.load(AtomicOrdering::SeqCst)
    }
}

impl<C: ClockSource + ?Sized> ClockSource for std::sync::Arc<C> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Produces strictly increasing [`EnqueueStamp`]s.
///
/// Thread-safe; if the wall clock goes backwards the last wall time is kept
/// and the counter advances instead.
pub struct StampClock<C: ClockSource = SystemClock> {
    clock: C,
    last: Mutex<EnqueueStamp>,
}

impl StampClock<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for StampClock<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ClockSource> StampClock<C> {
    pub fn with_clock(clock: C) -> Self {
        StampClock {
            clock,
            last: Mutex::new(EnqueueStamp::min()),
        }
    }

    /// Generates a new stamp, strictly greater than every stamp generated or
    /// observed before.
    pub fn now(&self) -> EnqueueStamp {
        let physical = self.clock.now_ms();
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());

        let next = if physical > last.wall_ms {
            EnqueueStamp::new(physical, 0)
        } else {
            EnqueueStamp::new(last.wall_ms, last.counter.saturating_add(1))
        };

        *last = next;
        next
    }

    /// Makes sure later stamps sort after `seen`.
    ///
    /// Called with the highest stamp already persisted so a restarted process
    /// with a lagging wall clock keeps FIFO order.
    pub fn observe(&self, seen: EnqueueStamp) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if seen > *last {
            *last = seen;
        }
    }

    /// Current wall time from the underlying clock source.
    pub fn wall(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

fn millis_to_datetime(ms: u64) -> DateTime<Utc> {
    let ms = i64::try_from(ms).unwrap_or(i64::MAX);
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
#[path = "stamp_tests.rs"]
mod tests;
