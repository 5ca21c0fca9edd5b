// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! ms-core: Shared library for the marketsync offline engine
//!
//! This crate provides the data model, persistent store, mutation queue,
//! entity cache and wire protocol used by the marketsync agent and the
//! reference remote service.

pub mod action;
pub mod cache;
pub mod error;
pub mod protocol;
pub mod queue;
pub mod stamp;
pub mod store;

pub use action::{ActionId, ActionKind, ActionState, DeadLetter, Payload, PendingAction};
pub use cache::{CachedEntity, EntityCache};
pub use error::{Error, Result};
pub use queue::{FailOutcome, MutationQueue, MAX_RETRIES};
pub use stamp::{ClockSource, EnqueueStamp, ManualClock, StampClock, SystemClock};
pub use store::{Partition, SharedStore, Store, StoreLocation};
