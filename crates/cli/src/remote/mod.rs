// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote data service and realtime channel abstractions.
//!
//! The engine only talks to the outside world through two traits:
//! - [`RemoteTables`]: insert/update/delete against named tables
//! - [`RealtimeChannel`]: the health-signalling subscription
//!
//! [`WsRemote`] implements both over a WebSocket; tests use in-memory mocks.

mod ws;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use ms_core::Payload;

pub use ws::WsRemote;

/// Boxed future returned by the transport traits.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Error type for remote calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The service refused the write.
    #[error("rejected by remote: {0}")]
    Rejected(String),

    /// The service could not be reached or the connection broke.
    #[error("transport error: {0}")]
    Transport(String),

    /// No reply within the per-call deadline.
    #[error("remote call timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Table-level write API of the remote data service.
pub trait RemoteTables: Send + Sync {
    /// Inserts a document. Returns the id the service stored it under, if
    /// it reports one.
    fn insert<'a>(
        &'a self,
        table: &'a str,
        document: Payload,
    ) -> RemoteFuture<'a, RemoteResult<Option<String>>>;

    /// Merges `patch` into the record with the given id.
    fn update_by_id<'a>(
        &'a self,
        table: &'a str,
        id: &'a str,
        patch: Payload,
    ) -> RemoteFuture<'a, RemoteResult<()>>;

    /// Deletes the record with the given id.
    fn delete_by_id<'a>(&'a self, table: &'a str, id: &'a str) -> RemoteFuture<'a, RemoteResult<()>>;
}

/// Outcome of a realtime channel subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The channel is live.
    Subscribed,
    /// The channel refused the subscription.
    ChannelError(String),
    /// No acknowledgement arrived in time, or the service was unreachable.
    TimedOut,
}

/// The realtime channel whose health drives the connection monitor.
pub trait RealtimeChannel: Send + Sync {
    fn subscribe(&self) -> RemoteFuture<'_, ChannelEvent>;
}
