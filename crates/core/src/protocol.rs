// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol messages between the sync engine and a remote table
//! service.
//!
//! The protocol is request/reply:
//! - Client sends table writes, channel subscriptions and pings, each tagged
//!   with a client-chosen `request_id`
//! - Server answers every request with exactly one reply echoing that id

use serde::{Deserialize, Serialize};

use crate::action::Payload;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Insert a new document into a table.
    ///
    /// The server replies with `Ack` carrying the id it stored the document
    /// under.
    Insert {
        request_id: u64,
        table: String,
        document: Payload,
    },

    /// Merge `patch` into the record with the given id.
    Update {
        request_id: u64,
        table: String,
        id: String,
        patch: Payload,
    },

    /// Delete the record with the given id.
    Delete {
        request_id: u64,
        table: String,
        id: String,
    },

    /// Open the realtime channel.
    Subscribe {
        request_id: u64,
        /// Session token, if the client is signed in.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },

    /// Ping message for keepalive.
    Ping { request_id: u64 },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The write was applied.
    Ack {
        request_id: u64,
        /// Id of the affected record (server-assigned for inserts).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// The write was refused; retrying unchanged may succeed later.
    Rejected { request_id: u64, reason: String },

    /// The realtime channel is open.
    Subscribed { request_id: u64 },

    /// The realtime channel could not be opened.
    ChannelError { request_id: u64, reason: String },

    /// Pong response to client Ping.
    Pong { request_id: u64 },

    /// Protocol-level error (e.g. unparseable request).
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<u64>,
        message: String,
    },
}

impl ClientMessage {
    pub fn insert(request_id: u64, table: impl Into<String>, document: Payload) -> Self {
        ClientMessage::Insert {
            request_id,
            table: table.into(),
            document,
        }
    }

    pub fn update(
        request_id: u64,
        table: impl Into<String>,
        id: impl Into<String>,
        patch: Payload,
    ) -> Self {
        ClientMessage::Update {
            request_id,
            table: table.into(),
            id: id.into(),
            patch,
        }
    }

    pub fn delete(request_id: u64, table: impl Into<String>, id: impl Into<String>) -> Self {
        ClientMessage::Delete {
            request_id,
            table: table.into(),
            id: id.into(),
        }
    }

    pub fn subscribe(request_id: u64, token: Option<String>) -> Self {
        ClientMessage::Subscribe { request_id, token }
    }

    pub fn ping(request_id: u64) -> Self {
        ClientMessage::Ping { request_id }
    }

    pub fn request_id(&self) -> u64 {
        match self {
            ClientMessage::Insert { request_id, .. }
            | ClientMessage::Update { request_id, .. }
            | ClientMessage::Delete { request_id, .. }
            | ClientMessage::Subscribe { request_id, .. }
            | ClientMessage::Ping { request_id } => *request_id,
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    pub fn ack(request_id: u64, id: Option<String>) -> Self {
        ServerMessage::Ack { request_id, id }
    }

    pub fn rejected(request_id: u64, reason: impl Into<String>) -> Self {
        ServerMessage::Rejected {
            request_id,
            reason: reason.into(),
        }
    }

    pub fn subscribed(request_id: u64) -> Self {
        ServerMessage::Subscribed { request_id }
    }

    pub fn channel_error(request_id: u64, reason: impl Into<String>) -> Self {
        ServerMessage::ChannelError {
            request_id,
            reason: reason.into(),
        }
    }

    pub fn pong(request_id: u64) -> Self {
        ServerMessage::Pong { request_id }
    }

    pub fn error(request_id: Option<u64>, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            request_id,
            message: message.into(),
        }
    }

    /// The request this message answers, if any.
    pub fn request_id(&self) -> Option<u64> {
        match self {
            ServerMessage::Ack { request_id, .. }
            | ServerMessage::Rejected { request_id, .. }
            | ServerMessage::Subscribed { request_id }
            | ServerMessage::ChannelError { request_id, .. }
            | ServerMessage::Pong { request_id } => Some(*request_id),
            ServerMessage::Error { request_id, .. } => *request_id,
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
