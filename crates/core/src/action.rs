// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Queued remote writes.
//!
//! A [`PendingAction`] is the durable record of one write that could not (or
//! should not yet) reach the remote service. Actions are created by the queue,
//! mutated only by the drain loop, and either removed on success or moved to
//! the dead-letter partition once their retry budget is spent.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::stamp::EnqueueStamp;

/// Unique identifier of a queued action (UUID v4, hyphenated).
pub type ActionId = String;

/// Opaque document carried by an action.
pub type Payload = Map<String, Value>;

/// Payload field holding the remote record identifier.
pub const ID_FIELD: &str = "id";

/// The remote call an action stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Create => "create",
            ActionKind::Update => "update",
            ActionKind::Delete => "delete",
        }
    }

    /// Whether the payload must name the remote record.
    pub fn requires_id(&self) -> bool {
        !matches!(self, ActionKind::Create)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "create" | "insert" => Ok(ActionKind::Create),
            "update" => Ok(ActionKind::Update),
            "delete" => Ok(ActionKind::Delete),
            _ => Err(Error::InvalidKind(s.to_string())),
        }
    }
}

/// Lifecycle state of a queued action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    /// Waiting for its first attempt.
    Pending,
    /// Claimed by a drain cycle.
    InFlight,
    /// At least one attempt failed; will be retried.
    Failed,
}

impl ActionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionState::Pending => "pending",
            ActionState::InFlight => "in_flight",
            ActionState::Failed => "failed",
        }
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A durable record of one intended remote write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: ActionId,
    pub kind: ActionKind,
    /// Remote collection/table name.
    pub target: String,
    pub payload: Payload,
    /// FIFO sort key.
    pub enqueued_at: EnqueueStamp,
    pub state: ActionState,
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl PendingAction {
    /// Creates a fresh action in the `pending` state.
    pub fn new(
        id: ActionId,
        kind: ActionKind,
        target: impl Into<String>,
        payload: Payload,
        enqueued_at: EnqueueStamp,
    ) -> Self {
        PendingAction {
            id,
            kind,
            target: target.into(),
            payload,
            enqueued_at,
            state: ActionState::Pending,
            retry_count: 0,
            last_error: None,
        }
    }

    /// Remote record identifier from the payload, if present.
    ///
    /// Strings are used verbatim; numbers are rendered in decimal.
    pub fn remote_id(&self) -> Option<String> {
        payload_id(&self.payload)
    }

    /// The payload without its identifier field, as sent with updates.
    pub fn patch(&self) -> Payload {
        let mut patch = self.payload.clone();
        patch.remove(ID_FIELD);
        patch
    }

    pub fn is_in_flight(&self) -> bool {
        self.state == ActionState::InFlight
    }

    /// Checks the shape rules every queued action must satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.target.trim().is_empty() {
            return Err(Error::InvalidAction("target cannot be empty".to_string()));
        }
        if self.kind.requires_id() && self.remote_id().is_none() {
            return Err(Error::InvalidAction(format!(
                "{} on '{}' requires an '{}' field in the payload",
                self.kind, self.target, ID_FIELD
            )));
        }
        Ok(())
    }
}

/// Extracts the identifier field from a payload.
pub fn payload_id(payload: &Payload) -> Option<String> {
    match payload.get(ID_FIELD)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// An action dropped after exhausting its retry budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub action: PendingAction,
    pub dropped_at: DateTime<Utc>,
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
