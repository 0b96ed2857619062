// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Wire envelopes for the ERP WebSocket channel.
//!
//! Outbound messages carry an `action` tag, inbound messages a `type` tag:
//!
//! ```text
//! -> { "action": "SUBSCRIBE", "topic": "stock:updated" }
//! -> { "action": "SYNC", "messageId": "msg_...", "data": { ...change... } }
//! <- { "type": "WELCOME", "data": {...} }
//! <- { "type": "UPDATE", "topic": "stock:updated", "data": {...} }
//! <- { "type": "SYNC_RESPONSE", "messageId": "msg_...", "data": { "success": true, "syncedItems": [...] } }
//! <- { "type": "ERROR", "data": {...} }
//! ```
//!
//! Every outbound `SYNC` carries a fresh unique `messageId`; the matching
//! `SYNC_RESPONSE` echoes it exactly once.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::change::PendingChange;
use crate::topic::Topic;

/// Messages sent from the engine to the ERP backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientEnvelope {
    /// Subscribe to a topic. Re-issued for every topic on each (re)connect.
    Subscribe {
        /// Topic to subscribe to.
        topic: Topic,
    },

    /// Submit a pending change for synchronization.
    Sync {
        /// Correlation id echoed by the matching sync response.
        #[serde(rename = "messageId")]
        message_id: String,
        /// The change being synchronized.
        data: PendingChange,
    },
}

/// Messages pushed from the ERP backend to the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerEnvelope {
    /// Greeting sent after a successful handshake. Informational.
    Welcome {
        /// Server info blob.
        data: Value,
    },

    /// Authoritative update pushed on a subscribed topic.
    Update {
        /// Topic the update belongs to.
        topic: Topic,
        /// Topic-specific payload.
        data: Value,
    },

    /// Response to an outbound `Sync` action.
    SyncResponse {
        /// Correlation id of the originating `Sync`.
        #[serde(rename = "messageId")]
        message_id: String,
        /// Result of the synchronization attempt.
        data: SyncOutcome,
    },

    /// Server-side error report. Does not affect the connection.
    Error {
        /// Error detail blob.
        data: Value,
    },
}

/// Result payload of a `SYNC_RESPONSE`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncOutcome {
    /// Whether the change was accepted.
    pub success: bool,
    /// Ids of the pending changes the server acknowledged.
    #[serde(rename = "syncedItems", default, skip_serializing_if = "Vec::is_empty")]
    pub synced_items: Vec<String>,
    /// Domain error description when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncOutcome {
    /// Creates a successful outcome acknowledging the given ids.
    pub fn success(synced_items: Vec<String>) -> Self {
        SyncOutcome {
            success: true,
            synced_items,
            error: None,
        }
    }

    /// Creates a failed outcome with a domain error.
    pub fn failure(error: impl Into<String>) -> Self {
        SyncOutcome {
            success: false,
            synced_items: Vec::new(),
            error: Some(error.into()),
        }
    }
}

impl ClientEnvelope {
    /// Creates a Subscribe envelope.
    pub fn subscribe(topic: Topic) -> Self {
        ClientEnvelope::Subscribe { topic }
    }

    /// Creates a Sync envelope.
    pub fn sync(message_id: impl Into<String>, data: PendingChange) -> Self {
        ClientEnvelope::Sync {
            message_id: message_id.into(),
            data,
        }
    }

    /// Serializes the envelope to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes an envelope from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerEnvelope {
    /// Creates a Welcome envelope.
    pub fn welcome(data: Value) -> Self {
        ServerEnvelope::Welcome { data }
    }

    /// Creates an Update envelope.
    pub fn update(topic: Topic, data: Value) -> Self {
        ServerEnvelope::Update { topic, data }
    }

    /// Creates a SyncResponse envelope.
    pub fn sync_response(message_id: impl Into<String>, data: SyncOutcome) -> Self {
        ServerEnvelope::SyncResponse {
            message_id: message_id.into(),
            data,
        }
    }

    /// Creates an Error envelope.
    pub fn error(data: Value) -> Self {
        ServerEnvelope::Error { data }
    }

    /// Serializes the envelope to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes an envelope from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
