// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Domain events fanned out to collaborators.
//!
//! Events travel over a broadcast channel instead of ad hoc listener lists:
//! collaborators subscribe through the engine handle and drop the receiver
//! to unsubscribe, so there is nothing to leak.

use serde_json::Value;

use erpsync_core::Topic;

/// A higher-level domain event re-emitted by the engine.
///
/// Published for every inbound topic update and for every optimistic local
/// mutation.
#[derive(Debug, Clone)]
pub struct DomainEvent {
    /// The topic the event belongs to.
    pub topic: Topic,
    /// Topic-specific payload.
    pub data: Value,
}

impl DomainEvent {
    /// Creates an event.
    pub fn new(topic: Topic, data: Value) -> Self {
        DomainEvent { topic, data }
    }
}
