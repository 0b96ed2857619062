// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Request/response correlation by message id.
//!
//! Every outbound `SYNC` registers a waiter slot under its fresh message id.
//! Inbound `SYNC_RESPONSE` envelopes fill the slot; the sender takes the
//! outcome once it is filled. Slots are removed on take, on timeout
//! ([`Correlator::forget`]) and on disconnect ([`Correlator::fail_all`]),
//! so the table never leaks under sustained packet loss. A response with no
//! registered slot is reported as [`Resolution::Unmatched`] and dropped by
//! the caller (it usually arrived after timeout cleanup).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use erpsync_core::SyncOutcome;

static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Generates a fresh unique message id.
pub fn next_message_id() -> String {
    format!(
        "msg_{}_{}",
        Utc::now().timestamp_millis(),
        NEXT_SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

/// What happened to an inbound sync response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A waiter was registered; the outcome is now available to it.
    Delivered,
    /// No waiter with that message id; the response should be discarded.
    Unmatched,
}

/// Table of in-flight sync requests awaiting responses.
///
/// Supports any number of concurrent distinct message ids, with at most one
/// waiter per id.
#[derive(Debug, Default)]
pub struct Correlator {
    pending: HashMap<String, Option<SyncOutcome>>,
}

impl Correlator {
    /// Creates an empty correlator.
    pub fn new() -> Self {
        Correlator::default()
    }

    /// Registers a waiter for `message_id`.
    ///
    /// Returns false (and leaves the existing waiter untouched) if one is
    /// already registered under that id.
    pub fn register(&mut self, message_id: &str) -> bool {
        if self.pending.contains_key(message_id) {
            return false;
        }
        self.pending.insert(message_id.to_string(), None);
        true
    }

    /// Delivers an outcome to the waiter registered for `message_id`.
    pub fn resolve(&mut self, message_id: &str, outcome: SyncOutcome) -> Resolution {
        match self.pending.get_mut(message_id) {
            Some(slot) => {
                *slot = Some(outcome);
                Resolution::Delivered
            }
            None => Resolution::Unmatched,
        }
    }

    /// Takes a delivered outcome, removing the waiter.
    ///
    /// Returns `None` while the response is still outstanding.
    pub fn take(&mut self, message_id: &str) -> Option<SyncOutcome> {
        match self.pending.get(message_id) {
            Some(Some(_)) => self.pending.remove(message_id).flatten(),
            _ => None,
        }
    }

    /// Removes a waiter without an outcome (timeout cleanup).
    pub fn forget(&mut self, message_id: &str) {
        self.pending.remove(message_id);
    }

    /// True if a waiter is registered for `message_id`.
    pub fn contains(&self, message_id: &str) -> bool {
        self.pending.contains_key(message_id)
    }

    /// Drops every waiter. Called on disconnect so outstanding requests
    /// fail immediately instead of running out their timeouts.
    ///
    /// Returns the number of waiters dropped.
    pub fn fail_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    /// Number of registered waiters.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True when no waiters are registered.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
