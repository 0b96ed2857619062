// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection state and the status snapshot exposed to collaborators.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};

/// State of the logical channel to the ERP backend.
///
/// Exactly one value at a time, owned by the engine and observed by every
/// other component through the status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected; only an explicit connect leaves this state.
    Disconnected,
    /// Connection attempt in progress.
    Connecting,
    /// Channel open and subscribed.
    Connected,
    /// Lost the channel; backoff retries are scheduled.
    Reconnecting,
    /// Authentication/handshake failure; needs a fresh token or an explicit
    /// retry.
    Error,
}

impl ConnectionState {
    /// Lowercase state name, matching the original status strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded sync failure.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncErrorEntry {
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
    /// Human-readable description.
    pub message: String,
}

/// Bounded log of recent sync failures; the oldest entry is evicted once
/// the capacity is exceeded.
#[derive(Debug)]
pub struct ErrorLog {
    entries: VecDeque<SyncErrorEntry>,
    capacity: usize,
}

impl ErrorLog {
    /// Creates an empty log holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        ErrorLog {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity: capacity.max(1),
        }
    }

    /// Records a failure, evicting the oldest entry when full.
    pub fn push(&mut self, message: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(SyncErrorEntry {
            timestamp: Utc::now(),
            message: message.into(),
        });
    }

    /// Recent entries, oldest first.
    pub fn recent(&self) -> Vec<SyncErrorEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read-only synchronization status snapshot.
#[derive(Debug, Clone)]
pub struct SyncStatus {
    /// Current channel state.
    pub state: ConnectionState,
    /// Time of the last authoritative update or acknowledged sync.
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Number of changes awaiting acknowledgement.
    pub pending_changes: usize,
    /// Monotonic version of the local projection.
    pub data_version: u64,
    /// Recent sync failures, oldest first.
    pub recent_errors: Vec<SyncErrorEntry>,
}

impl SyncStatus {
    /// Initial snapshot before the engine has done anything.
    pub fn initial() -> Self {
        SyncStatus {
            state: ConnectionState::Disconnected,
            last_sync_time: None,
            pending_changes: 0,
            data_version: 0,
            recent_errors: Vec::new(),
        }
    }
}
