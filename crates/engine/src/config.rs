// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration.

use std::time::Duration;

/// Configuration for the sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// WebSocket endpoint of the ERP gateway. The bearer token is appended
    /// as a `token` query parameter at connect time.
    pub url: String,
    /// How long to wait for a sync response before giving up on a request.
    pub sync_timeout: Duration,
    /// Interval between queue flush passes while connected.
    pub flush_interval: Duration,
    /// Interval of the self-healing liveness check.
    pub health_interval: Duration,
    /// Capacity of the bounded recent-error log.
    pub max_recent_errors: usize,
    /// Capacity of the domain-event broadcast channel.
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            url: "ws://localhost:8765/api/erp/ws".to_string(),
            sync_timeout: Duration::from_secs(10),
            flush_interval: Duration::from_secs(5),
            health_interval: Duration::from_secs(60),
            max_recent_errors: 50,
            event_capacity: 64,
        }
    }
}
