// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local projection of remote stock state.
//!
//! An optimistic cache, not a transactional store. It is mutated from two
//! places only:
//! - [`StockProjection::apply_optimistic`] when a change is enqueued, so the
//!   UI reflects the mutation before the server confirms it;
//! - [`StockProjection::apply_authoritative`] when the server pushes a topic
//!   update, which overwrites whatever the optimistic path guessed.
//!
//! `data_version` increments on every authoritative update and never
//! decreases; readers use it to detect staleness.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use erpsync_core::{ChangeKind, PendingChange, StockRecord, Topic};

/// In-memory mirror of remote stock state.
#[derive(Debug, Default)]
pub struct StockProjection {
    records: HashMap<String, StockRecord>,
    data_version: u64,
    last_sync_time: Option<DateTime<Utc>>,
}

fn material_entries(payload: &Value) -> impl Iterator<Item = (&str, f64)> {
    payload
        .get("materials")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|m| {
            let code = m.get("code").and_then(Value::as_str)?;
            let qty = m.get("quantity").and_then(Value::as_f64)?;
            Some((code, qty))
        })
}

impl StockProjection {
    /// Creates an empty projection.
    pub fn new() -> Self {
        StockProjection::default()
    }

    /// Applies a locally enqueued change before server confirmation.
    ///
    /// Does not touch `data_version`; only authoritative updates advance it.
    pub fn apply_optimistic(&mut self, change: &PendingChange) {
        match change.kind {
            ChangeKind::StockUpdate => {
                if let Some(code) = change.payload.get("code").and_then(Value::as_str) {
                    self.records
                        .entry(code.to_string())
                        .or_insert_with(|| StockRecord::new(code))
                        .merge_fields(&change.payload);
                }
            }
            ChangeKind::MaterialReserve => {
                for (code, qty) in material_entries(&change.payload) {
                    if let Some(record) = self.records.get_mut(code) {
                        record.reserve(qty);
                    }
                }
            }
            ChangeKind::MaterialCancelReserve => {
                for (code, qty) in material_entries(&change.payload) {
                    if let Some(record) = self.records.get_mut(code) {
                        record.release(qty);
                    }
                }
            }
            ChangeKind::MaterialConsume => {
                for (code, qty) in material_entries(&change.payload) {
                    if let Some(record) = self.records.get_mut(code) {
                        record.consume(qty);
                    }
                }
            }
            // Order/production changes have no stock cache effect.
            _ => {}
        }
    }

    /// Applies a server-pushed topic update.
    ///
    /// Always advances `data_version` and refreshes `last_sync_time`. Stock
    /// updates merge the carried record(s); other topics only version-bump
    /// here and are fanned out to collaborators as domain events.
    pub fn apply_authoritative(&mut self, topic: Topic, data: &Value) {
        if topic == Topic::StockUpdated {
            self.merge_stock_payload(data);
        }
        self.data_version += 1;
        self.last_sync_time = Some(Utc::now());
        debug!(topic = %topic, version = self.data_version, "applied authoritative update");
    }

    /// Refreshes `last_sync_time` after a successful sync response.
    pub fn mark_synced(&mut self) {
        self.last_sync_time = Some(Utc::now());
    }

    fn merge_stock_payload(&mut self, data: &Value) {
        // Accepted shapes: one record object, an array of them, or the
        // single-record `{"item": ...}` wrapper.
        match data {
            Value::Array(items) => {
                for item in items {
                    self.merge_stock_record(item);
                }
            }
            Value::Object(obj) if obj.contains_key("item") => {
                self.merge_stock_record(&data["item"]);
            }
            _ => self.merge_stock_record(data),
        }
    }

    fn merge_stock_record(&mut self, data: &Value) {
        if let Some(code) = data.get("code").and_then(Value::as_str) {
            self.records
                .entry(code.to_string())
                .or_insert_with(|| StockRecord::new(code))
                .merge_fields(data);
        }
    }

    /// Looks up the cached record for a material code.
    pub fn get(&self, code: &str) -> Option<&StockRecord> {
        self.records.get(code)
    }

    /// All cached records, keyed by material code.
    pub fn records(&self) -> &HashMap<String, StockRecord> {
        &self.records
    }

    /// Monotonic version counter of authoritative updates.
    pub fn data_version(&self) -> u64 {
        self.data_version
    }

    /// Time of the last authoritative update or acknowledged sync.
    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        self.last_sync_time
    }
}
