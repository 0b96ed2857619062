// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Pending change records.
//!
//! A [`PendingChange`] is a locally originated mutation that has not yet been
//! confirmed by the ERP backend. Changes are written to the durable store
//! before any send attempt and removed only after a positive sync response
//! names their id.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::topic::Topic;

static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

fn next_seq() -> u64 {
    NEXT_SEQ.fetch_add(1, Ordering::Relaxed)
}

/// Error type for change construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChangeError {
    /// The payload is missing a field the change kind requires.
    #[error("{kind} payload is missing required field `{field}`")]
    MissingField {
        /// Kind being constructed.
        kind: ChangeKind,
        /// Name of the missing field.
        field: &'static str,
    },

    /// The payload must be a JSON object for this kind.
    #[error("{kind} payload must be a JSON object")]
    PayloadNotObject {
        /// Kind being constructed.
        kind: ChangeKind,
    },
}

/// The type of a local mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    /// Stock quantity or location update.
    StockUpdate,
    /// New order created.
    OrderCreate,
    /// Existing order changed.
    OrderUpdate,
    /// Materials reserved for an order.
    MaterialReserve,
    /// Material reservation released.
    MaterialCancelReserve,
    /// Reserved materials consumed by production.
    MaterialConsume,
    /// Production stage/status update.
    ProductionUpdate,
    /// Production operation added to an order.
    OperationAdd,
}

impl ChangeKind {
    /// Prefix used when generating change ids for this kind.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            ChangeKind::StockUpdate => "stock",
            ChangeKind::OrderCreate => "order_create",
            ChangeKind::OrderUpdate => "order_update",
            ChangeKind::MaterialReserve => "reserve",
            ChangeKind::MaterialCancelReserve => "cancel_reserve",
            ChangeKind::MaterialConsume => "consume",
            ChangeKind::ProductionUpdate => "production",
            ChangeKind::OperationAdd => "operation_add",
        }
    }

    /// Wire name of the kind (the `type` field of a serialized change).
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::StockUpdate => "STOCK_UPDATE",
            ChangeKind::OrderCreate => "ORDER_CREATE",
            ChangeKind::OrderUpdate => "ORDER_UPDATE",
            ChangeKind::MaterialReserve => "MATERIAL_RESERVE",
            ChangeKind::MaterialCancelReserve => "MATERIAL_CANCEL_RESERVE",
            ChangeKind::MaterialConsume => "MATERIAL_CONSUME",
            ChangeKind::ProductionUpdate => "PRODUCTION_UPDATE",
            ChangeKind::OperationAdd => "OPERATION_ADD",
        }
    }

    /// Payload fields that must be present for this kind.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            ChangeKind::StockUpdate => &["code"],
            ChangeKind::OrderCreate | ChangeKind::OrderUpdate => &["orderNo"],
            ChangeKind::MaterialReserve
            | ChangeKind::MaterialCancelReserve
            | ChangeKind::MaterialConsume => &["orderId", "materials"],
            ChangeKind::ProductionUpdate => &["orderId"],
            ChangeKind::OperationAdd => &["orderId", "operation"],
        }
    }

    /// Domain-event topic re-emitted when a change of this kind is applied
    /// optimistically.
    pub fn topic(&self) -> Topic {
        match self {
            ChangeKind::StockUpdate => Topic::StockUpdated,
            ChangeKind::MaterialReserve
            | ChangeKind::MaterialCancelReserve
            | ChangeKind::MaterialConsume => Topic::MaterialUpdated,
            ChangeKind::OrderCreate | ChangeKind::OrderUpdate => Topic::OrderUpdated,
            ChangeKind::ProductionUpdate | ChangeKind::OperationAdd => Topic::ProductionUpdated,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A locally originated mutation awaiting acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChange {
    /// Locally generated unique id, immutable.
    pub id: String,
    /// Change type.
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// Creation time, immutable.
    pub timestamp: DateTime<Utc>,
    /// Kind-specific payload.
    #[serde(rename = "data")]
    pub payload: Value,
}

impl PendingChange {
    /// Creates a change after validating the payload for the given kind.
    ///
    /// The id is `{prefix}_{unix_millis}_{seq}`; the sequence counter keeps
    /// ids unique within a single millisecond.
    pub fn new(kind: ChangeKind, payload: Value) -> Result<Self, ChangeError> {
        Self::validate(kind, &payload)?;
        let now = Utc::now();
        let id = format!(
            "{}_{}_{}",
            kind.id_prefix(),
            now.timestamp_millis(),
            next_seq()
        );
        Ok(PendingChange {
            id,
            kind,
            timestamp: now,
            payload,
        })
    }

    fn validate(kind: ChangeKind, payload: &Value) -> Result<(), ChangeError> {
        let required = kind.required_fields();
        if required.is_empty() {
            return Ok(());
        }
        let obj = payload
            .as_object()
            .ok_or(ChangeError::PayloadNotObject { kind })?;
        for field in required {
            if !obj.contains_key(*field) {
                return Err(ChangeError::MissingField { kind, field });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "change_tests.rs"]
mod tests;
