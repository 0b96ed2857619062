// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Cached stock records.
//!
//! [`StockRecord`] is the unit of the local projection: the client-held
//! mirror of one material's stock position, keyed by material code. Records
//! are never partially written; updates either replace the full record or
//! merge the explicitly named fields handled in [`StockRecord::merge_fields`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One material's stock position.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRecord {
    /// Material code (projection key).
    pub code: String,
    /// Human-readable material name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Total on-hand quantity.
    #[serde(default)]
    pub quantity: f64,
    /// Quantity available for new reservations.
    #[serde(default)]
    pub available_quantity: f64,
    /// Quantity reserved for orders.
    #[serde(default)]
    pub allocated_quantity: f64,
    /// Reorder threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_quantity: Option<f64>,
    /// Warehouse location code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

fn field_f64(data: &Value, key: &str) -> Option<f64> {
    data.get(key).and_then(Value::as_f64)
}

impl StockRecord {
    /// Creates an empty record for the given code.
    pub fn new(code: impl Into<String>) -> Self {
        StockRecord {
            code: code.into(),
            ..StockRecord::default()
        }
    }

    /// Builds a record from a JSON object carrying at least a `code`.
    pub fn from_value(code: impl Into<String>, data: &Value) -> Self {
        let mut record = StockRecord::new(code);
        record.merge_fields(data);
        record
    }

    /// Merges the named fields present in `data` into this record.
    ///
    /// Accepts both the `availableQuantity`/`allocatedQuantity` spellings of
    /// the stock endpoints and the short `available`/`allocated` spellings
    /// of the availability endpoint. An explicit available quantity wins;
    /// otherwise it is recomputed when quantity or allocation changed.
    pub fn merge_fields(&mut self, data: &Value) {
        if let Some(name) = data.get("name").and_then(Value::as_str) {
            self.name = Some(name.to_string());
        }
        if let Some(location) = data.get("location").and_then(Value::as_str) {
            self.location = Some(location.to_string());
        }
        if let Some(min) = field_f64(data, "minQuantity") {
            self.min_quantity = Some(min);
        }

        let quantity = field_f64(data, "quantity");
        let allocated = field_f64(data, "allocatedQuantity").or_else(|| field_f64(data, "allocated"));
        let available =
            field_f64(data, "availableQuantity").or_else(|| field_f64(data, "available"));

        if let Some(q) = quantity {
            self.quantity = q;
        }
        if let Some(a) = allocated {
            self.allocated_quantity = a;
        }
        match available {
            Some(a) => self.available_quantity = a,
            None if quantity.is_some() || allocated.is_some() => self.recompute_available(),
            None => {}
        }
    }

    /// Reserves `qty` units for an order.
    pub fn reserve(&mut self, qty: f64) {
        self.allocated_quantity += qty;
        self.recompute_available();
    }

    /// Releases a reservation of `qty` units.
    pub fn release(&mut self, qty: f64) {
        self.allocated_quantity = (self.allocated_quantity - qty).max(0.0);
        self.recompute_available();
    }

    /// Consumes `qty` reserved units (production usage).
    pub fn consume(&mut self, qty: f64) {
        self.quantity = (self.quantity - qty).max(0.0);
        self.allocated_quantity = (self.allocated_quantity - qty).max(0.0);
        self.recompute_available();
    }

    fn recompute_available(&mut self) {
        self.available_quantity = self.quantity - self.allocated_quantity;
    }
}

#[cfg(test)]
#[path = "stock_tests.rs"]
mod tests;
