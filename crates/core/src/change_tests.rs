// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use serde_json::json;
use yare::parameterized;

#[test]
fn change_new_generates_prefixed_unique_ids() {
    let a = PendingChange::new(ChangeKind::StockUpdate, json!({"code": "X1"})).unwrap();
    let b = PendingChange::new(ChangeKind::StockUpdate, json!({"code": "X1"})).unwrap();

    assert!(a.id.starts_with("stock_"), "id was {}", a.id);
    assert_ne!(a.id, b.id);
}

#[parameterized(
    stock = { ChangeKind::StockUpdate, "stock" },
    order_create = { ChangeKind::OrderCreate, "order_create" },
    order_update = { ChangeKind::OrderUpdate, "order_update" },
    reserve = { ChangeKind::MaterialReserve, "reserve" },
    cancel_reserve = { ChangeKind::MaterialCancelReserve, "cancel_reserve" },
    consume = { ChangeKind::MaterialConsume, "consume" },
    production = { ChangeKind::ProductionUpdate, "production" },
    operation = { ChangeKind::OperationAdd, "operation_add" },
)]
fn change_id_prefixes(kind: ChangeKind, prefix: &str) {
    assert_eq!(kind.id_prefix(), prefix);
}

#[test]
fn change_missing_required_field_rejected() {
    let err = PendingChange::new(ChangeKind::StockUpdate, json!({"qty": 5})).unwrap_err();
    assert_eq!(
        err,
        ChangeError::MissingField {
            kind: ChangeKind::StockUpdate,
            field: "code"
        }
    );

    let err = PendingChange::new(
        ChangeKind::MaterialReserve,
        json!({"orderId": "S-1"}), // materials missing
    )
    .unwrap_err();
    assert!(matches!(err, ChangeError::MissingField { field: "materials", .. }));
}

#[test]
fn change_non_object_payload_rejected() {
    let err = PendingChange::new(ChangeKind::OrderUpdate, json!([1, 2, 3])).unwrap_err();
    assert_eq!(
        err,
        ChangeError::PayloadNotObject {
            kind: ChangeKind::OrderUpdate
        }
    );
}

#[test]
fn change_serializes_with_original_field_names() {
    let change = PendingChange::new(
        ChangeKind::ProductionUpdate,
        json!({"orderId": "S-1", "stage": "assembly"}),
    )
    .unwrap();

    let value = serde_json::to_value(&change).unwrap();
    assert_eq!(value["type"], "PRODUCTION_UPDATE");
    assert_eq!(value["data"]["orderId"], "S-1");
    assert!(value["id"].is_string());
    assert!(value["timestamp"].is_string());

    let back: PendingChange = serde_json::from_value(value).unwrap();
    assert_eq!(back, change);
}

#[parameterized(
    stock = { ChangeKind::StockUpdate, Topic::StockUpdated },
    reserve = { ChangeKind::MaterialReserve, Topic::MaterialUpdated },
    consume = { ChangeKind::MaterialConsume, Topic::MaterialUpdated },
    order = { ChangeKind::OrderCreate, Topic::OrderUpdated },
    production = { ChangeKind::ProductionUpdate, Topic::ProductionUpdated },
    operation = { ChangeKind::OperationAdd, Topic::ProductionUpdated },
)]
fn change_kind_maps_to_event_topic(kind: ChangeKind, topic: Topic) {
    assert_eq!(kind.topic(), topic);
}
