// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use std::fs;

use serde_json::json;
use tempfile::TempDir;

use erpsync_core::{ChangeKind, PendingChange};

use crate::store::ChangeStore;

fn change(code: &str) -> PendingChange {
    PendingChange::new(ChangeKind::StockUpdate, json!({ "code": code })).unwrap()
}

#[test]
fn open_missing_file_starts_empty() {
    let dir = TempDir::new().unwrap();
    let store = ChangeStore::open(&dir.path().join("pending.json")).unwrap();
    assert!(store.is_empty());
}

#[test]
fn enqueue_persists_and_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pending.json");

    let first = change("M-001");
    let second = change("M-002");
    {
        let mut store = ChangeStore::open(&path).unwrap();
        store.enqueue(first.clone()).unwrap();
        store.enqueue(second.clone()).unwrap();
    }

    let store = ChangeStore::open(&path).unwrap();
    assert_eq!(store.len(), 2);
    // FIFO order survives the restart.
    assert_eq!(store.pending()[0], first);
    assert_eq!(store.pending()[1], second);
}

#[test]
fn remove_ids_deletes_and_persists() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pending.json");

    let keep = change("M-001");
    let acked = change("M-002");
    let mut store = ChangeStore::open(&path).unwrap();
    store.enqueue(keep.clone()).unwrap();
    store.enqueue(acked.clone()).unwrap();

    let removed = store.remove_ids(&[acked.id.clone()]).unwrap();
    assert_eq!(removed, 1);
    assert!(store.contains(&keep.id));
    assert!(!store.contains(&acked.id));

    let reopened = ChangeStore::open(&path).unwrap();
    assert_eq!(reopened.ids(), vec![keep.id]);
}

#[test]
fn remove_ids_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let mut store = ChangeStore::open(&dir.path().join("pending.json")).unwrap();
    let c = change("M-001");
    store.enqueue(c.clone()).unwrap();

    assert_eq!(store.remove_ids(&[c.id.clone()]).unwrap(), 1);
    assert_eq!(store.remove_ids(&[c.id.clone()]).unwrap(), 0);
    assert_eq!(
        store.remove_ids(&["never_existed".to_string()]).unwrap(),
        0
    );
}

#[test]
fn interrupted_rewrite_leaves_previous_state_intact() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pending.json");

    let first = change("M-001");
    let second = change("M-002");
    {
        let mut store = ChangeStore::open(&path).unwrap();
        store.enqueue(first.clone()).unwrap();
        store.enqueue(second.clone()).unwrap();
    }

    // A crash mid-rewrite leaves a partial temp file behind; the backing
    // file must still hold the last complete list.
    fs::write(path.with_extension("tmp"), r#"[{"id":"stock_trunc"#).unwrap();

    let store = ChangeStore::open(&path).unwrap();
    assert_eq!(store.len(), 2);
    assert!(store.contains(&first.id));
    assert!(store.contains(&second.id));
}

#[test]
fn corrupt_file_starts_empty_without_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pending.json");
    fs::write(&path, "{not json at all").unwrap();

    let store = ChangeStore::open(&path).unwrap();
    assert!(store.is_empty());
}

#[test]
fn get_finds_pending_change_by_id() {
    let dir = TempDir::new().unwrap();
    let mut store = ChangeStore::open(&dir.path().join("pending.json")).unwrap();
    let c = change("M-001");
    store.enqueue(c.clone()).unwrap();

    assert_eq!(store.get(&c.id), Some(&c));
    assert_eq!(store.get("missing"), None);
}
