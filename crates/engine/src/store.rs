// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable store for pending changes.
//!
//! The full pending list is persisted as one JSON array and rewritten on
//! every mutation (write-through, not write-behind): a change enqueued just
//! before the process dies is on disk before `enqueue` returns. The rewrite
//! goes through a sibling temp file and an atomic rename, so the backing
//! file always holds either the old or the new complete list. FIFO order
//! by enqueue time is preserved for replay; the server may acknowledge out
//! of order, so removal is by exact id set rather than position.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use erpsync_core::PendingChange;

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable, ordered queue of pending changes.
pub struct ChangeStore {
    /// Path of the backing file.
    path: PathBuf,
    /// In-memory mirror of the backing file.
    changes: Vec<PendingChange>,
}

impl ChangeStore {
    /// Opens the store, restoring any pending changes from disk.
    ///
    /// A corrupt or unreadable backing file is logged and treated as empty;
    /// startup never fails for corruption.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let changes = match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<Vec<PendingChange>>(&raw) {
                Ok(changes) => {
                    if !changes.is_empty() {
                        debug!(count = changes.len(), "restored pending changes");
                    }
                    changes
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "pending change store is corrupt, starting empty");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "pending change store unreadable, starting empty");
                Vec::new()
            }
        };

        Ok(ChangeStore {
            path: path.to_path_buf(),
            changes,
        })
    }

    /// Appends a change and persists the full list before returning.
    pub fn enqueue(&mut self, change: PendingChange) -> StoreResult<()> {
        self.changes.push(change);
        self.persist()
    }

    /// Removes the changes whose ids appear in `ids` and persists.
    ///
    /// Ids with no matching entry are ignored, so repeated identical
    /// acknowledgements are harmless. Returns the number removed.
    pub fn remove_ids(&mut self, ids: &[String]) -> StoreResult<usize> {
        let before = self.changes.len();
        self.changes.retain(|c| !ids.contains(&c.id));
        let removed = before - self.changes.len();
        if removed > 0 {
            self.persist()?;
        }
        Ok(removed)
    }

    /// All pending changes in enqueue order.
    pub fn pending(&self) -> &[PendingChange] {
        &self.changes
    }

    /// Looks up a pending change by id.
    pub fn get(&self, id: &str) -> Option<&PendingChange> {
        self.changes.iter().find(|c| c.id == id)
    }

    /// Ids of all pending changes in enqueue order.
    pub fn ids(&self) -> Vec<String> {
        self.changes.iter().map(|c| c.id.clone()).collect()
    }

    /// True if a change with the given id is pending.
    pub fn contains(&self, id: &str) -> bool {
        self.changes.iter().any(|c| c.id == id)
    }

    /// Number of pending changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    fn persist(&self) -> StoreResult<()> {
        let json = serde_json::to_string(&self.changes)?;
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        // Rename is atomic: a crash mid-rewrite leaves the previous list
        // intact instead of a truncated file.
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
