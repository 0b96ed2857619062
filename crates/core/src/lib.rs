// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! erpsync-core: Shared library for the ERP sync engine
//!
//! This crate provides the domain and wire types used by the sync engine:
//! pending change records, subscription topics, wire envelopes, reconnect
//! backoff math, and the cached stock record shape. It contains no I/O and
//! no async code.

pub mod backoff;
pub mod change;
pub mod protocol;
pub mod stock;
pub mod topic;

pub use change::{ChangeError, ChangeKind, PendingChange};
pub use protocol::{ClientEnvelope, ServerEnvelope, SyncOutcome};
pub use stock::StockRecord;
pub use topic::Topic;
