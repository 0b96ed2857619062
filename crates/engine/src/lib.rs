// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! erpsync-engine: bidirectional sync engine for an ERP backend.
//!
//! Owns the single logical channel to the remote system and keeps local
//! state eventually consistent with it:
//!
//! ```text
//! ┌──────────────┐ commands ┌─────────────┐ envelopes ┌─────────────┐
//! │  SyncHandle  │─────────►│  SyncEngine │◄─────────►│  Transport  │
//! │(collaborator)│◄─────────│ (run loop)  │           │   (trait)   │
//! └──────────────┘  status/ └─────────────┘           └─────────────┘
//!                   events      │      │
//!                        ┌──────┘      └───────┐
//!                        ▼                     ▼
//!                 ┌─────────────┐       ┌─────────────┐
//!                 │ ChangeStore │       │ Projection  │
//!                 │  (durable)  │       │ (optimistic)│
//!                 └─────────────┘       └─────────────┘
//! ```
//!
//! - Mutations are written to the durable [`store::ChangeStore`] before any
//!   send attempt and removed only when a sync response names their id.
//! - The [`correlator::Correlator`] pairs outbound `SYNC` actions with their
//!   asynchronous responses by message id, with a 10 s timeout.
//! - Disconnections are healed automatically with capped exponential
//!   backoff; subscriptions are re-issued in full on every reconnect.
//! - Collaborators interact through [`engine::SyncHandle`]: enqueue changes,
//!   read the status snapshot, subscribe to domain events, and read the
//!   stock projection.

pub mod config;
pub mod correlator;
pub mod engine;
pub mod events;
pub mod projection;
pub mod status;
pub mod store;
pub mod transport;

pub use config::SyncConfig;
pub use engine::{EngineError, SyncEngine, SyncHandle, TokenSource};
pub use events::DomainEvent;
pub use projection::StockProjection;
pub use status::{ConnectionState, SyncStatus};
pub use store::ChangeStore;
pub use transport::{Transport, TransportError, WebSocketTransport};

#[cfg(test)]
mod test_helpers;






#[cfg(test)]
mod store_tests;
