// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

//! Shared test fixtures: a scriptable in-memory transport and engine
//! builders.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;

use erpsync_core::{ClientEnvelope, PendingChange, ServerEnvelope, SyncOutcome};

use crate::config::SyncConfig;
use crate::engine::{SyncEngine, SyncHandle, TokenSource};
use crate::store::ChangeStore;
use crate::transport::{Transport, TransportError, TransportResult};

/// One scripted inbound event for the mock transport.
pub enum MockEvent {
    /// Deliver a well-formed envelope.
    Envelope(ServerEnvelope),
    /// Close the connection from the server side.
    Close,
    /// Deliver an unparseable frame (surfaces as a serialization error).
    Garbage,
}

type Responder = Box<dyn Fn(&ClientEnvelope) -> Vec<MockEvent> + Send + Sync>;

/// In-memory stand-in for the WebSocket transport.
///
/// Everything the engine sends is recorded; a responder closure can script
/// the server side of each exchange (needed because message ids are
/// generated inside the engine).
pub struct MockTransport {
    inbound_rx: mpsc::UnboundedReceiver<MockEvent>,
    sent: Arc<Mutex<Vec<ClientEnvelope>>>,
    connect_urls: Arc<Mutex<Vec<String>>>,
    fail_connects: Arc<AtomicUsize>,
    responder: Option<Responder>,
    inbound_tx: mpsc::UnboundedSender<MockEvent>,
    connected: bool,
}

/// Test-side remote control for a [`MockTransport`] owned by the engine.
#[derive(Clone)]
pub struct MockRemote {
    inbound_tx: mpsc::UnboundedSender<MockEvent>,
    sent: Arc<Mutex<Vec<ClientEnvelope>>>,
    connect_urls: Arc<Mutex<Vec<String>>>,
    fail_connects: Arc<AtomicUsize>,
}

/// Creates a connected mock transport / remote control pair.
pub fn mock_transport() -> (MockTransport, MockRemote) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let sent = Arc::new(Mutex::new(Vec::new()));
    let connect_urls = Arc::new(Mutex::new(Vec::new()));
    let fail_connects = Arc::new(AtomicUsize::new(0));

    let transport = MockTransport {
        inbound_rx,
        sent: Arc::clone(&sent),
        connect_urls: Arc::clone(&connect_urls),
        fail_connects: Arc::clone(&fail_connects),
        responder: None,
        inbound_tx: inbound_tx.clone(),
        connected: false,
    };
    let remote = MockRemote {
        inbound_tx,
        sent,
        connect_urls,
        fail_connects,
    };
    (transport, remote)
}

impl MockTransport {
    /// Installs a closure invoked for every envelope the engine sends; the
    /// events it returns are queued as inbound traffic.
    pub fn with_responder(
        mut self,
        responder: impl Fn(&ClientEnvelope) -> Vec<MockEvent> + Send + Sync + 'static,
    ) -> Self {
        self.responder = Some(Box::new(responder));
        self
    }
}

impl MockRemote {
    /// Queues an inbound envelope.
    pub fn push(&self, envelope: ServerEnvelope) {
        let _ = self.inbound_tx.send(MockEvent::Envelope(envelope));
    }

    /// Closes the connection from the server side.
    pub fn close(&self) {
        let _ = self.inbound_tx.send(MockEvent::Close);
    }

    /// Queues an unparseable inbound frame.
    pub fn push_garbage(&self) {
        let _ = self.inbound_tx.send(MockEvent::Garbage);
    }

    /// Everything the engine has sent so far.
    pub fn sent(&self) -> Vec<ClientEnvelope> {
        self.sent.lock().unwrap().clone()
    }

    /// Sent `Sync` envelopes as (message id, change) pairs.
    pub fn sent_syncs(&self) -> Vec<(String, PendingChange)> {
        self.sent()
            .into_iter()
            .filter_map(|e| match e {
                ClientEnvelope::Sync { message_id, data } => Some((message_id, data)),
                ClientEnvelope::Subscribe { .. } => None,
            })
            .collect()
    }

    /// Forgets recorded outbound traffic.
    pub fn clear_sent(&self) {
        self.sent.lock().unwrap().clear();
    }

    /// URLs passed to connect, in order.
    pub fn connect_urls(&self) -> Vec<String> {
        self.connect_urls.lock().unwrap().clone()
    }

    /// Makes the next `n` connect attempts fail.
    pub fn fail_next_connects(&self, n: usize) {
        self.fail_connects.store(n, Ordering::SeqCst);
    }
}

impl Transport for MockTransport {
    fn connect(
        &mut self,
        url: &str,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        let url = url.to_string();
        Box::pin(async move {
            self.connect_urls.lock().unwrap().push(url);
            if self.fail_connects.load(Ordering::SeqCst) > 0 {
                self.fail_connects.fetch_sub(1, Ordering::SeqCst);
                return Err(TransportError::ConnectionFailed(
                    "mock connect refused".to_string(),
                ));
            }
            self.connected = true;
            Ok(())
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.connected = false;
            Ok(())
        })
    }

    fn send(
        &mut self,
        envelope: ClientEnvelope,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            if !self.connected {
                return Err(TransportError::ConnectionClosed);
            }
            if let Some(responder) = &self.responder {
                for event in responder(&envelope) {
                    let _ = self.inbound_tx.send(event);
                }
            }
            self.sent.lock().unwrap().push(envelope);
            Ok(())
        })
    }

    fn recv(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Option<ServerEnvelope>>> + Send + '_>> {
        Box::pin(async move {
            if !self.connected {
                return Err(TransportError::ConnectionClosed);
            }
            match self.inbound_rx.recv().await {
                Some(MockEvent::Envelope(envelope)) => Ok(Some(envelope)),
                Some(MockEvent::Close) | None => {
                    self.connected = false;
                    Ok(None)
                }
                Some(MockEvent::Garbage) => Err(TransportError::Serialization(
                    "unparseable frame".to_string(),
                )),
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Responder that acknowledges every `Sync` with its change id.
pub fn ack_all(envelope: &ClientEnvelope) -> Vec<MockEvent> {
    match envelope {
        ClientEnvelope::Sync { message_id, data } => {
            vec![MockEvent::Envelope(ServerEnvelope::sync_response(
                message_id.clone(),
                SyncOutcome::success(vec![data.id.clone()]),
            ))]
        }
        ClientEnvelope::Subscribe { .. } => Vec::new(),
    }
}

/// Responder that rejects every `Sync` with the given domain error.
pub fn reject_all(error: &'static str) -> impl Fn(&ClientEnvelope) -> Vec<MockEvent> {
    move |envelope| match envelope {
        ClientEnvelope::Sync { message_id, .. } => {
            vec![MockEvent::Envelope(ServerEnvelope::sync_response(
                message_id.clone(),
                SyncOutcome::failure(error),
            ))]
        }
        ClientEnvelope::Subscribe { .. } => Vec::new(),
    }
}

/// Token source that always produces a session token.
pub fn fixed_token() -> Arc<dyn TokenSource> {
    Arc::new(|| Some("tok-test".to_string()))
}

/// Token source with no session.
pub fn no_token() -> Arc<dyn TokenSource> {
    Arc::new(|| None::<String>)
}

/// Config with production defaults and a mock URL.
pub fn test_config() -> SyncConfig {
    SyncConfig {
        url: "ws://mock.invalid/api/erp/ws".to_string(),
        ..SyncConfig::default()
    }
}

/// Builds an engine over the given mock transport with a store in `dir`.
pub fn build_engine(
    dir: &tempfile::TempDir,
    transport: MockTransport,
) -> (SyncEngine<MockTransport>, SyncHandle) {
    let store = ChangeStore::open(&dir.path().join("pending.json")).unwrap();
    SyncEngine::new(test_config(), transport, store, fixed_token())
}

/// A valid stock update payload.
pub fn stock_payload(code: &str, quantity: f64) -> Value {
    serde_json::json!({ "code": code, "quantity": quantity })
}
