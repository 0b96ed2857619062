// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The sync engine actor and its collaborator handle.
//!
//! [`SyncEngine::run`] is the single task that owns the transport, the
//! durable change store, the correlator and the projection. Inbound
//! envelopes are processed strictly in arrival order; outbound sync
//! requests go out one at a time. Collaborators hold a cheap [`SyncHandle`]
//! and talk to the engine over channels.
//!
//! Connection lifecycle:
//!
//! ```text
//! Disconnected --connect--> Connecting --open--> Connected
//! Connected --close/error--> Reconnecting --backoff timer--> Connecting
//! Connected --disconnect--> Disconnected      (until explicit connect)
//! Connecting --missing token--> Error --health timer--> Connecting
//! ```

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{interval_at, sleep, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use erpsync_core::backoff;
use erpsync_core::{
    ChangeError, ChangeKind, ClientEnvelope, PendingChange, ServerEnvelope, SyncOutcome, Topic,
};

use crate::config::SyncConfig;
use crate::correlator::{next_message_id, Correlator, Resolution};
use crate::events::DomainEvent;
use crate::projection::StockProjection;
use crate::status::{ConnectionState, ErrorLog, SyncErrorEntry, SyncStatus};
use crate::store::{ChangeStore, StoreError};
use crate::transport::{Transport, TransportError, TransportResult, WebSocketTransport};

/// Error type for engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No authentication token is available for the connect attempt.
    #[error("no authentication token available")]
    AuthMissing,

    /// The operation requires a connected channel.
    #[error("not connected to the ERP backend")]
    NotConnected,

    /// No sync response arrived within the configured timeout.
    #[error("sync response timed out")]
    SyncTimeout,

    /// The channel was lost while a request was outstanding.
    #[error("connection lost while awaiting sync response")]
    ConnectionLost,

    /// The engine task is no longer running.
    #[error("sync engine stopped")]
    EngineStopped,

    /// Invalid change payload (the one error surfaced synchronously to
    /// collaborators).
    #[error(transparent)]
    Change(#[from] ChangeError),

    /// Transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Durable store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Source of the session bearer token.
///
/// The token is re-read fresh before every connect attempt, so a renewed
/// session heals an `Error` state without restarting the engine.
pub trait TokenSource: Send + Sync {
    /// Returns the current bearer token, or `None` when no session exists.
    fn token(&self) -> Option<String>;
}

impl<F> TokenSource for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

/// Commands sent from handles to the engine task.
enum Command {
    Enqueue {
        kind: ChangeKind,
        payload: Value,
        reply: oneshot::Sender<EngineResult<PendingChange>>,
    },
    Connect,
    Disconnect,
    Shutdown,
}

/// Cheap, clonable collaborator-facing surface of the engine.
#[derive(Clone)]
pub struct SyncHandle {
    cmd_tx: mpsc::Sender<Command>,
    status_rx: watch::Receiver<SyncStatus>,
    events_tx: broadcast::Sender<DomainEvent>,
    projection: Arc<RwLock<StockProjection>>,
}

impl SyncHandle {
    /// Records a mutation for synchronization.
    ///
    /// The change is durably queued and optimistically applied before this
    /// returns; delivery to the backend happens asynchronously. The only
    /// error surfaced here is payload validation.
    pub async fn enqueue_change(
        &self,
        kind: ChangeKind,
        payload: Value,
    ) -> EngineResult<PendingChange> {
        let (reply, response) = oneshot::channel();
        self.cmd_tx
            .send(Command::Enqueue {
                kind,
                payload,
                reply,
            })
            .await
            .map_err(|_| EngineError::EngineStopped)?;
        response.await.map_err(|_| EngineError::EngineStopped)?
    }

    /// Current synchronization status snapshot.
    pub fn status(&self) -> SyncStatus {
        self.status_rx.borrow().clone()
    }

    /// Waits until the status snapshot changes and returns the new value.
    pub async fn status_changed(&mut self) -> EngineResult<SyncStatus> {
        self.status_rx
            .changed()
            .await
            .map_err(|_| EngineError::EngineStopped)?;
        Ok(self.status_rx.borrow_and_update().clone())
    }

    /// Subscribes to domain events. Drop the receiver to unsubscribe.
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.events_tx.subscribe()
    }

    /// Read-only access to the local stock projection.
    pub fn with_projection<R>(&self, f: impl FnOnce(&StockProjection) -> R) -> R {
        let guard = self
            .projection
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Asks the engine to connect.
    pub async fn connect(&self) -> EngineResult<()> {
        self.send(Command::Connect).await
    }

    /// Asks the engine to disconnect and stay offline.
    pub async fn disconnect(&self) -> EngineResult<()> {
        self.send(Command::Disconnect).await
    }

    /// Stops the engine task.
    pub async fn shutdown(&self) -> EngineResult<()> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, command: Command) -> EngineResult<()> {
        self.cmd_tx
            .send(command)
            .await
            .map_err(|_| EngineError::EngineStopped)
    }
}

/// The sync engine: owns the channel to the ERP backend and all local sync
/// state.
pub struct SyncEngine<T: Transport> {
    config: SyncConfig,
    transport: T,
    store: ChangeStore,
    correlator: Correlator,
    projection: Arc<RwLock<StockProjection>>,
    state: ConnectionState,
    /// Reconnect attempts this disconnection episode; reset on success.
    attempts: u32,
    errors: ErrorLog,
    server_acknowledged: bool,
    tokens: Arc<dyn TokenSource>,
    events_tx: broadcast::Sender<DomainEvent>,
    status_tx: watch::Sender<SyncStatus>,
    cmd_rx: mpsc::Receiver<Command>,
    shutting_down: bool,
}

impl SyncEngine<WebSocketTransport> {
    /// Creates an engine with the real WebSocket transport, restoring any
    /// pending changes from `store_path`.
    pub fn open(
        config: SyncConfig,
        store_path: &Path,
        tokens: Arc<dyn TokenSource>,
    ) -> EngineResult<(Self, SyncHandle)> {
        let store = ChangeStore::open(store_path)?;
        Ok(SyncEngine::new(
            config,
            WebSocketTransport::new(),
            store,
            tokens,
        ))
    }
}

impl<T: Transport> SyncEngine<T> {
    /// Creates an engine with a custom transport (used by tests).
    pub fn new(
        config: SyncConfig,
        transport: T,
        store: ChangeStore,
        tokens: Arc<dyn TokenSource>,
    ) -> (Self, SyncHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (status_tx, status_rx) = watch::channel(SyncStatus::initial());
        let (events_tx, _) = broadcast::channel(config.event_capacity.max(1));
        let projection = Arc::new(RwLock::new(StockProjection::new()));

        let handle = SyncHandle {
            cmd_tx,
            status_rx,
            events_tx: events_tx.clone(),
            projection: Arc::clone(&projection),
        };

        let engine = SyncEngine {
            errors: ErrorLog::new(config.max_recent_errors),
            config,
            transport,
            store,
            correlator: Correlator::new(),
            projection,
            state: ConnectionState::Disconnected,
            attempts: 0,
            server_acknowledged: false,
            tokens,
            events_tx,
            status_tx,
            cmd_rx,
            shutting_down: false,
        };
        engine.publish_status();

        (engine, handle)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// True when the channel is usable.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected && self.transport.is_connected()
    }

    /// Number of changes awaiting acknowledgement.
    pub fn pending_count(&self) -> usize {
        self.store.len()
    }

    /// The durable change store (read-only).
    pub fn store(&self) -> &ChangeStore {
        &self.store
    }

    /// The correlator table (read-only; used by tests to assert cleanup).
    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    /// Recent sync failures, oldest first.
    pub fn recent_errors(&self) -> Vec<SyncErrorEntry> {
        self.errors.recent()
    }

    /// True once a WELCOME envelope arrived on the current session.
    pub fn server_acknowledged(&self) -> bool {
        self.server_acknowledged
    }

    /// Current status snapshot.
    pub fn status(&self) -> SyncStatus {
        self.status_tx.borrow().clone()
    }

    /// Read-only access to the local stock projection.
    pub fn with_projection<R>(&self, f: impl FnOnce(&StockProjection) -> R) -> R {
        f(&self.projection_read())
    }

    fn projection_read(&self) -> RwLockReadGuard<'_, StockProjection> {
        self.projection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn projection_write(&self) -> RwLockWriteGuard<'_, StockProjection> {
        self.projection
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "connection state change");
            self.state = next;
        }
        self.publish_status();
    }

    fn publish_status(&self) {
        let (last_sync_time, data_version) = {
            let projection = self.projection_read();
            (projection.last_sync_time(), projection.data_version())
        };
        self.status_tx.send_replace(SyncStatus {
            state: self.state,
            last_sync_time,
            pending_changes: self.store.len(),
            data_version,
            recent_errors: self.errors.recent(),
        });
    }

    /// Connects to the ERP backend.
    ///
    /// A missing token is an authentication failure: the state goes to
    /// `Error` and stays there until a token appears (the health timer
    /// retries). A transport failure goes to `Reconnecting` and the backoff
    /// scheduler takes over. On success the attempt counter resets, all
    /// topic subscriptions are re-issued and the queue is flushed.
    pub async fn connect(&mut self) -> EngineResult<()> {
        let Some(token) = self.tokens.token() else {
            warn!("no authentication token for ERP connection");
            self.errors.push("authentication token missing");
            self.set_state(ConnectionState::Error);
            return Err(EngineError::AuthMissing);
        };

        self.set_state(ConnectionState::Connecting);
        let url = compose_url(&self.config.url, &token);

        match self.transport.connect(&url).await {
            Ok(()) => {
                self.attempts = 0;
                self.server_acknowledged = false;
                self.set_state(ConnectionState::Connected);
                info!("connected to ERP backend");
                self.subscribe_all().await?;
                if !self.store.is_empty() {
                    if let Err(e) = self.flush_pass().await {
                        debug!(error = %e, "initial flush incomplete");
                    }
                }
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "ERP connection attempt failed");
                self.set_state(ConnectionState::Reconnecting);
                Err(e.into())
            }
        }
    }

    /// Disconnects and stays offline until an explicit connect.
    pub async fn disconnect(&mut self) -> EngineResult<()> {
        let _ = self.transport.disconnect().await;
        let dropped = self.correlator.fail_all();
        if dropped > 0 {
            debug!(dropped, "dropped in-flight requests on disconnect");
        }
        self.set_state(ConnectionState::Disconnected);
        info!("disconnected from ERP backend by request");
        Ok(())
    }

    /// Subscriptions do not survive a reconnect on the server side, so the
    /// full topic set is re-issued on every successful connect.
    async fn subscribe_all(&mut self) -> EngineResult<()> {
        for topic in Topic::ALL {
            if let Err(e) = self.transport.send(ClientEnvelope::subscribe(topic)).await {
                if e.is_connection_loss() {
                    self.on_connection_lost();
                    return Err(EngineError::ConnectionLost);
                }
                return Err(e.into());
            }
        }
        debug!(topics = Topic::ALL.len(), "subscribed to ERP topics");
        Ok(())
    }

    fn on_connection_lost(&mut self) {
        let dropped = self.correlator.fail_all();
        warn!(
            dropped,
            pending = self.store.len(),
            "lost connection to ERP backend"
        );
        self.set_state(ConnectionState::Reconnecting);
    }

    /// Dispatches one inbound envelope. Strictly sequential: callers must
    /// not process envelopes concurrently.
    pub fn handle_envelope(&mut self, envelope: ServerEnvelope) {
        match envelope {
            ServerEnvelope::Welcome { data } => {
                self.server_acknowledged = true;
                info!(server = %data, "ERP server welcome");
            }
            ServerEnvelope::Update { topic, data } => {
                self.projection_write().apply_authoritative(topic, &data);
                self.publish_status();
                let _ = self.events_tx.send(DomainEvent::new(topic, data));
            }
            ServerEnvelope::SyncResponse { message_id, data } => {
                self.handle_sync_response(message_id, data);
            }
            ServerEnvelope::Error { data } => {
                warn!(detail = %data, "ERP server reported an error");
            }
        }
    }

    fn handle_sync_response(&mut self, message_id: String, outcome: SyncOutcome) {
        let mut progressed = false;
        if outcome.success {
            match self.store.remove_ids(&outcome.synced_items) {
                Ok(removed) if removed > 0 => {
                    info!(removed, remaining = self.store.len(), "changes acknowledged");
                    progressed = true;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "failed to persist acknowledged removals");
                }
            }
        } else {
            let message = outcome
                .error
                .clone()
                .unwrap_or_else(|| "unknown sync error".to_string());
            warn!(message_id = %message_id, error = %message, "sync rejected by server");
            self.errors.push(message);
        }

        let success = outcome.success;
        match self.correlator.resolve(&message_id, outcome) {
            Resolution::Delivered => progressed = progressed || success,
            Resolution::Unmatched => {
                debug!(message_id = %message_id, "discarding sync response with no waiter");
            }
        }

        // A stale acknowledgement that matched no waiter and removed nothing
        // is not sync progress; the status timestamp stays put.
        if progressed {
            self.projection_write().mark_synced();
        }
        self.publish_status();
    }

    /// Sends one change and waits for its correlated response.
    ///
    /// Other inbound envelopes keep being dispatched while the response is
    /// outstanding; a disconnect fails the wait immediately rather than
    /// after the timeout.
    pub async fn send_and_await(&mut self, change: &PendingChange) -> EngineResult<SyncOutcome> {
        if !self.is_connected() {
            return Err(EngineError::NotConnected);
        }

        let message_id = next_message_id();
        self.correlator.register(&message_id);

        let envelope = ClientEnvelope::sync(message_id.clone(), change.clone());
        if let Err(e) = self.transport.send(envelope).await {
            self.correlator.forget(&message_id);
            if e.is_connection_loss() {
                self.on_connection_lost();
                return Err(EngineError::ConnectionLost);
            }
            return Err(e.into());
        }

        let timeout = sleep_until(Instant::now() + self.config.sync_timeout);
        tokio::pin!(timeout);

        enum WaitEvent {
            TimedOut,
            Inbound(TransportResult<Option<ServerEnvelope>>),
        }

        loop {
            if let Some(outcome) = self.correlator.take(&message_id) {
                return Ok(outcome);
            }
            if !self.correlator.contains(&message_id) {
                // fail_all ran while an envelope was being dispatched
                return Err(EngineError::ConnectionLost);
            }

            let event = tokio::select! {
                _ = &mut timeout => WaitEvent::TimedOut,
                received = self.transport.recv() => WaitEvent::Inbound(received),
            };

            match event {
                WaitEvent::TimedOut => {
                    self.correlator.forget(&message_id);
                    warn!(message_id = %message_id, change = %change.id, "sync response timed out");
                    return Err(EngineError::SyncTimeout);
                }
                WaitEvent::Inbound(Ok(Some(envelope))) => self.handle_envelope(envelope),
                WaitEvent::Inbound(Ok(None)) => {
                    self.on_connection_lost();
                    return Err(EngineError::ConnectionLost);
                }
                WaitEvent::Inbound(Err(e)) if e.is_connection_loss() => {
                    warn!(error = %e, "receive failed while awaiting sync response");
                    self.on_connection_lost();
                    return Err(EngineError::ConnectionLost);
                }
                WaitEvent::Inbound(Err(e)) => {
                    warn!(error = %e, "discarding malformed envelope");
                }
            }
        }
    }

    /// Drains the queue, one change at a time in enqueue order.
    ///
    /// Stops the pass on a timeout, a rejection or a lost connection; the
    /// failing change stays queued for the next pass (no hot-loop retry
    /// within one tick). Returns the number of changes acknowledged.
    pub async fn flush_pass(&mut self) -> EngineResult<usize> {
        if !self.is_connected() {
            return Err(EngineError::NotConnected);
        }

        let ids = self.store.ids();
        if ids.is_empty() {
            return Ok(0);
        }
        debug!(pending = ids.len(), "starting queue flush pass");

        let mut synced = 0;
        for id in ids {
            // A batched acknowledgement may have removed later ids already.
            let Some(change) = self.store.get(&id).cloned() else {
                continue;
            };
            match self.send_and_await(&change).await {
                Ok(outcome) if outcome.success => synced += 1,
                Ok(_) => break,
                Err(EngineError::SyncTimeout) => break,
                Err(e) => {
                    self.publish_status();
                    return Err(e);
                }
            }
        }

        if synced > 0 {
            info!(synced, remaining = self.store.len(), "queue flush pass complete");
        }
        self.publish_status();
        Ok(synced)
    }

    /// Validates, durably queues and optimistically applies a change, then
    /// flushes if connected.
    pub async fn enqueue(&mut self, kind: ChangeKind, payload: Value) -> EngineResult<PendingChange> {
        let change = self.enqueue_local(kind, payload)?;
        if self.is_connected() {
            if let Err(e) = self.flush_pass().await {
                debug!(error = %e, "on-demand flush incomplete; change stays queued");
            }
        }
        Ok(change)
    }

    /// The synchronous half of enqueue: validate, persist (write-ahead),
    /// apply optimistically, publish.
    fn enqueue_local(&mut self, kind: ChangeKind, payload: Value) -> EngineResult<PendingChange> {
        let change = PendingChange::new(kind, payload)?;
        self.store.enqueue(change.clone())?;
        debug!(id = %change.id, kind = %change.kind, "change enqueued");
        self.projection_write().apply_optimistic(&change);
        let _ = self
            .events_tx
            .send(DomainEvent::new(kind.topic(), change.payload.clone()));
        self.publish_status();
        Ok(change)
    }

    /// Runs the engine until shutdown. Call [`SyncHandle::connect`] to bring
    /// the channel up.
    pub async fn run(mut self) {
        info!(url = %self.config.url, "sync engine started");
        while !self.shutting_down {
            match self.state {
                ConnectionState::Connected => self.drive_connected().await,
                ConnectionState::Reconnecting => self.drive_reconnect().await,
                ConnectionState::Error => self.drive_error().await,
                ConnectionState::Disconnected | ConnectionState::Connecting => {
                    self.drive_idle().await;
                }
            }
        }
        info!("sync engine stopped");
    }

    async fn drive_connected(&mut self) {
        let now = Instant::now();
        let mut flush = interval_at(now + self.config.flush_interval, self.config.flush_interval);
        flush.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut health = interval_at(
            now + self.config.health_interval,
            self.config.health_interval,
        );
        health.set_missed_tick_behavior(MissedTickBehavior::Delay);

        enum LoopEvent {
            Command(Option<Command>),
            Inbound(TransportResult<Option<ServerEnvelope>>),
            Tick,
        }

        while self.state == ConnectionState::Connected && !self.shutting_down {
            let event = tokio::select! {
                command = self.cmd_rx.recv() => LoopEvent::Command(command),
                received = self.transport.recv() => LoopEvent::Inbound(received),
                _ = flush.tick() => LoopEvent::Tick,
                _ = health.tick() => LoopEvent::Tick,
            };

            match event {
                LoopEvent::Command(Some(command)) => self.handle_command(command).await,
                LoopEvent::Command(None) => self.shutting_down = true,
                LoopEvent::Inbound(Ok(Some(envelope))) => self.handle_envelope(envelope),
                LoopEvent::Inbound(Ok(None)) => self.on_connection_lost(),
                LoopEvent::Inbound(Err(e)) if e.is_connection_loss() => {
                    warn!(error = %e, "receive failed");
                    self.on_connection_lost();
                }
                LoopEvent::Inbound(Err(e)) => {
                    warn!(error = %e, "discarding malformed envelope");
                }
                LoopEvent::Tick => {
                    if !self.store.is_empty() {
                        if let Err(e) = self.flush_pass().await {
                            debug!(error = %e, "scheduled flush incomplete");
                        }
                    }
                }
            }
        }
    }

    /// One backoff episode: wait the computed delay, then retry. A connect
    /// command fires the retry immediately, replacing the timer.
    async fn drive_reconnect(&mut self) {
        self.attempts += 1;
        let delay = backoff::next_delay(self.attempts, backoff::random_jitter());
        info!(
            attempt = self.attempts,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );
        self.wait_then_connect(delay, ConnectionState::Reconnecting)
            .await;
    }

    /// `Error` is only left by an explicit connect or the periodic health
    /// retry; a fresh token may have appeared in the meantime.
    async fn drive_error(&mut self) {
        self.wait_then_connect(self.config.health_interval, ConnectionState::Error)
            .await;
    }

    async fn wait_then_connect(&mut self, delay: std::time::Duration, parked: ConnectionState) {
        let timer = sleep(delay);
        tokio::pin!(timer);

        enum WaitEvent {
            Fire,
            Command(Option<Command>),
        }

        loop {
            let event = tokio::select! {
                _ = &mut timer => WaitEvent::Fire,
                command = self.cmd_rx.recv() => WaitEvent::Command(command),
            };

            match event {
                WaitEvent::Fire => {
                    let _ = self.connect().await;
                    return;
                }
                WaitEvent::Command(None) => {
                    self.shutting_down = true;
                    return;
                }
                WaitEvent::Command(Some(command)) => {
                    self.handle_command(command).await;
                    if self.state != parked || self.shutting_down {
                        return;
                    }
                }
            }
        }
    }

    async fn drive_idle(&mut self) {
        match self.cmd_rx.recv().await {
            Some(command) => self.handle_command(command).await,
            None => self.shutting_down = true,
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Enqueue {
                kind,
                payload,
                reply,
            } => {
                let result = self.enqueue_local(kind, payload);
                let flush_now = result.is_ok() && self.is_connected();
                // Reply before flushing so callers never wait on the network.
                let _ = reply.send(result);
                if flush_now {
                    if let Err(e) = self.flush_pass().await {
                        debug!(error = %e, "on-demand flush incomplete");
                    }
                }
            }
            Command::Connect => {
                if self.state != ConnectionState::Connected {
                    let _ = self.connect().await;
                }
            }
            Command::Disconnect => {
                let _ = self.disconnect().await;
            }
            Command::Shutdown => self.shutting_down = true,
        }
    }
}

/// Appends the bearer token as a query parameter, re-read fresh per attempt.
fn compose_url(base: &str, token: &str) -> String {
    if base.contains('?') {
        format!("{base}&token={token}")
    } else {
        format!("{base}?token={token}")
    }
}
