//! Connection state machine.
//!
//! A connection drives one subscription through
//! `Connecting -> Open -> Closed`, then waits out the backoff delay and starts
//! a fresh transport session (a new generation). It stops only when its
//! cancellation token fires.

use std::sync::Arc;

use futures_util::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::backoff::BackoffPolicy;
use super::messages::{decode, StreamMessage};
use super::metrics::StreamMetrics;
use super::transport::{FrameStream, Transport};
use crate::types::{Role, SubscriptionKey};

/// Lifecycle state of a connection's current transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Transport open requested.
    Connecting,
    /// Transport open; messages flow.
    Open,
    /// Transport closed; a reconnect is pending.
    Closed,
}

/// Read-only view of a role's connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    /// Role the connection serves.
    pub role: Role,
    /// Subscription the connection streams.
    pub key: SubscriptionKey,
    /// Current state.
    pub state: ConnectionState,
    /// Retry attempt counter.
    pub attempt: u32,
    /// Transport session number, starting at 1.
    pub generation: u64,
}

/// Observer callback for a role's decoded messages.
pub type MessageHandler = Box<dyn FnMut(StreamMessage) + Send>;

/// Delivery slot of one role.
///
/// Only the connection whose id matches `active` may deliver or publish
/// status, and it does so while holding the slot lock.
#[derive(Default)]
pub(crate) struct Slot {
    pub(crate) handler: Option<MessageHandler>,
    pub(crate) active: Option<u64>,
}

pub(crate) type SharedSlot = Arc<Mutex<Slot>>;

/// What readers see of a role. Nothing else is locked while this is held.
#[derive(Debug, Default)]
pub(crate) struct View {
    pub(crate) key: Option<SubscriptionKey>,
    pub(crate) status: Option<ConnectionStatus>,
}

pub(crate) type SharedView = Arc<Mutex<View>>;

/// Collaborators shared by every connection of a manager.
#[derive(Clone)]
pub(crate) struct ConnectionContext {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) backoff: BackoffPolicy,
    pub(crate) metrics: Arc<StreamMetrics>,
}

/// Manager-side handle of a running connection.
pub(crate) struct Connection {
    key: SubscriptionKey,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Connection {
    /// Spawns the connection task.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn spawn(
        id: u64,
        role: Role,
        key: SubscriptionKey,
        url: String,
        slot: SharedSlot,
        view: SharedView,
        context: ConnectionContext,
    ) -> Self {
        let cancel = CancellationToken::new();
        let driver = Driver {
            id,
            role,
            key: key.clone(),
            url,
            transport: context.transport,
            backoff: context.backoff,
            slot,
            view,
            metrics: context.metrics,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(driver.run());

        Self { key, cancel, task }
    }

    pub(crate) fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    /// Cancels the transport and any pending reconnect timer.
    pub(crate) fn terminate(&self) {
        self.cancel.cancel();
    }

    /// Terminates the connection and returns its task for joining.
    pub(crate) fn into_task(self) -> JoinHandle<()> {
        self.terminate();
        self.task
    }
}

struct Driver {
    id: u64,
    role: Role,
    key: SubscriptionKey,
    url: String,
    transport: Arc<dyn Transport>,
    backoff: BackoffPolicy,
    slot: SharedSlot,
    view: SharedView,
    metrics: Arc<StreamMetrics>,
    cancel: CancellationToken,
}

/// How a transport session ended.
enum SessionEnd {
    Closed,
    Cancelled,
}

impl Driver {
    async fn run(self) {
        let mut attempt: u32 = 0;
        let mut generation: u64 = 0;

        loop {
            generation += 1;
            self.publish(ConnectionState::Connecting, attempt, generation);
            self.metrics.record_open_attempt(generation > 1);
            debug!(role = %self.role, key = %self.key, attempt, generation, "connecting");

            let opened = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = self.transport.open(self.url.clone()) => result,
            };

            match opened {
                Ok(frames) => {
                    attempt = 0;
                    self.metrics.record_open();
                    self.publish(ConnectionState::Open, attempt, generation);
                    info!(role = %self.role, key = %self.key, generation, "stream open");

                    match self.pump(frames).await {
                        SessionEnd::Cancelled => break,
                        SessionEnd::Closed => self.metrics.record_disconnect(),
                    }
                }
                Err(e) => {
                    warn!(role = %self.role, key = %self.key, attempt, error = %e, "stream open failed");
                }
            }

            self.publish(ConnectionState::Closed, attempt, generation);
            let delay = self.backoff.delay(attempt);
            warn!(
                role = %self.role,
                key = %self.key,
                attempt,
                delay_ms = self.backoff.delay_ms(attempt),
                "reconnect scheduled"
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
            attempt = attempt.saturating_add(1);
        }

        debug!(role = %self.role, key = %self.key, generation, "connection terminated");
    }

    /// Reads frames until the session ends. The frame stream is dropped on
    /// return, which closes the transport.
    async fn pump(&self, mut frames: FrameStream) -> SessionEnd {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return SessionEnd::Cancelled,
                next = frames.next() => next,
            };

            match next {
                Some(Ok(text)) => self.dispatch(&text),
                Some(Err(e)) => {
                    warn!(role = %self.role, key = %self.key, error = %e, "transport error, closing");
                    return SessionEnd::Closed;
                }
                None => {
                    info!(role = %self.role, key = %self.key, "stream closed by peer");
                    return SessionEnd::Closed;
                }
            }
        }
    }

    fn dispatch(&self, text: &str) {
        let event = match decode(&self.key, text) {
            Ok(event) => event,
            Err(e) => {
                self.metrics.record_dropped();
                debug!(role = %self.role, key = %self.key, error = %e, "dropping malformed message");
                return;
            }
        };

        let mut slot = self.slot.lock();
        if slot.active != Some(self.id) {
            return;
        }
        match slot.handler.as_mut() {
            Some(handler) => {
                handler(StreamMessage {
                    key: self.key.clone(),
                    event,
                });
                self.metrics.record_delivered();
            }
            None => trace!(role = %self.role, "no observer registered"),
        }
    }

    fn publish(&self, state: ConnectionState, attempt: u32, generation: u64) {
        let slot = self.slot.lock();
        if slot.active != Some(self.id) {
            return;
        }
        self.view.lock().status = Some(ConnectionStatus {
            role: self.role,
            key: self.key.clone(),
            state,
            attempt,
            generation,
        });
    }
}
