//! Connection registry and shared relay state.
//!
//! The connection map and the location map live together in [`RelayState`]
//! behind one mutex. Admission, eviction, location updates and broadcast
//! passes all run while holding it, so they form a single total order.

use axum::extract::ws::{CloseFrame, Message};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use crate::ws::protocol::{self, WorldState};
use crate::ws::ConnectionSender;

/// Close code sent to a connection replaced by a newer one with the same identity.
pub const CLOSE_SUPERSEDED: u16 = 4000;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Result of handing one message to a connection's outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Queue full; the message was skipped for this client.
    Skipped,
    /// Writer task has exited; the connection is gone.
    Closed,
}

/// Registry entry for one live WebSocket connection.
#[derive(Debug)]
pub struct ClientConnection {
    /// Process-unique serial, distinguishes successive connections under one identity.
    pub id: u64,
    tx: ConnectionSender,
    /// Cancelled when the registry closes this connection.
    closed: CancellationToken,
    dropped_messages: u64,
}

impl ClientConnection {
    pub fn new(tx: ConnectionSender) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            tx,
            closed: CancellationToken::new(),
            dropped_messages: 0,
        }
    }

    /// Create a connection along with the receiving end of its outbound queue.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// A clone of the outbound sender, for control frames (pong, ping, close).
    pub fn sender(&self) -> ConnectionSender {
        self.tx.clone()
    }

    /// Token the connection's task watches; cancelled when the registry
    /// closes the connection, whether or not the close frame could be queued.
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Messages skipped because the outbound queue was full.
    pub fn dropped_messages(&self) -> u64 {
        self.dropped_messages
    }

    /// Enqueue without waiting.
    pub(crate) fn deliver(&mut self, msg: Message) -> Delivery {
        match self.tx.try_send(msg) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => {
                self.dropped_messages += 1;
                Delivery::Skipped
            }
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    fn close(self, code: u16, reason: &'static str) {
        let frame = CloseFrame {
            code,
            reason: reason.into(),
        };
        if self.tx.try_send(Message::Close(Some(frame))).is_err() {
            tracing::debug!(conn_id = self.id, "Close frame not queued");
        }
        self.closed.cancel();
    }
}

/// Everything guarded by the relay lock.
#[derive(Debug, Default)]
pub(crate) struct RelayState {
    pub(crate) connections: HashMap<String, ClientConnection>,
    pub(crate) locations: WorldState,
}

impl RelayState {
    /// Remove both entries for `identity`. Returns whether anything was removed.
    fn evict(&mut self, identity: &str) -> bool {
        let had_connection = self.connections.remove(identity).is_some();
        let had_location = self.locations.remove(identity).is_some();
        had_connection || had_location
    }
}

/// The relay: connection registry plus world state under one lock.
#[derive(Debug, Default)]
pub struct LocationRelay {
    pub(crate) state: Mutex<RelayState>,
}

impl LocationRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `connection` under `identity`.
    ///
    /// The newcomer is sent the current world state. A connection already
    /// registered under the same identity is replaced and sent a close frame.
    /// Callers must reject empty identities beforehand.
    pub fn admit(&self, identity: &str, mut connection: ClientConnection) {
        let mut state = self.state.lock();

        match protocol::encode_world_state(&state.locations) {
            Ok(snapshot) => {
                let _ = connection.deliver(Message::Text(snapshot.into()));
            }
            Err(e) => {
                tracing::warn!(user_id = %identity, error = %e, "Failed to encode snapshot");
            }
        }

        let conn_id = connection.id;
        if let Some(previous) = state.connections.insert(identity.to_string(), connection) {
            tracing::info!(
                user_id = %identity,
                conn_id = previous.id,
                replaced_by = conn_id,
                "Closing superseded connection"
            );
            previous.close(CLOSE_SUPERSEDED, "Superseded");
        }

        tracing::debug!(
            user_id = %identity,
            conn_id,
            connections = state.connections.len(),
            "Connection admitted"
        );
    }

    /// Remove the connection and location stored under `identity`.
    /// Evicting an unknown identity is a no-op.
    pub fn evict(&self, identity: &str) {
        let removed = self.state.lock().evict(identity);
        tracing::debug!(user_id = %identity, removed, "Evict");
    }

    /// Disconnect path of connection `conn_id`: evict `identity` and broadcast
    /// the departure, unless a newer connection has taken over the identity.
    ///
    /// Returns whether the eviction happened.
    pub fn disconnect(&self, identity: &str, conn_id: u64) -> bool {
        let mut state = self.state.lock();

        if let Some(current) = state.connections.get(identity) {
            if current.id != conn_id {
                tracing::debug!(
                    user_id = %identity,
                    conn_id,
                    current = current.id,
                    "Superseded connection left, keeping successor"
                );
                return false;
            }
        }

        if !state.evict(identity) {
            return false;
        }

        let outcome = state.broadcast();
        tracing::debug!(
            user_id = %identity,
            conn_id,
            delivered = outcome.delivered,
            pruned = outcome.pruned,
            "Departure broadcast"
        );
        true
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.state.lock().connections.len()
    }

    /// Whether a connection is registered under `identity`.
    pub fn is_admitted(&self, identity: &str) -> bool {
        self.state.lock().connections.contains_key(identity)
    }

    /// A copy of the current world state.
    pub fn world_state(&self) -> WorldState {
        self.state.lock().locations.clone()
    }
}
