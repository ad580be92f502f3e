use axum::extract::ws::Message;

use super::registry::{Delivery, LocationRelay, RelayState};
use crate::ws::protocol::{self, Location};

/// What one broadcast pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub delivered: usize,
    /// Connections whose queue was full; they get the next pass instead.
    pub skipped: usize,
    /// Connections removed from the registry because their writer was gone.
    pub pruned: usize,
}

impl RelayState {
    /// Serialize the world state once and hand it to every registered connection.
    ///
    /// Closed connections are removed from the registry. Their location entries
    /// stay until the owning task's disconnect path evicts them.
    pub(crate) fn broadcast(&mut self) -> BroadcastOutcome {
        let mut outcome = BroadcastOutcome::default();

        let json = match protocol::encode_world_state(&self.locations) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode world state");
                return outcome;
            }
        };
        let msg = Message::Text(json.into());

        self.connections.retain(|user_id, conn| match conn.deliver(msg.clone()) {
            Delivery::Sent => {
                outcome.delivered += 1;
                true
            }
            Delivery::Skipped => {
                outcome.skipped += 1;
                tracing::debug!(
                    user_id = %user_id,
                    conn_id = conn.id,
                    dropped = conn.dropped_messages(),
                    "Outbound queue full, skipping broadcast"
                );
                true
            }
            Delivery::Closed => {
                outcome.pruned += 1;
                tracing::warn!(
                    user_id = %user_id,
                    conn_id = conn.id,
                    "Write to client failed, removing connection"
                );
                false
            }
        });

        outcome
    }
}

impl LocationRelay {
    /// Store `location` for `identity` and broadcast, as one step under the lock.
    pub fn update_location(&self, identity: &str, location: Location) -> BroadcastOutcome {
        let mut state = self.state.lock();
        state.locations.insert(identity.to_string(), location);
        state.broadcast()
    }

    /// Send the current world state to every registered connection.
    pub fn broadcast_all(&self) -> BroadcastOutcome {
        self.state.lock().broadcast()
    }
}
