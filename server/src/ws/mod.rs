pub mod actor;
pub mod broadcast;
pub mod handler;
pub mod protocol;
pub mod registry;

use tokio::sync::mpsc;

pub use broadcast::BroadcastOutcome;
pub use protocol::{Location, WorldState};
pub use registry::{ClientConnection, LocationRelay};

/// Sender half of a WebSocket connection's bounded outbound queue.
/// The connection's writer task owns the receiver and drains it into the socket.
pub type ConnectionSender = mpsc::Sender<axum::extract::ws::Message>;
