//! Error types for inbound payload handling and server startup.

use thiserror::Error;

/// Errors raised while decoding an inbound WebSocket payload.
///
/// These are always recovered locally: the message is dropped and the
/// connection stays open.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload is not a JSON object with numeric `lat` / `lng` fields.
    #[error("invalid location payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Errors that stop the server from starting or keep it from serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] figment::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}
