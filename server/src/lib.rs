//! Real-time location sharing relay.
//!
//! Clients connect to `/ws?userID=<id>`, report `{"lat", "lng"}` JSON objects,
//! and receive the full map of every connected client's last location on each
//! update. The binary entry point is in main.rs.

pub mod config;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;
pub mod ws;

pub use error::{ProtocolError, ServerError};
