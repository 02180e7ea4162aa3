//! WebSocket transport for the chat core.
//!
//! Parses client frames, forwards server events, and guarantees the
//! disconnect cleanup hook runs on every exit path.

mod connection;
mod server;

pub use connection::{ClientMessage, Connection};
pub use server::ChatServer;
