//! Database layer: user accounts and login sessions.
//!
//! Rooms and message history are deliberately not persisted; they live in
//! the in-memory registry and die with the process.

pub mod models;
pub mod operations;

pub use models::{User, UserSession};
pub use operations::DbOperations;
