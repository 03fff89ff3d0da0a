//! Database access layer
//!
//! Message persistence for completed relay sessions.

pub mod messages;

pub use messages::{MessageStore, SqliteStore};
