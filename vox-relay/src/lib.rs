//! # Vox Relay Library (vox-relay)
//!
//! Server-side stream relay for the Vox speech pipeline.
//!
//! **Purpose:** Bridge an upstream LLM token stream onto a one-way SSE
//! event stream for the client, tolerate client disconnects without losing
//! the response, and persist the fully assembled assistant message exactly
//! once per completed generation.

pub mod api;
pub mod db;
pub mod error;
pub mod llm;
pub mod relay;

pub use error::{Error, Result};
