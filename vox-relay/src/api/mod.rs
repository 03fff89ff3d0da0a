//! HTTP API for the relay service

pub mod handlers;
pub mod server;

pub use server::{create_router, AppContext};
