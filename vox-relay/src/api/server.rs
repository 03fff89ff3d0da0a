//! HTTP server setup and routing
//!
//! Sets up the Axum router for the chat stream endpoint and health check.

use crate::db::MessageStore;
use crate::llm::ChatClient;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application context passed to all handlers
///
/// AppContext implements Clone, which gives us `FromRef<AppContext>` for
/// free via Axum's blanket implementation.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn MessageStore>,
    pub llm: Arc<dyn ChatClient>,
    /// Flipped to true on shutdown; relay loops observe it at every
    /// suspension point.
    pub shutdown: watch::Receiver<bool>,
}

/// Build the application router with all routes and middleware.
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(super::handlers::health))
        .route("/api/chats/:chat_id/stream", post(super::handlers::chat_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
