//! HTTP request handlers
//!
//! The chat stream handler wires one request into the relay loop: it opens
//! the upstream token stream, spawns the relay onto the runtime (so a
//! client disconnect never aborts the drain), and returns the receiving
//! half of the frame channel as the SSE body.

use crate::api::server::AppContext;
use crate::error::{Error, Result};
use crate::relay::{self, StreamSession};
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};
use uuid::Uuid;

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": "vox-relay",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ChatStreamRequest {
    pub message: String,
}

/// POST /api/chats/:chat_id/stream
///
/// Starts one response generation and streams it back as SSE frames, each
/// `data: <json>`; the terminal frame carries the persisted record or a
/// persistence-failure notice.
pub async fn chat_stream(
    State(ctx): State<AppContext>,
    Path(chat_id): Path<Uuid>,
    Json(request): Json<ChatStreamRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    if request.message.trim().is_empty() {
        return Err(Error::BadRequest("message must not be empty".to_string()));
    }

    debug!(%chat_id, chars = request.message.chars().count(), "chat stream requested");

    let upstream = ctx.llm.stream_chat(&request.message).await?;
    let session = StreamSession::new(chat_id);

    let (tx, rx) = mpsc::channel(64);
    let store = ctx.store.clone();
    let cancel = ctx.shutdown.clone();

    tokio::spawn(async move {
        let session = relay::run(session, upstream, tx, store, cancel).await;
        debug!(
            chat_id = %session.chat_id(),
            state = ?session.state(),
            "relay session finished"
        );
    });

    let stream = ReceiverStream::new(rx).filter_map(|frame| async move {
        match serde_json::to_string(&frame) {
            Ok(json) => Some(Ok(Event::default().data(json))),
            Err(e) => {
                warn!("Failed to serialize frame: {}", e);
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}
