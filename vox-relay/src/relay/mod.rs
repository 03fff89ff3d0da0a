//! Stream relay loop
//!
//! Bridges one upstream token stream onto a downstream frame sink. The
//! downstream is an `mpsc` sender whose receiving half backs the SSE
//! response body, so a dropped client surfaces as a send error here.
//!
//! Invariants:
//! - downstream frames preserve upstream delta order
//! - exactly one persistence write per completed session, never more
//! - a disconnected client never prevents the message from being saved
//! - an upstream failure or external cancellation never triggers
//!   persistence of a partial message

pub mod session;

pub use session::{SessionState, StreamSession};

use crate::db::MessageStore;
use crate::llm::{TokenEvent, TokenStream};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use vox_common::StreamFrame;

/// Drive one session: forward deltas downstream, persist on completion,
/// emit exactly one terminal frame, and return the finished session.
pub async fn run(
    mut session: StreamSession,
    mut upstream: TokenStream,
    sink: mpsc::Sender<StreamFrame>,
    store: Arc<dyn MessageStore>,
    cancel: watch::Receiver<bool>,
) -> StreamSession {
    let cancelled = cancelled_flag(cancel);
    tokio::pin!(cancelled);

    loop {
        let event = tokio::select! {
            _ = &mut cancelled => {
                // Abort before completion: close downstream, no persistence.
                info!(chat_id = %session.chat_id(), "relay cancelled before completion");
                session.set_state(SessionState::ClientDisconnected);
                return session;
            }
            event = upstream.next() => event,
        };

        match event {
            Some(Ok(TokenEvent::Delta(delta))) => {
                session.push_delta(&delta);
                if !session.is_disconnected()
                    && sink.send(StreamFrame::content(delta)).await.is_err()
                {
                    // Client went away; keep draining the upstream so the
                    // full message can still be persisted.
                    warn!(chat_id = %session.chat_id(), "downstream closed, draining upstream");
                    session.set_state(SessionState::ClientDisconnected);
                }
            }

            Some(Ok(TokenEvent::Done)) => {
                let terminal = match store
                    .save_assistant_message(session.chat_id(), session.text())
                    .await
                {
                    Ok(message) => {
                        info!(
                            chat_id = %session.chat_id(),
                            message_id = %message.id,
                            chars = session.text().chars().count(),
                            "assistant message persisted"
                        );
                        session.set_saved(message.clone());
                        StreamFrame::done(message)
                    }
                    Err(e) => {
                        // The content is still in the session for the
                        // caller; the client learns via the error frame.
                        warn!(chat_id = %session.chat_id(), "failed to persist assistant message: {e}");
                        StreamFrame::error(format!("Failed to save message: {e}"))
                    }
                };

                if !session.is_disconnected() {
                    let _ = sink.send(terminal).await;
                    session.set_state(SessionState::Done);
                }
                return session;
            }

            Some(Err(e)) => {
                warn!(chat_id = %session.chat_id(), "upstream failed before completion: {e}");
                if !session.is_disconnected() {
                    let _ = sink.send(StreamFrame::error(e.to_string())).await;
                    session.set_state(SessionState::Error);
                }
                return session;
            }

            None => {
                // Exhausted without the completion sentinel.
                warn!(chat_id = %session.chat_id(), "upstream ended without completion sentinel");
                if !session.is_disconnected() {
                    let _ = sink
                        .send(StreamFrame::error("Upstream ended unexpectedly".to_string()))
                        .await;
                    session.set_state(SessionState::Error);
                }
                return session;
            }
        }
    }
}

/// Resolve once the cancel flag flips to true; pend forever otherwise.
async fn cancelled_flag(mut cancel: watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            debug!("cancellation flag observed");
            return;
        }
        if cancel.changed().await.is_err() {
            // Sender dropped without cancelling: cancellation can no
            // longer happen.
            std::future::pending::<()>().await;
        }
    }
}
