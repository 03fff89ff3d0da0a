//! Relay loop integration tests
//!
//! Drives the relay against scripted upstreams and a real (in-memory)
//! SQLite store, observing the downstream frames and the persistence side
//! effects.

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;
use vox_common::{ChatMessage, StreamFrame};
use vox_relay::db::{MessageStore, SqliteStore};
use vox_relay::llm::{TokenEvent, TokenStream};
use vox_relay::relay::{self, SessionState, StreamSession};
use vox_relay::Error;

fn scripted_upstream(events: Vec<vox_relay::Result<TokenEvent>>) -> TokenStream {
    Box::pin(stream::iter(events))
}

fn completed_upstream(deltas: &[&str]) -> TokenStream {
    let mut events: Vec<vox_relay::Result<TokenEvent>> = deltas
        .iter()
        .map(|d| Ok(TokenEvent::Delta(d.to_string())))
        .collect();
    events.push(Ok(TokenEvent::Done));
    scripted_upstream(events)
}

async fn memory_store() -> Arc<SqliteStore> {
    let pool = SqlitePoolOptions::new()
        .connect("sqlite::memory:")
        .await
        .unwrap();
    SqliteStore::init(&pool).await.unwrap();
    Arc::new(SqliteStore::new(pool))
}

fn no_cancel() -> watch::Receiver<bool> {
    // Dropping the sender means cancellation can never fire.
    let (_tx, rx) = watch::channel(false);
    rx
}

/// Run the relay to completion and collect every downstream frame.
async fn run_collecting(
    chat_id: Uuid,
    upstream: TokenStream,
    store: Arc<dyn MessageStore>,
) -> (StreamSession, Vec<StreamFrame>) {
    let (tx, mut rx) = mpsc::channel(64);
    let session = relay::run(StreamSession::new(chat_id), upstream, tx, store, no_cancel()).await;

    let mut frames = Vec::new();
    while let Some(frame) = rx.recv().await {
        frames.push(frame);
    }
    (session, frames)
}

fn content_concat(frames: &[StreamFrame]) -> String {
    frames
        .iter()
        .filter_map(|f| match f {
            StreamFrame::Content { content } => Some(content.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn forwards_deltas_in_order_and_persists_once() {
    let store = memory_store().await;
    let chat_id = Uuid::new_v4();

    let (session, frames) = run_collecting(
        chat_id,
        completed_upstream(&["Hello", ", ", "world", "!"]),
        store.clone(),
    )
    .await;

    assert_eq!(content_concat(&frames), "Hello, world!");

    // Every frame except the last is a content delta, in upstream order.
    let (terminal, deltas) = frames.split_last().unwrap();
    assert!(deltas.iter().all(|f| !f.is_terminal()));

    match terminal {
        StreamFrame::Done { done, message } => {
            assert!(*done);
            assert_eq!(message.chat_id, chat_id);
            assert_eq!(message.content, "Hello, world!");
            assert_eq!(message.role, "assistant");
        }
        other => panic!("expected Done terminal frame, got {other:?}"),
    }

    assert_eq!(session.state(), SessionState::Done);
    assert_eq!(session.saved().unwrap().content, "Hello, world!");
    assert_eq!(store.count_for_chat(chat_id).await.unwrap(), 1);
}

#[tokio::test]
async fn long_streams_concatenate_exactly() {
    let store = memory_store().await;
    let chat_id = Uuid::new_v4();

    let deltas: Vec<String> = (0..50).map(|i| format!("token{i} ")).collect();
    let refs: Vec<&str> = deltas.iter().map(|s| s.as_str()).collect();
    let expected: String = deltas.concat();

    let (session, frames) = run_collecting(chat_id, completed_upstream(&refs), store).await;

    assert_eq!(content_concat(&frames), expected);
    assert_eq!(session.text(), expected);
}

#[tokio::test]
async fn client_disconnect_still_persists_full_message() {
    let store = memory_store().await;
    let chat_id = Uuid::new_v4();

    let (tx, mut rx) = mpsc::channel(4);
    let handle = tokio::spawn(relay::run(
        StreamSession::new(chat_id),
        completed_upstream(&["one ", "two ", "three ", "four ", "five"]),
        tx,
        store.clone() as Arc<dyn MessageStore>,
        no_cancel(),
    ));

    // Consume one frame, then disconnect.
    let first = rx.recv().await.unwrap();
    assert_eq!(first, StreamFrame::content("one "));
    drop(rx);

    let session = handle.await.unwrap();

    assert!(session.is_disconnected());
    assert_eq!(session.text(), "one two three four five");
    // The disconnect did not prevent the save.
    assert_eq!(store.count_for_chat(chat_id).await.unwrap(), 1);
    assert_eq!(
        session.saved().unwrap().content,
        "one two three four five"
    );
}

#[tokio::test]
async fn upstream_failure_emits_error_frame_and_skips_persistence() {
    let store = memory_store().await;
    let chat_id = Uuid::new_v4();

    let upstream = scripted_upstream(vec![
        Ok(TokenEvent::Delta("partial ".to_string())),
        Err(Error::Upstream("connection reset".to_string())),
    ]);

    let (session, frames) = run_collecting(chat_id, upstream, store.clone()).await;

    assert_eq!(session.state(), SessionState::Error);
    assert_eq!(store.count_for_chat(chat_id).await.unwrap(), 0);

    match frames.last().unwrap() {
        StreamFrame::Error { error } => assert!(error.contains("connection reset")),
        other => panic!("expected Error terminal frame, got {other:?}"),
    }
}

#[tokio::test]
async fn upstream_ending_without_sentinel_is_a_failure() {
    let store = memory_store().await;
    let chat_id = Uuid::new_v4();

    let upstream = scripted_upstream(vec![Ok(TokenEvent::Delta("text".to_string()))]);
    let (session, frames) = run_collecting(chat_id, upstream, store.clone()).await;

    assert_eq!(session.state(), SessionState::Error);
    assert_eq!(store.count_for_chat(chat_id).await.unwrap(), 0);
    assert!(matches!(
        frames.last().unwrap(),
        StreamFrame::Error { .. }
    ));
}

/// Store whose writes always fail, for the persistence-failure path.
struct FailingStore;

#[async_trait]
impl MessageStore for FailingStore {
    async fn save_assistant_message(
        &self,
        _chat_id: Uuid,
        _content: &str,
    ) -> vox_relay::Result<ChatMessage> {
        Err(Error::Internal("disk full".to_string()))
    }
}

#[tokio::test]
async fn persistence_failure_surfaces_as_terminal_error_frame() {
    let chat_id = Uuid::new_v4();

    let (session, frames) = run_collecting(
        chat_id,
        completed_upstream(&["the ", "answer"]),
        Arc::new(FailingStore),
    )
    .await;

    // Generation completed; the caller still has the content in memory.
    assert_eq!(session.state(), SessionState::Done);
    assert_eq!(session.text(), "the answer");
    assert!(session.saved().is_none());

    match frames.last().unwrap() {
        StreamFrame::Error { error } => assert!(error.contains("Failed to save message")),
        other => panic!("expected Error terminal frame, got {other:?}"),
    }
}

#[tokio::test]
async fn cancellation_before_completion_skips_persistence() {
    let store = memory_store().await;
    let chat_id = Uuid::new_v4();

    // One delta, then the upstream hangs forever.
    let upstream: TokenStream = Box::pin(
        stream::iter(vec![Ok(TokenEvent::Delta("hi ".to_string()))])
            .chain(stream::pending()),
    );

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let (tx, mut rx) = mpsc::channel(8);

    let handle = tokio::spawn(relay::run(
        StreamSession::new(chat_id),
        upstream,
        tx,
        store.clone() as Arc<dyn MessageStore>,
        cancel_rx,
    ));

    assert_eq!(rx.recv().await.unwrap(), StreamFrame::content("hi "));

    cancel_tx.send(true).unwrap();
    let session = handle.await.unwrap();

    // Downstream closes without a terminal frame and nothing is saved.
    assert!(rx.recv().await.is_none());
    assert!(session.saved().is_none());
    assert_eq!(store.count_for_chat(chat_id).await.unwrap(), 0);
}
