//! HTTP API integration tests
//!
//! Exercises the chat stream endpoint end to end: request in, SSE frames
//! out, one persisted row.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use futures::stream;
use http_body_util::BodyExt;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tokio::sync::watch;
use tower::ServiceExt;
use uuid::Uuid;
use vox_relay::api::{create_router, AppContext};
use vox_relay::db::SqliteStore;
use vox_relay::llm::{ChatClient, TokenEvent, TokenStream};

/// Provider double replaying a fixed script for every request.
struct ScriptedClient {
    events: Vec<TokenEvent>,
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn stream_chat(&self, _prompt: &str) -> vox_relay::Result<TokenStream> {
        let events = self.events.clone();
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}

async fn test_context(events: Vec<TokenEvent>) -> (AppContext, Arc<SqliteStore>) {
    let pool = SqlitePoolOptions::new()
        .connect("sqlite::memory:")
        .await
        .unwrap();
    SqliteStore::init(&pool).await.unwrap();
    let store = Arc::new(SqliteStore::new(pool));

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let ctx = AppContext {
        store: store.clone(),
        llm: Arc::new(ScriptedClient { events }),
        shutdown: shutdown_rx,
    };
    (ctx, store)
}

fn chat_request(chat_id: Uuid, message: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/api/chats/{chat_id}/stream"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(format!("{{\"message\":\"{message}\"}}")))
        .unwrap()
}

#[tokio::test]
async fn chat_stream_emits_sse_frames_and_persists() {
    let events = vec![
        TokenEvent::Delta("Hello".to_string()),
        TokenEvent::Delta(" world".to_string()),
        TokenEvent::Done,
    ];
    let (ctx, store) = test_context(events).await;
    let chat_id = Uuid::new_v4();

    let response = create_router(ctx)
        .oneshot(chat_request(chat_id, "hi"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap(),
        "text/event-stream"
    );

    // The body completes once the relay closes the stream.
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8(body.to_vec()).unwrap();

    assert!(body.contains(r#"data: {"content":"Hello"}"#));
    assert!(body.contains(r#"data: {"content":" world"}"#));
    assert!(body.contains(r#""done":true"#));
    assert!(body.contains(r#""content":"Hello world""#));

    assert_eq!(store.count_for_chat(chat_id).await.unwrap(), 1);
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let (ctx, store) = test_context(vec![TokenEvent::Done]).await;
    let chat_id = Uuid::new_v4();

    let response = create_router(ctx)
        .oneshot(chat_request(chat_id, "   "))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.count_for_chat(chat_id).await.unwrap(), 0);
}

#[tokio::test]
async fn health_reports_module() {
    let (ctx, _store) = test_context(vec![]).await;

    let response = create_router(ctx)
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "vox-relay");
}
