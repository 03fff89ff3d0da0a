//! Wire-frame types for the downstream event stream
//!
//! The relay emits a one-way stream of frames, each serialized as one SSE
//! `data: <json>` line. The JSON shapes are an external contract:
//!
//! - content delta: `{"content": "..."}`
//! - terminal success: `{"done": true, "message": {...}}`
//! - terminal failure: `{"error": "..."}`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted chat message record.
///
/// Returned by the persistence boundary after the relay saves the fully
/// assembled assistant response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Build a fresh assistant message record for `chat_id`.
    pub fn assistant(chat_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat_id,
            role: "assistant".to_string(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// One frame of the downstream event stream.
///
/// Exactly one terminal frame (`Done` or `Error`) closes every stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamFrame {
    /// One incremental content delta, forwarded in upstream order.
    Content { content: String },

    /// Terminal frame: generation completed and the message was persisted.
    Done { done: bool, message: ChatMessage },

    /// Terminal frame: upstream failed mid-generation, or persistence
    /// failed after a completed generation.
    Error { error: String },
}

impl StreamFrame {
    /// Content delta frame.
    pub fn content(delta: impl Into<String>) -> Self {
        StreamFrame::Content {
            content: delta.into(),
        }
    }

    /// Terminal success frame carrying the persisted record.
    pub fn done(message: ChatMessage) -> Self {
        StreamFrame::Done {
            done: true,
            message,
        }
    }

    /// Terminal error frame.
    pub fn error(reason: impl Into<String>) -> Self {
        StreamFrame::Error {
            error: reason.into(),
        }
    }

    /// True for the frames that close the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamFrame::Content { .. })
    }
}
