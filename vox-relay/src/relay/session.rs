//! Per-request stream session
//!
//! One `StreamSession` exists per response generation and travels through
//! the relay loop explicitly, so the relay is re-entrant and testable
//! without shared process-wide state.

use uuid::Uuid;
use vox_common::ChatMessage;

/// Lifecycle of one relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Upstream still producing deltas.
    Open,
    /// Upstream completed normally; persistence was attempted.
    Done,
    /// Upstream failed before the completion sentinel.
    Error,
    /// The downstream consumer went away; draining continued without it.
    ClientDisconnected,
}

/// State for one response-generation pass.
///
/// Owned exclusively by the relay loop for the duration of one request and
/// destroyed when the downstream stream closes.
#[derive(Debug)]
pub struct StreamSession {
    chat_id: Uuid,
    /// Append-only accumulation of every delta seen so far.
    accumulated: String,
    state: SessionState,
    /// The persisted record, once the completed session was saved.
    saved: Option<ChatMessage>,
}

impl StreamSession {
    pub fn new(chat_id: Uuid) -> Self {
        Self {
            chat_id,
            accumulated: String::new(),
            state: SessionState::Open,
            saved: None,
        }
    }

    pub fn chat_id(&self) -> Uuid {
        self.chat_id
    }

    /// Append one upstream delta.
    pub fn push_delta(&mut self, delta: &str) {
        self.accumulated.push_str(delta);
    }

    /// Full text accumulated so far.
    pub fn text(&self) -> &str {
        &self.accumulated
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    /// True once the downstream consumer is known to be gone.
    pub fn is_disconnected(&self) -> bool {
        self.state == SessionState::ClientDisconnected
    }

    pub fn set_saved(&mut self, message: ChatMessage) {
        self.saved = Some(message);
    }

    /// The persisted record, if this session completed and was saved.
    pub fn saved(&self) -> Option<&ChatMessage> {
        self.saved.as_ref()
    }
}
