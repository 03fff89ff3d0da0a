//! Upstream LLM token stream client

pub mod openai;

pub use openai::OpenAiChatClient;

use crate::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// One frame of the upstream token stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEvent {
    /// One incremental fragment of generated text.
    Delta(String),
    /// The provider's explicit completion sentinel.
    Done,
}

/// Boxed upstream token stream.
///
/// Yields `Err` for transport failures; ends after [`TokenEvent::Done`] on
/// a normal completion. A stream that ends without the sentinel is treated
/// by the relay as an upstream failure.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<TokenEvent>> + Send>>;

/// Streaming chat provider.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Start one response generation for `prompt`.
    async fn stream_chat(&self, prompt: &str) -> Result<TokenStream>;
}
