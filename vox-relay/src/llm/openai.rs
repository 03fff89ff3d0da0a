//! OpenAI-compatible streaming chat client
//!
//! Speaks the `chat/completions` streaming wire format: the response body
//! is a sequence of `data: <json>` lines carrying content deltas, closed by
//! the `data: [DONE]` sentinel. Individual lines that fail to parse are
//! skipped and logged; they never terminate the session.

use crate::llm::{ChatClient, TokenEvent, TokenStream};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Default public endpoint; overridden for local providers.
const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Streaming client for OpenAI-compatible chat providers.
pub struct OpenAiChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChatClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Build a client from `VOX_LLM_BASE_URL`, `VOX_LLM_API_KEY` (falling
    /// back to `OPENAI_API_KEY`) and `VOX_LLM_MODEL`.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("VOX_LLM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let api_key = std::env::var("VOX_LLM_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .map_err(|_| {
                Error::Config("VOX_LLM_API_KEY or OPENAI_API_KEY must be set".to_string())
            })?;
        let model = std::env::var("VOX_LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self::new(base_url, api_key, model))
    }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn stream_chat(&self, prompt: &str) -> Result<TokenStream> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "stream": true,
            "messages": [
                { "role": "user", "content": prompt }
            ]
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("request failed: {e}")))?
            .error_for_status()
            .map_err(|e| Error::Upstream(format!("provider returned error: {e}")))?;

        debug!("upstream chat stream opened: model={}", self.model);

        let mut bytes = response.bytes_stream();
        let stream = async_stream::stream! {
            // Byte buffer: a multi-byte character may be split across
            // network chunks, so decoding happens per complete line.
            let mut line_buf: Vec<u8> = Vec::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(Error::Upstream(format!("stream read failed: {e}")));
                        return;
                    }
                };

                line_buf.extend_from_slice(&chunk);

                while let Some(pos) = line_buf.iter().position(|&b| b == b'\n') {
                    let line_bytes: Vec<u8> = line_buf.drain(..=pos).collect();
                    let Ok(line) = String::from_utf8(line_bytes) else {
                        warn!("Skipping non-UTF-8 upstream frame");
                        continue;
                    };
                    match parse_provider_line(line.trim()) {
                        ParsedLine::Delta(text) => yield Ok(TokenEvent::Delta(text)),
                        ParsedLine::Done => {
                            yield Ok(TokenEvent::Done);
                            return;
                        }
                        ParsedLine::Skip => {}
                    }
                }
            }
            // Body ended without the sentinel; the relay handles this as an
            // upstream failure when the stream ends here.
        };

        Ok(Box::pin(stream))
    }
}

/// Result of parsing one provider wire line.
#[derive(Debug, PartialEq, Eq)]
enum ParsedLine {
    Delta(String),
    Done,
    Skip,
}

/// Parse one line of the provider stream.
///
/// Anything that is not a well-formed content delta or the sentinel is
/// skipped: empty keep-alive lines, role preludes, finish-reason frames and
/// malformed JSON.
fn parse_provider_line(line: &str) -> ParsedLine {
    let Some(payload) = line.strip_prefix("data:") else {
        return ParsedLine::Skip;
    };
    let payload = payload.trim();

    if payload == "[DONE]" {
        return ParsedLine::Done;
    }

    match serde_json::from_str::<Value>(payload) {
        Ok(value) => match value["choices"][0]["delta"]["content"].as_str() {
            Some(content) if !content.is_empty() => ParsedLine::Delta(content.to_string()),
            _ => ParsedLine::Skip,
        },
        Err(e) => {
            warn!("Skipping malformed upstream frame: {}", e);
            ParsedLine::Skip
        }
    }
}
