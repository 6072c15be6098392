use async_stream::try_stream;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::timeout;

use super::base::{DeltaStream, Provider};
use super::configs::AnthropicConfig;
use super::utils::{data_payload, encode_frame, ChatChunk, SseBuffer, DONE_FRAME, DONE_PAYLOAD};
use crate::errors::{ProviderError, ProviderResult};
use crate::models::message::{self, Message};
use crate::models::role::Role;

const PROVIDER: &str = "anthropic";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic messages adapter. The vendor's event schema differs from the
/// canonical framing, so each `content_block_delta` event is re-encoded as a
/// canonical chunk before forwarding.
pub struct AnthropicProvider {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        Ok(Self { client, config })
    }

    /// The first system turn becomes the `system` parameter; remaining
    /// system turns are dropped, everything else is sent as conversation
    /// turns.
    fn split_conversation(messages: &[Message]) -> (String, Vec<Value>) {
        let system = message::system_preamble(messages)
            .unwrap_or_default()
            .to_string();

        let turns = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| json!({ "role": m.role, "content": m.content }))
            .collect();

        (system, turns)
    }
}

/// Text carried by a `content_block_delta` event line. Anything else,
/// including lines that fail to parse, is skipped.
fn delta_text(line: &str) -> Option<String> {
    let payload = data_payload(line)?;
    if payload == DONE_PAYLOAD {
        return None;
    }

    let event: Value = serde_json::from_str(payload).ok()?;
    if event.get("type").and_then(Value::as_str) != Some("content_block_delta") {
        return None;
    }

    event
        .get("delta")
        .and_then(|delta| delta.get("text"))
        .and_then(Value::as_str)
        .map(String::from)
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn stream_chat(&self, messages: &[Message]) -> ProviderResult<DeltaStream> {
        if self.config.api_key.is_empty() {
            return Err(ProviderError::MissingApiKey { provider: PROVIDER });
        }

        let (system, turns) = Self::split_conversation(messages);

        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));
        let payload = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "system": system,
            "messages": turns,
            "stream": true,
        });

        let request = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send();

        let response = timeout(Duration::from_secs(self.config.timeout_secs), request)
            .await
            .map_err(|_| ProviderError::Timeout {
                provider: PROVIDER,
                seconds: self.config.timeout_secs,
            })?
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Request {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            });
        }

        let mut upstream = response.bytes_stream();
        let stream = try_stream! {
            let mut buffer = SseBuffer::new();
            while let Some(chunk) = upstream.next().await {
                let chunk = chunk.map_err(|e| ProviderError::transport(PROVIDER, e))?;
                for line in buffer.push(&chunk) {
                    if let Some(text) = delta_text(&line) {
                        yield encode_frame(&ChatChunk::of_text(text));
                    }
                }
            }
            yield Bytes::from_static(DONE_FRAME);
        };

        Ok(Box::pin(stream))
    }
}
