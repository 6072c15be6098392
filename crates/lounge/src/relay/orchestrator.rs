use async_stream::stream;
use bytes::Bytes;
use futures::StreamExt;

use super::{fallback, ReplyStream};
use crate::errors::ProviderResult;
use crate::models::message::Message;
use crate::providers::base::DeltaStream;
use crate::providers::configs::{self, AnthropicConfig, OpenAiConfig, ProviderConfig};
use crate::providers::factory;
use crate::providers::utils::{contains_done, encode_frame, ChatChunk, DONE_FRAME};

/// Runtime view of the relay's provider configuration, derived from process
/// configuration at request time. A vendor is usable only while its key is
/// present; usability is re-checked per request.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub preferred_provider: String,
    pub openai_api_key: Option<String>,
    pub openai_host: String,
    pub openai_model: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_host: String,
    pub anthropic_model: String,
    pub anthropic_max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            preferred_provider: "openai".to_string(),
            openai_api_key: None,
            openai_host: configs::OPENAI_HOST.to_string(),
            openai_model: configs::OPENAI_MODEL.to_string(),
            anthropic_api_key: None,
            anthropic_host: configs::ANTHROPIC_HOST.to_string(),
            anthropic_model: configs::ANTHROPIC_MODEL.to_string(),
            anthropic_max_tokens: configs::ANTHROPIC_MAX_TOKENS,
            timeout_secs: configs::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl RelayConfig {
    /// Provider selection, first match wins: the preferred vendor with a
    /// key, then the secondary vendor with a key, then none (degraded
    /// reply, no network call).
    fn select(&self) -> Option<ProviderConfig> {
        if self.preferred_provider == "openai" {
            if let Some(api_key) = non_empty(&self.openai_api_key) {
                return Some(ProviderConfig::OpenAi(OpenAiConfig {
                    host: self.openai_host.clone(),
                    api_key,
                    model: self.openai_model.clone(),
                    timeout_secs: self.timeout_secs,
                }));
            }
        }

        if let Some(api_key) = non_empty(&self.anthropic_api_key) {
            return Some(ProviderConfig::Anthropic(AnthropicConfig {
                host: self.anthropic_host.clone(),
                api_key,
                model: self.anthropic_model.clone(),
                max_tokens: self.anthropic_max_tokens,
                timeout_secs: self.timeout_secs,
            }));
        }

        None
    }
}

fn non_empty(key: &Option<String>) -> Option<String> {
    key.as_deref().filter(|k| !k.is_empty()).map(String::from)
}

/// Produce the reply stream for a conversation. Never fails: any upstream
/// error is logged and absorbed into a degraded reply with the same
/// streaming contract.
pub async fn reply(config: RelayConfig, messages: Vec<Message>) -> ReplyStream {
    match config.select() {
        Some(provider_config) => match open_stream(provider_config, &messages).await {
            Ok(stream) => absorb(stream, fallback::fallback_reply(&messages)),
            Err(error) => {
                tracing::warn!("upstream call failed, using fallback: {}", error);
                fallback::single_chunk_stream(fallback::fallback_reply(&messages))
            }
        },
        None => fallback::simulated_stream(fallback::fallback_reply(&messages)),
    }
}

async fn open_stream(
    config: ProviderConfig,
    messages: &[Message],
) -> ProviderResult<DeltaStream> {
    let provider = factory::get_provider(config)?;
    provider.stream_chat(messages).await
}

/// Forward a live stream, substituting the canned reply on any mid-stream
/// failure so the caller always sees a terminated, well-formed stream.
fn absorb(mut upstream: DeltaStream, fallback_text: String) -> ReplyStream {
    let stream = stream! {
        let mut terminated = false;
        while let Some(frame) = upstream.next().await {
            match frame {
                Ok(bytes) => {
                    if contains_done(&bytes) {
                        terminated = true;
                    }
                    yield bytes;
                }
                Err(error) => {
                    tracing::warn!("reply stream interrupted, using fallback: {}", error);
                    yield encode_frame(&ChatChunk::of_text(fallback_text.clone()));
                    yield Bytes::from_static(DONE_FRAME);
                    terminated = true;
                    break;
                }
            }
        }
        if !terminated {
            yield Bytes::from_static(DONE_FRAME);
        }
    };

    Box::pin(stream)
}
