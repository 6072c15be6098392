use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tokio::time::timeout;

use super::base::{DeltaStream, Provider};
use super::configs::OpenAiConfig;
use crate::errors::{ProviderError, ProviderResult};
use crate::models::message::Message;

const PROVIDER: &str = "openai";

/// OpenAI chat-completions adapter. Its wire format already matches the
/// canonical framing, so the response body is forwarded byte for byte with
/// no line-level reparsing.
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn stream_chat(&self, messages: &[Message]) -> ProviderResult<DeltaStream> {
        if self.config.api_key.is_empty() {
            return Err(ProviderError::MissingApiKey { provider: PROVIDER });
        }

        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let payload = json!({
            "model": self.config.model,
            "messages": messages,
            "stream": true,
        });

        let request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
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

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ProviderError::transport(PROVIDER, e)));

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(host: String, api_key: &str) -> OpenAiConfig {
        OpenAiConfig {
            host,
            api_key: api_key.to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 5,
        }
    }

    fn messages() -> Vec<Message> {
        vec![
            Message::system("You are Lily."),
            Message::user("hello"),
        ]
    }

    #[tokio::test]
    async fn test_stream_chat_is_a_pure_proxy() -> Result<()> {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n\
                    data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n\
                    data: [DONE]\n\n";

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test_api_key"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&mock_server)
            .await;

        let provider = OpenAiProvider::new(test_config(mock_server.uri(), "test_api_key"))?;
        let mut stream = provider.stream_chat(&messages()).await?;

        let mut forwarded = Vec::new();
        while let Some(chunk) = stream.next().await {
            forwarded.extend_from_slice(&chunk?);
        }
        assert_eq!(forwarded, body.as_bytes());

        Ok(())
    }

    #[tokio::test]
    async fn test_stream_chat_error_status_carries_body() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&mock_server)
            .await;

        let provider = OpenAiProvider::new(test_config(mock_server.uri(), "test_api_key"))?;
        let error = provider.stream_chat(&messages()).await.err().unwrap();

        match error {
            ProviderError::Request { status, body, .. } => {
                assert_eq!(status, 500);
                assert_eq!(body, "upstream exploded");
            }
            other => panic!("expected Request error, got {:?}", other),
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_stream_chat_missing_key_never_hits_network() -> Result<()> {
        // No mock mounted: a network attempt would error differently.
        let provider = OpenAiProvider::new(test_config("http://127.0.0.1:9".to_string(), ""))?;
        let error = provider.stream_chat(&messages()).await.err().unwrap();
        assert!(matches!(error, ProviderError::MissingApiKey { .. }));

        Ok(())
    }
}
