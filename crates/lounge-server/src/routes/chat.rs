use axum::{
    extract::State,
    http::{self, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::{stream::StreamExt, Stream};
use serde_json::{json, Value};
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use lounge::models::message::Message;
use lounge::relay::orchestrator;

use crate::state::AppState;

/// SSE response forwarding the relay's reply stream verbatim.
pub struct SseResponse {
    rx: ReceiverStream<Bytes>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<Bytes>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx).poll_next(cx).map(|opt| opt.map(Ok))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> axum::response::Response {
        let body = axum::body::Body::from_stream(self);

        http::Response::builder()
            .header("Content-Type", "text/event-stream")
            .header("Cache-Control", "no-cache")
            .header("Connection", "keep-alive")
            .body(body)
            .unwrap()
    }
}

async fn chat_handler(State(state): State<AppState>, body: Bytes) -> axum::response::Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(error) => {
            tracing::error!("failed to parse chat request: {}", error);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process chat request",
            );
        }
    };

    let messages_value = match payload.get("messages") {
        Some(value) if value.is_array() => value.clone(),
        _ => return error_response(StatusCode::BAD_REQUEST, "Messages array is required"),
    };

    let messages: Vec<Message> = match serde_json::from_value(messages_value) {
        Ok(messages) => messages,
        Err(error) => {
            tracing::warn!("rejected malformed message entry: {}", error);
            return error_response(StatusCode::BAD_REQUEST, "Messages array is malformed");
        }
    };

    // Create channel for streaming
    let (tx, rx) = mpsc::channel(100);
    let relay_config = state.relay.clone();

    // Spawn task to drive the upstream; a closed channel means the client
    // disconnected, and dropping the stream releases the upstream reader.
    tokio::spawn(async move {
        let mut stream = orchestrator::reply(relay_config, messages).await;
        while let Some(frame) = stream.next().await {
            if tx.send(frame).await.is_err() {
                break;
            }
        }
    });

    SseResponse::new(ReceiverStream::new(rx)).into_response()
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (status, Json(json!({ "error": message }))).into_response()
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use lounge::relay::orchestrator::RelayConfig;
    use lounge::voice::VoiceConfig;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_state(relay: RelayConfig) -> AppState {
        AppState {
            relay,
            voice: VoiceConfig::default(),
            backend_url: "http://localhost:8000".to_string(),
        }
    }

    fn chat_request(body: &str) -> http::Request<axum::body::Body> {
        http::Request::builder()
            .method("POST")
            .uri("/chat")
            .header("Content-Type", "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let collected = response.into_body().collect().await.unwrap();
        String::from_utf8_lossy(&collected.to_bytes()).into_owned()
    }

    fn reconstruct(sse_body: &str) -> String {
        let mut text = String::new();
        for line in sse_body.lines() {
            if let Some(payload) = line.strip_prefix("data:").map(str::trim) {
                if payload == "[DONE]" {
                    continue;
                }
                if let Ok(value) = serde_json::from_str::<Value>(payload) {
                    if let Some(content) = value["choices"][0]["delta"]["content"].as_str() {
                        text.push_str(content);
                    }
                }
            }
        }
        text
    }

    #[tokio::test]
    async fn test_missing_messages_is_a_validation_error() {
        let app = routes(test_state(RelayConfig::default()));
        let response = app.oneshot(chat_request("{}")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_text(response).await;
        assert!(body.contains("error"));
    }

    #[tokio::test]
    async fn test_non_array_messages_is_a_validation_error() {
        let app = routes(test_state(RelayConfig::default()));
        let response = app
            .oneshot(chat_request("{\"messages\": \"not an array\"}"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unparseable_body_is_a_server_error() {
        let app = routes(test_state(RelayConfig::default()));
        let response = app.oneshot(chat_request("{not json")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_text(response).await;
        assert!(body.contains("Failed to process chat request"));
    }

    #[tokio::test]
    async fn test_no_keys_still_streams_a_greeting() {
        let app = routes(test_state(RelayConfig::default()));
        let body = "{\"messages\": [\
            {\"role\": \"system\", \"content\": \"You are Lily, a lounge guide.\"},\
            {\"role\": \"user\", \"content\": \"hello\"}\
        ]}";
        let response = app.oneshot(chat_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("Content-Type").unwrap(),
            "text/event-stream"
        );

        let sse = body_text(response).await;
        assert!(sse.trim_end().ends_with("data: [DONE]"));
        assert_eq!(reconstruct(&sse), "Hello! I'm Lily. How can I help you today?");
    }

    #[tokio::test]
    async fn test_upstream_failure_is_absorbed() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&mock_server)
            .await;

        let relay = RelayConfig {
            openai_api_key: Some("test-key".to_string()),
            openai_host: mock_server.uri(),
            ..RelayConfig::default()
        };
        let app = routes(test_state(relay));
        let body = "{\"messages\": [\
            {\"role\": \"system\", \"content\": \"You are Lily.\"},\
            {\"role\": \"user\", \"content\": \"hello\"}\
        ]}";
        let response = app.oneshot(chat_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let sse = body_text(response).await;
        assert!(sse.trim_end().ends_with("data: [DONE]"));
        assert_eq!(reconstruct(&sse), "Hello! I'm Lily. How can I help you today?");
    }

    #[tokio::test]
    async fn test_upstream_success_is_proxied() {
        let upstream_body = "data: {\"choices\":[{\"delta\":{\"content\":\"Welcome to the lounge\"}}]}\n\n\
                             data: [DONE]\n\n";

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(upstream_body, "text/event-stream"),
            )
            .mount(&mock_server)
            .await;

        let relay = RelayConfig {
            openai_api_key: Some("test-key".to_string()),
            openai_host: mock_server.uri(),
            ..RelayConfig::default()
        };
        let app = routes(test_state(relay));
        let body = "{\"messages\": [{\"role\": \"user\", \"content\": \"hi\"}]}";
        let response = app.oneshot(chat_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let sse = body_text(response).await;
        assert_eq!(reconstruct(&sse), "Welcome to the lounge");
    }
}
