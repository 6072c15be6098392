use axum::{
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

use lounge::errors::ProviderError;
use lounge::voice::VoiceClient;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct TtsRequest {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "voiceId")]
    voice_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PreviewRequest {
    #[serde(default)]
    voice_id: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

async fn tts_handler(
    State(state): State<AppState>,
    Json(request): Json<TtsRequest>,
) -> axum::response::Response {
    let text = match request.text.as_deref().filter(|t| !t.is_empty()) {
        Some(text) => text.to_string(),
        None => return error_response(StatusCode::BAD_REQUEST, "Text is required"),
    };

    match voice_client(&state) {
        Ok(client) => match client.synthesize(&text, request.voice_id.as_deref()).await {
            Ok(audio) => audio_response(audio),
            Err(error) => speech_error(error, "Failed to generate speech"),
        },
        Err(response) => response,
    }
}

async fn preview_handler(
    State(state): State<AppState>,
    Json(request): Json<PreviewRequest>,
) -> axum::response::Response {
    let voice_id = match request.voice_id.as_deref().filter(|v| !v.is_empty()) {
        Some(voice_id) => voice_id.to_string(),
        None => return error_response(StatusCode::BAD_REQUEST, "voice_id required"),
    };

    match voice_client(&state) {
        Ok(client) => match client.preview(&voice_id, request.text.as_deref()).await {
            Ok(audio) => audio_response(audio),
            Err(error) => speech_error(error, "Voice preview failed"),
        },
        Err(response) => response,
    }
}

async fn clone_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> axum::response::Response {
    let mut name = "Lounge Voice".to_string();
    let mut audio: Option<(Bytes, String)> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name() {
            Some("name") => {
                if let Ok(value) = field.text().await {
                    if !value.is_empty() {
                        name = value;
                    }
                }
            }
            Some("file") => {
                let mime_type = field.content_type().unwrap_or("audio/webm").to_string();
                if let Ok(data) = field.bytes().await {
                    audio = Some((data, mime_type));
                }
            }
            _ => {}
        }
    }

    let (data, mime_type) = match audio {
        Some(audio) => audio,
        None => return error_response(StatusCode::BAD_REQUEST, "No audio file"),
    };

    match voice_client(&state) {
        Ok(client) => match client.clone_voice(&name, data, &mime_type).await {
            Ok(voice_id) => Json(json!({
                "voice_id": voice_id,
                "message": "Voice cloned successfully",
            }))
            .into_response(),
            Err(error) => {
                tracing::error!("voice clone failed: {}", error);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Voice clone failed")
            }
        },
        Err(response) => response,
    }
}

fn voice_client(state: &AppState) -> Result<VoiceClient, axum::response::Response> {
    VoiceClient::new(state.voice.clone()).map_err(|error| {
        tracing::error!("failed to build voice client: {}", error);
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate speech")
    })
}

fn speech_error(error: ProviderError, fallback_message: &str) -> axum::response::Response {
    match &error {
        ProviderError::MissingApiKey { .. } => {
            tracing::error!("{}", error);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "ElevenLabs API key not configured",
            )
        }
        ProviderError::Request { status, body, .. } => {
            tracing::error!("ElevenLabs API error: {} - {}", status, body);
            let status =
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            error_response(status, &format!("ElevenLabs API error: {}", status.as_u16()))
        }
        _ => {
            tracing::error!("{}", error);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, fallback_message)
        }
    }
}

fn audio_response(audio: Bytes) -> axum::response::Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "audio/mpeg")],
        audio,
    )
        .into_response()
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (status, Json(json!({ "error": message }))).into_response()
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/tts", post(tts_handler))
        .route("/voice/clone", post(clone_handler))
        .route("/voice/preview", post(preview_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use lounge::relay::orchestrator::RelayConfig;
    use lounge::voice::VoiceConfig;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_state(voice: VoiceConfig) -> AppState {
        AppState {
            relay: RelayConfig::default(),
            voice,
            backend_url: "http://localhost:8000".to_string(),
        }
    }

    fn json_request(uri: &str, body: &str) -> axum::http::Request<axum::body::Body> {
        axum::http::Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_tts_requires_text() {
        let app = routes(test_state(VoiceConfig::default()));
        let response = app.oneshot(json_request("/tts", "{}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_tts_without_key_is_a_server_error() {
        let app = routes(test_state(VoiceConfig::default()));
        let response = app
            .oneshot(json_request("/tts", "{\"text\": \"hello\"}"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let collected = response.into_body().collect().await.unwrap();
        let body = String::from_utf8_lossy(&collected.to_bytes()).into_owned();
        assert!(body.contains("ElevenLabs API key not configured"));
    }

    #[tokio::test]
    async fn test_tts_returns_audio() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/v1/text-to-speech/.+$"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(b"mp3bytes".to_vec(), "audio/mpeg"),
            )
            .mount(&mock_server)
            .await;

        let voice = VoiceConfig {
            host: mock_server.uri(),
            api_key: Some("test-key".to_string()),
            ..VoiceConfig::default()
        };
        let app = routes(test_state(voice));
        let response = app
            .oneshot(json_request("/tts", "{\"text\": \"hello\"}"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("Content-Type").unwrap(), "audio/mpeg");
        let collected = response.into_body().collect().await.unwrap();
        assert_eq!(collected.to_bytes().as_ref(), b"mp3bytes");
    }

    #[tokio::test]
    async fn test_tts_passes_upstream_status_through() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&mock_server)
            .await;

        let voice = VoiceConfig {
            host: mock_server.uri(),
            api_key: Some("test-key".to_string()),
            ..VoiceConfig::default()
        };
        let app = routes(test_state(voice));
        let response = app
            .oneshot(json_request("/tts", "{\"text\": \"hello\"}"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_preview_requires_voice_id() {
        let app = routes(test_state(VoiceConfig::default()));
        let response = app
            .oneshot(json_request("/voice/preview", "{\"text\": \"hi\"}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
