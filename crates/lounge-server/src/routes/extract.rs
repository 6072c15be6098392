use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use regex::Regex;
use serde_json::{json, Value};

use crate::state::AppState;

const MAX_TEXT_CHARS: usize = 10_000;
const MIN_MEANINGFUL_CHARS: usize = 50;

async fn extract_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> axum::response::Response {
    let mut upload: Option<(String, String, Bytes)> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload.pdf").to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            match field.bytes().await {
                Ok(data) => {
                    upload = Some((filename, content_type, data));
                    break;
                }
                Err(error) => {
                    tracing::error!("failed to read uploaded file: {}", error);
                    return error_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to process PDF",
                    );
                }
            }
        }
    }

    let (filename, content_type, data) = match upload {
        Some(upload) => upload,
        None => return error_response(StatusCode::BAD_REQUEST, "No file provided"),
    };

    if content_type != "application/pdf" {
        return error_response(StatusCode::BAD_REQUEST, "File must be a PDF");
    }

    // Prefer the extraction backend when it is reachable.
    if let Some(payload) = forward_to_backend(&state.backend_url, &filename, data.clone()).await {
        return Json(payload).into_response();
    }
    tracing::debug!("backend extraction unavailable, using local fallback");

    let text = extract_embedded_text(&data);
    if text.len() < MIN_MEANINGFUL_CHARS {
        return Json(json!({
            "text": "",
            "warning": "Could not extract meaningful text from PDF. Please copy and paste your profile information manually.",
            "filename": filename,
        }))
        .into_response();
    }

    let char_count = text.len();
    let truncated: String = text.chars().take(MAX_TEXT_CHARS).collect();
    Json(json!({
        "text": truncated,
        "filename": filename,
        "charCount": char_count,
    }))
    .into_response()
}

async fn forward_to_backend(backend_url: &str, filename: &str, data: Bytes) -> Option<Value> {
    let part = reqwest::multipart::Part::bytes(data.to_vec())
        .file_name(filename.to_string())
        .mime_str("application/pdf")
        .ok()?;
    let form = reqwest::multipart::Form::new().part("file", part);

    let url = format!("{}/extract-pdf", backend_url.trim_end_matches('/'));
    let response = reqwest::Client::new()
        .post(&url)
        .multipart(form)
        .send()
        .await
        .ok()?;

    if !response.status().is_success() {
        return None;
    }
    response.json().await.ok()
}

/// Best-effort text recovery for PDFs with embedded text: printable runs
/// between stream markers plus parenthesized string literals.
fn extract_embedded_text(data: &[u8]) -> String {
    let raw = String::from_utf8_lossy(data);
    let mut text = String::new();

    let stream_re = Regex::new(r"(?s)stream(.*?)endstream").unwrap();
    for caps in stream_re.captures_iter(&raw) {
        let readable: String = caps[1]
            .chars()
            .map(|c| if (' '..='~').contains(&c) { c } else { ' ' })
            .collect();
        let readable = collapse_whitespace(&readable);
        if readable.len() > 10 {
            text.push_str(&readable);
            text.push(' ');
        }
    }

    let paren_re = Regex::new(r"\(([^)]+)\)").unwrap();
    for caps in paren_re.captures_iter(&raw) {
        let content = &caps[1];
        if content.len() > 2 && content.chars().any(|c| c.is_ascii_alphabetic()) {
            text.push_str(content);
            text.push(' ');
        }
    }

    let printable: String = text
        .chars()
        .filter(|c| (' '..='~').contains(c) || c.is_whitespace())
        .collect();
    collapse_whitespace(&printable)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (status, Json(json!({ "error": message }))).into_response()
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/extract-pdf", post(extract_handler))
        .with_state(state)
}
