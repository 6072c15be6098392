use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;

use super::base::{DeltaStream, Provider};
use super::utils::{encode_frame, ChatChunk, DONE_FRAME};
use crate::errors::{ProviderError, ProviderResult};
use crate::models::message::Message;

/// A mock provider that replays a scripted stream outcome for testing
pub struct MockProvider {
    open_error: Mutex<Option<ProviderError>>,
    frames: Mutex<Vec<Result<Bytes, ProviderError>>>,
}

impl MockProvider {
    /// Streams the given texts as canonical frames, then terminates.
    pub fn streaming(texts: &[&str]) -> Self {
        let mut frames: Vec<Result<Bytes, ProviderError>> = texts
            .iter()
            .map(|text| Ok(encode_frame(&ChatChunk::of_text(*text))))
            .collect();
        frames.push(Ok(Bytes::from_static(DONE_FRAME)));

        Self {
            open_error: Mutex::new(None),
            frames: Mutex::new(frames),
        }
    }

    /// Fails before any frame is produced.
    pub fn failing_open(error: ProviderError) -> Self {
        Self {
            open_error: Mutex::new(Some(error)),
            frames: Mutex::new(Vec::new()),
        }
    }

    /// Streams the given texts, then fails without terminating.
    pub fn failing_mid_stream(texts: &[&str], error: ProviderError) -> Self {
        let mut frames: Vec<Result<Bytes, ProviderError>> = texts
            .iter()
            .map(|text| Ok(encode_frame(&ChatChunk::of_text(*text))))
            .collect();
        frames.push(Err(error));

        Self {
            open_error: Mutex::new(None),
            frames: Mutex::new(frames),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn stream_chat(&self, _messages: &[Message]) -> ProviderResult<DeltaStream> {
        if let Some(error) = self.open_error.lock().unwrap().take() {
            return Err(error);
        }

        let frames = std::mem::take(&mut *self.frames.lock().unwrap());
        Ok(Box::pin(stream::iter(frames)))
    }
}
