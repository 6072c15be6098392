use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Canonical streaming chunk. All adapters produce this shape regardless of
/// the source vendor's event schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChunk {
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub delta: ChunkDelta,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChatChunk {
    pub fn of_text(text: impl Into<String>) -> Self {
        ChatChunk {
            choices: vec![ChunkChoice {
                delta: ChunkDelta {
                    content: Some(text.into()),
                },
            }],
        }
    }

    /// Delta text carried by this chunk, if any.
    pub fn content(&self) -> Option<&str> {
        self.choices.first().and_then(|choice| choice.delta.content.as_deref())
    }
}

/// Terminal frame closing every canonical stream.
pub const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";

/// Sentinel payload of the terminal frame.
pub const DONE_PAYLOAD: &str = "[DONE]";

const DONE_MARKER: &[u8] = b"data: [DONE]";

/// Encode a chunk as one event-stream frame.
pub fn encode_frame(chunk: &ChatChunk) -> Bytes {
    let encoded = serde_json::to_string(chunk).unwrap_or_else(|_| String::new());
    Bytes::from(format!("data: {}\n\n", encoded))
}

/// Payload of a `data: ` line; `None` for blanks, comments, and any other
/// line the framing does not recognize.
pub fn data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

/// Whether a raw frame carries the terminal sentinel.
pub fn contains_done(frame: &[u8]) -> bool {
    frame
        .windows(DONE_MARKER.len())
        .any(|window| window == DONE_MARKER)
}

/// Splits an incoming byte stream into complete lines, tolerating frames
/// that arrive split across chunk boundaries.
#[derive(Debug, Default)]
pub struct SseBuffer {
    buf: Vec<u8>,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns the lines it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let rest = self.buf.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.buf, rest);
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }
}
