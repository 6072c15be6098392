use bytes::Bytes;
use futures::{pin_mut, Stream, StreamExt};

use crate::providers::utils::{data_payload, ChatChunk, SseBuffer, DONE_PAYLOAD};

/// Phrase substituted when a reply stream completed without any content, so
/// speech synthesis never runs on empty input.
pub const EMPTY_REPLY_PHRASE: &str =
    "I'm here to help! What would you like to know about the lounge?";

/// Consume a canonical reply stream, invoking `on_delta` with each text
/// fragment as it arrives. Returns the reconstructed full reply once the
/// stream signals completion (or ends).
pub async fn collect_reply<S, E>(
    stream: S,
    mut on_delta: impl FnMut(&str),
) -> Result<String, E>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    pin_mut!(stream);

    let mut buffer = SseBuffer::new();
    let mut transcript = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        for line in buffer.push(&chunk) {
            let payload = match data_payload(&line) {
                Some(payload) => payload,
                None => continue,
            };
            if payload == DONE_PAYLOAD {
                return Ok(transcript);
            }
            // lines that don't parse as canonical chunks are vendor noise
            let parsed: ChatChunk = match serde_json::from_str(payload) {
                Ok(parsed) => parsed,
                Err(_) => continue,
            };
            if let Some(content) = parsed.content() {
                if !content.is_empty() {
                    transcript.push_str(content);
                    on_delta(content);
                }
            }
        }
    }

    Ok(transcript)
}

/// The text handed to speech synthesis: the transcript when the reply had
/// content, a fixed phrase otherwise.
pub fn speech_text(transcript: &str) -> &str {
    if transcript.trim().is_empty() {
        EMPTY_REPLY_PHRASE
    } else {
        transcript
    }
}
