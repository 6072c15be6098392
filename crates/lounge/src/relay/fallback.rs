use std::time::Duration;

use async_stream::stream;
use bytes::Bytes;
use rand::seq::SliceRandom;
use regex::Regex;
use tokio::time::sleep;

use super::ReplyStream;
use crate::models::message::{self, Message};
use crate::providers::utils::{encode_frame, ChatChunk, DONE_FRAME};

/// Inter-word delay used when simulating incremental delivery.
pub const WORD_DELAY: Duration = Duration::from_millis(50);

const GREETINGS: [&str; 4] = ["hi", "hello", "hey", "greetings"];

const TEMPLATES: [&str; 5] = [
    "That's an interesting point! I'd love to discuss that further.",
    "I appreciate you sharing that with me. Tell me more!",
    "That's a great question. Let me think about that...",
    "I find that fascinating! What else would you like to know?",
    "Thanks for chatting with me! Is there anything specific I can help with?",
];

/// Compose a canned reply for the conversation, addressed as whoever the
/// system preamble introduces. Computed fresh per request; greetings get a
/// deterministic answer, everything else a template pick.
pub fn fallback_reply(messages: &[Message]) -> String {
    let last_user = message::last_user_content(messages).unwrap_or_default();
    let name = addressee(message::system_preamble(messages).unwrap_or_default());

    if is_greeting(last_user) {
        return format!("Hello! I'm {}. How can I help you today?", name);
    }

    TEMPLATES
        .choose(&mut rand::thread_rng())
        .unwrap_or(&TEMPLATES[0])
        .to_string()
}

/// Name from a "You are <name> ..." preamble.
fn addressee(preamble: &str) -> String {
    let re = Regex::new(r"(?i)you are (\w+)").unwrap();
    re.captures(preamble)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "the assistant".to_string())
}

fn is_greeting(text: &str) -> bool {
    let lower = text.to_lowercase();
    GREETINGS.iter().any(|greeting| lower.contains(greeting))
}

/// Deliver a canned reply word by word, one suspension point per word, so
/// the client sees the same incremental contract as a live provider.
pub fn simulated_stream(reply: String) -> ReplyStream {
    let words: Vec<String> = reply.split(' ').map(String::from).collect();

    let stream = stream! {
        let last = words.len().saturating_sub(1);
        for (index, word) in words.into_iter().enumerate() {
            let text = if index < last {
                format!("{} ", word)
            } else {
                word
            };
            yield encode_frame(&ChatChunk::of_text(text));
            if index < last {
                sleep(WORD_DELAY).await;
            }
        }
        yield Bytes::from_static(DONE_FRAME);
    };

    Box::pin(stream)
}

/// Deliver a canned reply as one chunk. Used when an upstream failed after
/// the request was already accepted.
pub fn single_chunk_stream(reply: String) -> ReplyStream {
    let frames = vec![
        encode_frame(&ChatChunk::of_text(reply)),
        Bytes::from_static(DONE_FRAME),
    ];
    Box::pin(futures::stream::iter(frames))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::utils::contains_done;
    use futures::StreamExt;

    fn lily_conversation(user: &str) -> Vec<Message> {
        vec![
            Message::system("You are Lily. A friendly guide. Keep responses concise."),
            Message::user(user),
        ]
    }

    async fn reconstruct(mut stream: ReplyStream) -> (String, Vec<Bytes>) {
        let mut frames = Vec::new();
        while let Some(frame) = stream.next().await {
            frames.push(frame);
        }

        let mut text = String::new();
        for frame in &frames {
            let line = String::from_utf8_lossy(frame);
            if let Some(payload) = crate::providers::utils::data_payload(line.trim_end()) {
                if payload == "[DONE]" {
                    continue;
                }
                let chunk: ChatChunk = serde_json::from_str(payload).unwrap();
                text.push_str(chunk.content().unwrap_or_default());
            }
        }
        (text, frames)
    }

    #[test]
    fn test_greeting_reply_uses_preamble_name() {
        let reply = fallback_reply(&lily_conversation("hello"));
        assert_eq!(reply, "Hello! I'm Lily. How can I help you today?");
    }

    #[test]
    fn test_greeting_detection_is_idempotent() {
        let messages = lily_conversation("hey there");
        assert_eq!(fallback_reply(&messages), fallback_reply(&messages));
    }

    #[test]
    fn test_non_greeting_reply_comes_from_templates() {
        let reply = fallback_reply(&lily_conversation("tell me about the space"));
        assert!(TEMPLATES.contains(&reply.as_str()));
    }

    #[test]
    fn test_addressee_defaults_without_preamble() {
        let reply = fallback_reply(&[Message::user("hi")]);
        assert_eq!(reply, "Hello! I'm the assistant. How can I help you today?");
    }

    #[test]
    fn test_addressee_is_case_insensitive() {
        assert_eq!(addressee("you are Nova, a guide"), "Nova");
        assert_eq!(addressee("no introduction here"), "the assistant");
    }

    #[tokio::test]
    async fn test_simulated_stream_reconstructs_reply_exactly() {
        let reply = "Hello! I'm Lily. How can I help you today?".to_string();
        let (text, frames) = reconstruct(simulated_stream(reply.clone())).await;

        assert_eq!(text, reply);
        // one frame per word plus the terminal sentinel
        assert_eq!(frames.len(), reply.split(' ').count() + 1);
        assert!(contains_done(frames.last().unwrap()));
    }

    #[tokio::test]
    async fn test_single_chunk_stream_terminates() {
        let (text, frames) = reconstruct(single_chunk_stream("short reply".to_string())).await;
        assert_eq!(text, "short reply");
        assert_eq!(frames.len(), 2);
        assert!(contains_done(frames.last().unwrap()));
    }
}
