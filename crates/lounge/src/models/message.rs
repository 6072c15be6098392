use serde::{Deserialize, Serialize};

use super::role::Role;

/// One turn of a conversation as submitted to the relay. Ordering within a
/// conversation is chronological.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Content of the first system turn, used as the instruction preamble.
/// Additional system turns are not consulted.
pub fn system_preamble(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .find(|message| message.role == Role::System)
        .map(|message| message.content.as_str())
}

/// Content of the most recent user turn.
pub fn last_user_content(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|message| message.role == Role::User)
        .map(|message| message.content.as_str())
}
