use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "Assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single entry of the conversation, exactly as it goes over the wire and into storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Progress of an in-flight turn, forwarded from the streaming task to the UI loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Decoded text to append to the assistant placeholder
    Fragment(String),
    /// The response body ended
    Finished,
    /// The request or the body read failed
    Failed(String),
}

/// Notifications emitted by a speech recognizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    Started,
    Transcript(String),
    Error(String),
    Ended,
}

/// A voice notification tagged with the recognition session that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSignal {
    pub session: u64,
    pub event: VoiceEvent,
}
