//! Error types for the chat client.

use std::time::Duration;

/// Errors raised while talking to the chat endpoint or the voice recognizer.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chat endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response stalled for {}s", .0.as_secs())]
    Stalled(Duration),
    #[error("speech recognition is not available")]
    VoiceUnavailable,
    #[error("voice error: {0}")]
    Voice(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
