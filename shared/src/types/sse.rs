// shared/src/types/sse.rs
// SSE frame + error types

use thiserror::Error;

/// Event name used when a frame carries no `event:` field.
pub const DEFAULT_EVENT_NAME: &str = "message";

/// One decoded event block from a `text/event-stream` body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, or [`DEFAULT_EVENT_NAME`].
    pub event: String,
    /// All `data:` lines of the block joined with `\n`.
    pub data: String,
    /// Last `id:` seen in the block, if any.
    pub id: Option<String>,
    /// Reconnection delay hint in milliseconds from a `retry:` field.
    pub retry: Option<u64>,
}

#[derive(Error, Debug)]
pub enum SseError {
    #[error("Failed to encode event payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Event stream is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

pub type SseResult<T> = Result<T, SseError>;
