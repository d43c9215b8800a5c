//! `text/event-stream` framing.
//!
//! The server writes one block per event:
//!
//! ```text
//! event: counter
//! data: {"count":1}
//!
//! ```
//!
//! [`FrameDecoder`] is the client half: it accepts arbitrary body chunks and
//! yields complete [`SseFrame`]s.

mod decoder;

pub use decoder::FrameDecoder;

use crate::types::event::StreamEvent;
use crate::types::sse::{SseFrame, SseResult};

/// Serialise a [`StreamEvent`] into one wire block.
pub fn encode_event(event: &StreamEvent) -> SseResult<String> {
    let data = event.data_json()?;
    Ok(encode_raw(event.name().as_str(), &data))
}

/// Build a block from a name and a single-line payload.
///
/// `data` must not contain newlines; JSON produced by `serde_json::to_string` never does.
pub fn encode_raw(event: &str, data: &str) -> String {
    format!("event: {}\ndata: {}\n\n", event, data)
}

/// Decode a complete body in one go. Trailing bytes without a terminating blank line are dropped.
pub fn decode_all(body: &[u8]) -> SseResult<Vec<SseFrame>> {
    let mut decoder = FrameDecoder::new();
    decoder.push(body);
    let mut frames = Vec::new();
    while let Some(frame) = decoder.next_frame()? {
        frames.push(frame);
    }
    Ok(frames)
}
