use bytes::{Buf, BytesMut};

use crate::types::sse::{DEFAULT_EVENT_NAME, SseFrame, SseResult};

const LF: u8 = b'\n';
const CR: u8 = b'\r';

/// Incremental `text/event-stream` decoder.
///
/// Feed body chunks with [`push`](FrameDecoder::push) and drain complete
/// events with [`next_frame`](FrameDecoder::next_frame). Chunk boundaries may
/// fall anywhere, including between the CR and LF of a CRLF pair.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    pending: PendingFrame,
    retry_hint: Option<u64>,
}

#[derive(Debug, Default)]
struct PendingFrame {
    event: Option<String>,
    data: Option<String>,
    id: Option<String>,
    retry: Option<u64>,
}

impl PendingFrame {
    /// Finish the block on a blank line. Blocks without any `data:` field are discarded.
    fn take(&mut self) -> Option<SseFrame> {
        let pending = std::mem::take(self);
        let data = pending.data?;
        Some(SseFrame {
            event: pending
                .event
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT_NAME.to_string()),
            data,
            id: pending.id,
            retry: pending.retry,
        })
    }

    fn apply(&mut self, field: &str, value: &str) {
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => match &mut self.data {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            },
            "id" => {
                if !value.contains('\0') {
                    self.id = Some(value.to_string());
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    self.retry = value.parse().ok();
                }
            }
            _ => {}
        }
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw body bytes.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Most recent valid `retry:` value seen, whether or not its block was dispatched.
    pub fn retry_hint(&self) -> Option<u64> {
        self.retry_hint
    }

    /// Bytes received but not yet consumed as complete lines.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Return the next complete event, or `Ok(None)` when more bytes are needed.
    ///
    /// A line that is not valid UTF-8 is consumed and reported as an error;
    /// decoding can continue with the following line.
    pub fn next_frame(&mut self) -> SseResult<Option<SseFrame>> {
        while let Some((line_end, rest_start)) = find_eol(&self.buffer) {
            let line = self.buffer.split_to(line_end).freeze();
            self.buffer.advance(rest_start - line_end);

            if line.is_empty() {
                if let Some(frame) = self.pending.take() {
                    return Ok(Some(frame));
                }
                continue;
            }

            if line[0] == b':' {
                continue;
            }

            let line = std::str::from_utf8(&line)?;
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            self.pending.apply(field, value);
            if field == "retry" && self.pending.retry.is_some() {
                self.retry_hint = self.pending.retry;
            }
        }
        Ok(None)
    }
}

/// Locate the next line terminator.
///
/// Returns `(line_end, rest_start)`. `None` means more data is needed, which
/// includes a buffer ending in a lone CR that may be the first half of CRLF.
fn find_eol(bytes: &[u8]) -> Option<(usize, usize)> {
    let pos = memchr::memchr2(CR, LF, bytes)?;
    if bytes[pos] == LF {
        return Some((pos, pos + 1));
    }
    match bytes.get(pos + 1) {
        None => None,
        Some(&LF) => Some((pos, pos + 2)),
        Some(_) => Some((pos, pos + 1)),
    }
}
