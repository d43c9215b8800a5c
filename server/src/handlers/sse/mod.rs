mod sse;

pub use sse::{SseStreamBuilder, open_event_stream};
