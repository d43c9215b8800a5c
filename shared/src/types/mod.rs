pub mod event;
pub mod json_error;
pub mod server_config;
pub mod sse;
pub mod stream_stats;

pub use self::event::{
    ConnectedPayload, CounterPayload, EventName, RandomPayload, StreamEvent, EVENTS_PATH,
};
pub use self::json_error::ErrorResponse;
pub use self::server_config::{AppConfig, ConfigError};
pub use self::sse::{SseError, SseFrame, SseResult};
pub use self::stream_stats::StreamStats;
