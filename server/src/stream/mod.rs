//! Per-connection event streams: lifecycle, emitters and process-wide counters.

pub mod connection;
pub mod emitter;
pub mod metrics;

pub use connection::{ConnectionState, StreamConnection};
pub use emitter::{Counter, Emitter, EventProducer, RandomNumber};
pub use metrics::{EmitterGuard, StreamMetrics, StreamSlot};
