use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of the event stream counters.
/// Serialized and returned by `GET /health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStats {
    /// Streams currently open
    pub active_streams: usize,
    /// Emitter tasks still alive across all streams
    pub active_emitters: usize,
    /// Streams opened since the process started
    pub streams_opened: u64,
}
