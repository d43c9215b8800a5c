use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use shared::types::StreamStats;

/// Process-wide counters for open streams and live emitters.
///
/// Only counters live here; each stream's data stays private to its
/// connection.
#[derive(Debug, Default)]
pub struct StreamMetrics {
    active_streams: AtomicUsize,
    active_emitters: AtomicUsize,
    streams_opened: AtomicU64,
}

impl StreamMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a stream slot if fewer than `limit` streams are open.
    pub fn try_open(self: &Arc<Self>, limit: usize) -> Option<StreamSlot> {
        self.active_streams
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .ok()?;
        self.streams_opened.fetch_add(1, Ordering::Relaxed);
        Some(StreamSlot {
            metrics: Arc::clone(self),
        })
    }

    /// Count a live emitter until the returned guard drops.
    pub fn emitter_started(self: &Arc<Self>) -> EmitterGuard {
        self.active_emitters.fetch_add(1, Ordering::AcqRel);
        EmitterGuard {
            metrics: Arc::clone(self),
        }
    }

    pub fn active_streams(&self) -> usize {
        self.active_streams.load(Ordering::Acquire)
    }

    pub fn active_emitters(&self) -> usize {
        self.active_emitters.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> StreamStats {
        StreamStats {
            active_streams: self.active_streams(),
            active_emitters: self.active_emitters(),
            streams_opened: self.streams_opened.load(Ordering::Relaxed),
        }
    }
}

/// One open stream. Releases its slot on drop.
#[derive(Debug)]
pub struct StreamSlot {
    metrics: Arc<StreamMetrics>,
}

impl Drop for StreamSlot {
    fn drop(&mut self) {
        self.metrics.active_streams.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Held by a running emitter task; dropped when the task finishes or is aborted.
#[derive(Debug)]
pub struct EmitterGuard {
    metrics: Arc<StreamMetrics>,
}

impl Drop for EmitterGuard {
    fn drop(&mut self) {
        self.metrics.active_emitters.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_capped_and_released() {
        let metrics = Arc::new(StreamMetrics::new());
        let a = metrics.try_open(2).unwrap();
        let _b = metrics.try_open(2).unwrap();
        assert!(metrics.try_open(2).is_none());
        assert_eq!(metrics.active_streams(), 2);

        drop(a);
        assert_eq!(metrics.active_streams(), 1);
        assert!(metrics.try_open(2).is_some());
        assert_eq!(metrics.snapshot().streams_opened, 3);
    }

    #[test]
    fn emitter_guard_tracks_liveness() {
        let metrics = Arc::new(StreamMetrics::new());
        let guard = metrics.emitter_started();
        assert_eq!(metrics.active_emitters(), 1);
        drop(guard);
        assert_eq!(metrics.active_emitters(), 0);
    }
}
