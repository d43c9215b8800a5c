use std::time::Duration;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, warn};
use uuid::Uuid;

use shared::framing::encode_event;
use shared::types::event::{EventName, RANDOM_UPPER_BOUND, StreamEvent};

use super::metrics::EmitterGuard;

/// Produces the next event each time an emitter's interval elapses.
pub trait EventProducer: Send + 'static {
    fn name(&self) -> EventName;
    fn next_event(&mut self) -> StreamEvent;
}

/// Per-connection counter. First emission is 1.
#[derive(Debug, Default)]
pub struct Counter {
    count: u64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.count
    }
}

impl EventProducer for Counter {
    fn name(&self) -> EventName {
        EventName::Counter
    }

    fn next_event(&mut self) -> StreamEvent {
        self.count += 1;
        StreamEvent::counter(self.count)
    }
}

/// Uniform samples from `[0, RANDOM_UPPER_BOUND)`.
#[derive(Debug)]
pub struct RandomNumber {
    rng: StdRng,
}

impl RandomNumber {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomNumber {
    fn default() -> Self {
        Self::new()
    }
}

impl EventProducer for RandomNumber {
    fn name(&self) -> EventName {
        EventName::Random
    }

    fn next_event(&mut self) -> StreamEvent {
        StreamEvent::random(self.rng.gen_range(0..RANDOM_UPPER_BOUND))
    }
}

/// Handle to a running emitter task. Owned by exactly one stream connection.
#[derive(Debug)]
pub struct Emitter {
    name: EventName,
    handle: JoinHandle<()>,
}

impl Emitter {
    /// Spawn a task that writes `producer`'s events to `tx` every `period`.
    ///
    /// The first event is written one full period after spawning. The task
    /// ends when the receiving side is gone or when [`abort`](Emitter::abort)
    /// is called; `guard` is released either way.
    pub fn spawn<P: EventProducer>(
        mut producer: P,
        period: Duration,
        tx: mpsc::Sender<Bytes>,
        guard: EmitterGuard,
        stream_id: Uuid,
    ) -> Self {
        let name = producer.name();

        let handle = tokio::spawn(async move {
            let _guard = guard;
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let event = producer.next_event();
                let frame = match encode_event(&event) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(stream = %stream_id, "Failed to encode {} event: {}", name, e);
                        continue;
                    }
                };

                if tx.send(Bytes::from(frame)).await.is_err() {
                    debug!(stream = %stream_id, "Stream gone, {} emitter stopping", name);
                    break;
                }
            }
        });

        Self { name, handle }
    }

    pub fn name(&self) -> EventName {
        self.name
    }

    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::metrics::StreamMetrics;
    use std::sync::Arc;

    #[test]
    fn counter_starts_at_one_and_steps_by_one() {
        let mut counter = Counter::new();
        let counts: Vec<StreamEvent> = (0..3).map(|_| counter.next_event()).collect();
        assert_eq!(
            counts,
            vec![
                StreamEvent::counter(1),
                StreamEvent::counter(2),
                StreamEvent::counter(3)
            ]
        );
        assert_eq!(counter.current(), 3);
    }

    #[test]
    fn random_numbers_stay_in_range() {
        let mut random = RandomNumber::with_seed(7);
        for _ in 0..1_000 {
            match random.next_event() {
                StreamEvent::Random(p) => assert!(p.number.unwrap() < RANDOM_UPPER_BOUND),
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn emitter_waits_one_period_before_first_event() {
        let metrics = Arc::new(StreamMetrics::new());
        let (tx, mut rx) = mpsc::channel(8);
        let _emitter = Emitter::spawn(
            Counter::new(),
            Duration::from_secs(1),
            tx,
            metrics.emitter_started(),
            Uuid::new_v4(),
        );

        let early = tokio::time::timeout(Duration::from_millis(900), rx.recv()).await;
        assert!(early.is_err());

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame, Bytes::from("event: counter\ndata: {\"count\":1}\n\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn emitter_stops_when_receiver_dropped() {
        let metrics = Arc::new(StreamMetrics::new());
        let (tx, rx) = mpsc::channel(8);
        let emitter = Emitter::spawn(
            Counter::new(),
            Duration::from_secs(1),
            tx,
            metrics.emitter_started(),
            Uuid::new_v4(),
        );
        assert_eq!(metrics.active_emitters(), 1);

        drop(rx);
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        assert!(emitter.is_finished());
        assert_eq!(metrics.active_emitters(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_emitter_releases_its_guard() {
        let metrics = Arc::new(StreamMetrics::new());
        let (tx, _rx) = mpsc::channel(8);
        let emitter = Emitter::spawn(
            RandomNumber::new(),
            Duration::from_secs(2),
            tx,
            metrics.emitter_started(),
            Uuid::new_v4(),
        );

        emitter.abort();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(emitter.is_finished());
        assert_eq!(metrics.active_emitters(), 0);
        assert_eq!(emitter.name(), EventName::Random);
    }
}
