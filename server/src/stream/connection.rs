use std::fmt;
use std::sync::Arc;

use anyhow::{Result, bail};
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use shared::framing::encode_event;
use shared::types::event::{COUNTER_INTERVAL, RANDOM_INTERVAL, StreamEvent};

use super::emitter::{Counter, Emitter, RandomNumber};
use super::metrics::{StreamMetrics, StreamSlot};

/// Lifecycle of one event stream.
///
/// `Opening` → `Streaming` → `Closed`. `Closed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake queued, emitters not started yet.
    Opening,
    /// Emitters running.
    Streaming,
    /// Emitters cancelled. Nothing more will be written.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Opening => "opening",
            ConnectionState::Streaming => "streaming",
            ConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// One open server-to-client event stream and every emitter bound to it.
///
/// The frames it produces are read from the receiver returned by
/// [`open`](StreamConnection::open). Dropping the connection tears it down,
/// so whoever owns the response body owns the emitters' lifetime.
pub struct StreamConnection {
    id: Uuid,
    state: ConnectionState,
    tx: Option<mpsc::Sender<Bytes>>,
    emitters: Vec<Emitter>,
    metrics: Arc<StreamMetrics>,
    _slot: StreamSlot,
}

impl fmt::Debug for StreamConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConnection")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("emitters", &self.emitters.len())
            .finish()
    }
}

impl StreamConnection {
    /// Create a connection in `Opening` with the `connected` handshake already queued.
    pub fn open(
        metrics: Arc<StreamMetrics>,
        slot: StreamSlot,
        capacity: usize,
    ) -> Result<(Self, mpsc::Receiver<Bytes>)> {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        let handshake = encode_event(&StreamEvent::connected())?;
        // A fresh channel with capacity >= 1 always has room for the first frame.
        tx.try_send(Bytes::from(handshake))?;

        let id = Uuid::new_v4();
        debug!(stream = %id, "Stream opening");

        Ok((
            Self {
                id,
                state: ConnectionState::Opening,
                tx: Some(tx),
                emitters: Vec::with_capacity(2),
                metrics,
                _slot: slot,
            },
            rx,
        ))
    }

    /// Start the counter and random emitters. Only valid from `Opening`.
    pub fn start(&mut self) -> Result<()> {
        if self.state != ConnectionState::Opening {
            bail!("cannot start stream {} in state {}", self.id, self.state);
        }
        let Some(tx) = self.tx.take() else {
            bail!("stream {} has no sender", self.id);
        };

        self.emitters.push(Emitter::spawn(
            Counter::new(),
            COUNTER_INTERVAL,
            tx.clone(),
            self.metrics.emitter_started(),
            self.id,
        ));
        self.emitters.push(Emitter::spawn(
            RandomNumber::new(),
            RANDOM_INTERVAL,
            tx,
            self.metrics.emitter_started(),
            self.id,
        ));

        self.state = ConnectionState::Streaming;
        info!(
            stream = %self.id,
            active_streams = self.metrics.active_streams(),
            "Stream open"
        );
        Ok(())
    }

    /// Cancel every emitter and move to `Closed`. Safe to call more than once.
    pub fn teardown(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        for emitter in &self.emitters {
            debug!(stream = %self.id, "Cancelling {} emitter", emitter.name());
            emitter.abort();
        }
        self.tx = None;
        let was = self.state;
        self.state = ConnectionState::Closed;
        info!(stream = %self.id, from = %was, "Stream closed");
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        self.state != ConnectionState::Closed
    }

    pub fn emitters(&self) -> &[Emitter] {
        &self.emitters
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        self.teardown();
    }
}
