use tokio::sync::watch;
use tracing::{debug, warn};

use shared::types::SseFrame;

use crate::source::{Endpoint, EventSource, ReconnectPolicy, SourceError, SourceHandle, SourceHandler};
use crate::view::ClientViewState;

/// A live subscription to `GET /api/events`.
///
/// The view reads [`snapshot`](Subscription::snapshot) or waits on
/// [`watch`](Subscription::watch). Call [`close`](Subscription::close) when
/// the view goes away.
#[derive(Debug)]
pub struct Subscription {
    source: SourceHandle,
    state: watch::Receiver<ClientViewState>,
}

/// Subscribe to the event stream served under `base_url` (e.g. `http://127.0.0.1:3001`).
pub fn subscribe(base_url: &str) -> Result<Subscription, SourceError> {
    subscribe_with_policy(base_url, ReconnectPolicy::DEFAULT)
}

/// [`subscribe`] with a non-default reconnection policy.
pub fn subscribe_with_policy(
    base_url: &str,
    policy: ReconnectPolicy,
) -> Result<Subscription, SourceError> {
    let endpoint = Endpoint::from_base_url(base_url)?;
    let (tx, rx) = watch::channel(ClientViewState::default());

    debug!(?endpoint, "Subscribing");
    let source = EventSource::spawn(endpoint, policy, ViewUpdater { state: tx });

    Ok(Subscription { source, state: rx })
}

impl Subscription {
    /// Current view state.
    pub fn snapshot(&self) -> ClientViewState {
        self.state.borrow().clone()
    }

    /// A receiver that is notified on every state change.
    pub fn watch(&self) -> watch::Receiver<ClientViewState> {
        self.state.clone()
    }

    /// Close the stream and stop reconnecting. Returns the final state.
    pub async fn close(self) -> ClientViewState {
        let state = self.state.clone();
        self.source.close().await;
        state.borrow().clone()
    }
}

/// Applies source callbacks to the shared view state.
struct ViewUpdater {
    state: watch::Sender<ClientViewState>,
}

impl SourceHandler for ViewUpdater {
    fn on_open(&mut self) {
        self.state.send_modify(ClientViewState::on_open);
    }

    fn on_error(&mut self, error: &SourceError) {
        let message = error.to_string();
        self.state.send_modify(|s| s.on_error(message));
    }

    fn on_frame(&mut self, frame: SseFrame) {
        self.state.send_modify(|s| {
            if let Err(e) = s.apply_frame(&frame) {
                s.malformed_events += 1;
                warn!("Ignoring malformed {} event: {}", frame.event, e);
            }
        });
    }

    fn on_close(&mut self) {
        self.state.send_modify(ClientViewState::on_close);
    }
}
