//! What the view shows: connection status plus the latest value of each event.

use std::fmt;

use shared::types::{EventName, SseFrame, StreamEvent};

/// Transport state as the user sees it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Not connected yet, or closed by us.
    #[default]
    Disconnected,
    Connected,
    /// Transport failed; the source is retrying on its own.
    Error { message: String },
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ConnectionStatus::Error { .. })
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => f.write_str("Disconnected"),
            ConnectionStatus::Connected => f.write_str("Connected"),
            ConnectionStatus::Error { message } => write!(f, "Retrying ({})", message),
        }
    }
}

/// Local mirror of the last payload per event type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientViewState {
    pub status: ConnectionStatus,
    /// From the last `connected` event
    pub message: Option<String>,
    /// From the last `counter` event
    pub count: Option<u64>,
    /// From the last `random` event
    pub random: Option<u32>,
    /// Known events applied since subscribing
    pub events_received: u64,
    /// Known events whose payload could not be parsed
    pub malformed_events: u64,
}

impl ClientViewState {
    pub fn on_open(&mut self) {
        self.status = ConnectionStatus::Connected;
    }

    pub fn on_error(&mut self, message: impl Into<String>) {
        self.status = ConnectionStatus::Error {
            message: message.into(),
        };
    }

    pub fn on_close(&mut self) {
        self.status = ConnectionStatus::Disconnected;
    }

    /// Route a frame to the handler for its event name.
    ///
    /// Unknown names are ignored and return `Ok(None)`. A payload that is not
    /// valid JSON returns the parse error and leaves the state untouched;
    /// absent fields leave their value untouched.
    pub fn apply_frame(&mut self, frame: &SseFrame) -> serde_json::Result<Option<EventName>> {
        let Ok(name) = frame.event.parse::<EventName>() else {
            return Ok(None);
        };

        match StreamEvent::from_parts(name, &frame.data)? {
            StreamEvent::Connected(p) => {
                if let Some(message) = p.message {
                    self.message = Some(message);
                }
            }
            StreamEvent::Counter(p) => {
                if let Some(count) = p.count {
                    self.count = Some(count);
                }
            }
            StreamEvent::Random(p) => {
                if let Some(number) = p.number {
                    self.random = Some(number);
                }
            }
        }

        self.events_received += 1;
        Ok(Some(name))
    }
}
