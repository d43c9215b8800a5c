// shared/src/types/event.rs
// Event catalog for GET /api/events

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Fixed path of the streaming endpoint.
pub const EVENTS_PATH: &str = "/api/events";

/// Cadence of the `counter` emitter.
pub const COUNTER_INTERVAL: Duration = Duration::from_secs(1);

/// Cadence of the `random` emitter.
pub const RANDOM_INTERVAL: Duration = Duration::from_secs(2);

/// Exclusive upper bound of the `random` payload. Values are drawn from `[0, RANDOM_UPPER_BOUND)`.
pub const RANDOM_UPPER_BOUND: u32 = 100;

/// Message carried by the handshake event.
pub const CONNECTED_MESSAGE: &str = "Connected to event stream";

/// Name tag of an event on the wire. Determines the payload shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventName {
    Connected,
    Counter,
    Random,
}

impl EventName {
    pub const ALL: [EventName; 3] = [EventName::Connected, EventName::Counter, EventName::Random];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::Connected => "connected",
            EventName::Counter => "counter",
            EventName::Random => "random",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connected" => Ok(EventName::Connected),
            "counter" => Ok(EventName::Counter),
            "random" => Ok(EventName::Random),
            other => Err(format!("unknown event name: {}", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------
//
// Fields are optional on the way in: a payload that parses as JSON but lacks
// a field leaves the corresponding view value untouched.

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
}

/// One event pushed from server to client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    Connected(ConnectedPayload),
    Counter(CounterPayload),
    Random(RandomPayload),
}

impl StreamEvent {
    /// The handshake event sent once when a stream opens.
    pub fn connected() -> Self {
        StreamEvent::Connected(ConnectedPayload {
            message: Some(CONNECTED_MESSAGE.to_string()),
        })
    }

    pub fn counter(count: u64) -> Self {
        StreamEvent::Counter(CounterPayload { count: Some(count) })
    }

    pub fn random(number: u32) -> Self {
        StreamEvent::Random(RandomPayload {
            number: Some(number),
        })
    }

    pub fn name(&self) -> EventName {
        match self {
            StreamEvent::Connected(_) => EventName::Connected,
            StreamEvent::Counter(_) => EventName::Counter,
            StreamEvent::Random(_) => EventName::Random,
        }
    }

    /// Serialise the payload to the JSON carried on the `data:` line.
    pub fn data_json(&self) -> serde_json::Result<String> {
        match self {
            StreamEvent::Connected(p) => serde_json::to_string(p),
            StreamEvent::Counter(p) => serde_json::to_string(p),
            StreamEvent::Random(p) => serde_json::to_string(p),
        }
    }

    /// Parse a payload for a known event name.
    pub fn from_parts(name: EventName, data: &str) -> serde_json::Result<Self> {
        Ok(match name {
            EventName::Connected => StreamEvent::Connected(serde_json::from_str(data)?),
            EventName::Counter => StreamEvent::Counter(serde_json::from_str(data)?),
            EventName::Random => StreamEvent::Random(serde_json::from_str(data)?),
        })
    }
}
