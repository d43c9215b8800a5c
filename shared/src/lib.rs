//! Types and wire helpers shared by the event stream server and the tui client.

pub mod config;
pub mod framing;
pub mod types;
