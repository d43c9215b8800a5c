//! Terminal client for the live event stream.

pub mod source;
pub mod subscription;
pub mod ui;
pub mod view;

pub use source::{ReconnectPolicy, SourceError};
pub use subscription::{Subscription, subscribe, subscribe_with_policy};
pub use view::{ClientViewState, ConnectionStatus};
