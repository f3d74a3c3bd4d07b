//! plugwire-transport - Binary message dispatch
//!
//! A plugin instance receives requests as `(message_id, bytes)` pairs. The
//! [`Dispatcher`] gates each call on the lifecycle state, looks up the
//! registered handler, validates fixed-size payloads and isolates handler
//! panics from the host.

mod dispatcher;
mod limit;

pub use dispatcher::Dispatcher;
pub use limit::{ConcurrencyLimit, Permit};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{ConcurrencyLimit, Dispatcher};
}
