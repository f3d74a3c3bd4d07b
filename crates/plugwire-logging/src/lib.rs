//! plugwire-logging - Host log channel for plugin instances
//!
//! This crate provides:
//! - [`LogChannel`], the per-instance leveled channel, and the [`LogSink`]
//!   capability it forwards to
//! - [`CallbackSink`] adapting the host [`LogCallback`]
//! - [`ChannelLayer`], a tracing layer that routes events to the channel
//!   entered on the current thread with [`LogScope`]

mod channel;
mod layer;

pub use channel::{CallbackSink, LogCallback, LogChannel, LogScope, LogSink};
pub use layer::{ChannelLayer, init_logging};
pub use plugwire_core::LogLevel;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{LogCallback, LogChannel, LogLevel, LogScope, LogSink, init_logging};
}
