//! plugwire-runtime - Tokio runtime integration
//!
//! Each plugin instance owns an [`AsyncRuntime`]. Its async lifecycle hooks are
//! driven to completion by an [`AsyncBridge`] on the thread that issued the
//! blocking FFI call.

mod bridge;
mod runtime;

pub use bridge::AsyncBridge;
pub use runtime::{AsyncRuntime, RuntimeConfig};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{AsyncBridge, AsyncRuntime, RuntimeConfig};
}
