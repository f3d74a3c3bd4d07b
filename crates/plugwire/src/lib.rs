//! # plugwire
//!
//! Build Rust shared libraries that a host process loads and drives through a
//! small, fixed C ABI.
//!
//! A plugin registers handlers keyed by numeric message id. Requests and
//! responses are `#[repr(C)]` structs copied across the boundary as raw
//! bytes; every buffer the plugin hands out is tracked until the host frees
//! it. Each loaded instance gets its own lifecycle, async runtime and log
//! callback.
//!
//! ## Quick Start
//!
//! ```toml
//! [lib]
//! crate-type = ["cdylib"]
//!
//! [dependencies]
//! plugwire = "0.1"
//! ```
//!
//! ## Creating a Plugin
//!
//! ```ignore
//! use plugwire::prelude::*;
//!
//! pub const MSG_ADD: u32 = 1;
//!
//! #[repr(C)]
//! #[derive(Clone, Copy)]
//! pub struct AddRequest {
//!     pub a: i64,
//!     pub b: i64,
//! }
//!
//! unsafe impl RawMessage for AddRequest {}
//!
//! #[repr(C)]
//! #[derive(Clone, Copy)]
//! pub struct AddResponse {
//!     pub sum: i64,
//! }
//!
//! unsafe impl RawMessage for AddResponse {}
//!
//! #[derive(Default)]
//! pub struct MyPlugin;
//!
//! #[async_trait]
//! impl Plugin for MyPlugin {
//!     fn register_handlers(&self, handlers: &mut HandlerRegistry) -> PluginResult<()> {
//!         handlers.register(MSG_ADD, |_ctx, req: &AddRequest| {
//!             Ok(AddResponse { sum: req.a + req.b })
//!         })
//!     }
//!
//!     async fn on_start(&self, _ctx: &PluginContext) -> PluginResult<()> {
//!         tracing::info!("plugin started");
//!         Ok(())
//!     }
//!
//!     async fn on_stop(&self, _ctx: &PluginContext) -> PluginResult<()> {
//!         Ok(())
//!     }
//! }
//!
//! // Generate the `plugin_create` entry point
//! plugin_entry!(MyPlugin::default);
//!
//! // Re-export the C ABI from the shared library
//! pub use plugwire::ffi_exports::*;
//! ```
//!
//! ## Crate Structure
//!
//! This is a facade crate that re-exports from:
//! - [`plugwire_core`] - errors, lifecycle, configuration and the plugin trait
//! - [`plugwire_logging`] - per-instance log callbacks
//! - [`plugwire_runtime`] - per-instance Tokio runtime and sync bridge
//! - [`plugwire_transport`] - message dispatch and concurrency limits
//! - [`plugwire_ffi`] - C ABI exports, owned buffers and handles

// Re-export core types
pub use plugwire_core::{
    ErrorCode, HandlerRegistry, LifecycleState, LogLevel, Plugin, PluginConfig, PluginContext,
    PluginError, PluginMetadata, PluginResult, RawMessage, RequestContext, STATE_SENTINEL,
};

// Re-export FFI types
pub use plugwire_ffi::{
    AllocationLedger, FfiPluginHandle, HandleId, PluginHandle, RbBytes, RbBytesOwned,
    RbResponse, RbString, RbStringOwned, into_plugin_ptr, plugin_entry,
};

pub use plugwire_logging::LogCallback;

// Re-export common dependencies that plugin authors need
pub use async_trait::async_trait;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tracing;

/// C ABI functions a plugin library exposes
///
/// Add `pub use plugwire::ffi_exports::*;` to the plugin's lib.rs so the
/// symbols end up in the shared library.
pub mod ffi_exports {
    pub use plugwire_ffi::{
        plugin_call_raw, plugin_get_message_ids, plugin_get_metadata, plugin_get_rejected_count,
        plugin_get_state, plugin_init, plugin_release, plugin_set_log_level, plugin_shutdown,
        rb_bytes_free, rb_response_free, rb_string_free,
    };
}

/// Prelude module for convenient imports.
///
/// Use `use plugwire::prelude::*;` to import commonly used types.
pub mod prelude {
    pub use crate::{
        ErrorCode, HandlerRegistry, LifecycleState, LogLevel, Plugin, PluginConfig,
        PluginContext, PluginError, PluginMetadata, PluginResult, RawMessage, RequestContext,
        async_trait, plugin_entry,
    };

    pub use serde::{Deserialize, Serialize};
}
