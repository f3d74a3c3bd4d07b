//! plugwire-ffi - C ABI exports and owned buffer management
//!
//! This crate is the boundary layer between a host process and a plugin:
//! - [`RbString`]/[`RbBytes`] borrowed views and the owned
//!   [`RbStringOwned`]/[`RbBytesOwned`]/[`RbResponse`] buffers
//! - [`AllocationLedger`] tracking every owned buffer until the host frees it
//! - [`PluginHandle`] instances addressed through a generational
//!   [`HandleRegistry`]
//! - the `extern "C"` functions below
//!
//! # FFI Functions
//!
//! - `plugin_create` - generated by [`plugin_entry!`], allocates the plugin
//! - `plugin_init` - configure and start an instance, returns its handle
//! - `plugin_call_raw` - synchronous binary request keyed by message id
//! - `rb_response_free`, `rb_string_free`, `rb_bytes_free` - release owned buffers
//! - `plugin_shutdown` - stop an instance; the handle keeps reporting its state
//! - `plugin_release` - retire a handle
//! - `plugin_get_state`, `plugin_set_log_level`, `plugin_get_rejected_count`
//! - `plugin_get_metadata`, `plugin_get_message_ids` - introspection

mod binary_types;
mod exports;
mod handle;
mod ledger;
mod panic_guard;
mod registry;

pub use binary_types::{RbBytes, RbBytesOwned, RbResponse, RbString, RbStringOwned};
pub use handle::{HandleReport, PluginHandle};
pub use ledger::{Allocation, AllocationLedger};
pub use panic_guard::{catch_panic, install_panic_hook};
pub use registry::{HandleId, HandleRegistry};

pub use exports::{
    FfiPluginHandle, plugin_call_raw, plugin_get_message_ids, plugin_get_metadata,
    plugin_get_rejected_count, plugin_get_state, plugin_init, plugin_release,
    plugin_set_log_level, plugin_shutdown, rb_bytes_free, rb_response_free, rb_string_free,
};

pub use plugwire_core::{LogLevel, Plugin, PluginConfig, PluginContext, PluginError};
pub use plugwire_logging::LogCallback;

/// Box a plugin the way `plugin_init` expects to receive it
///
/// The pointer owns the plugin until it is passed to `plugin_init`, which
/// takes ownership whether or not initialization succeeds.
pub fn into_plugin_ptr<P: Plugin>(plugin: P) -> *mut std::ffi::c_void {
    let plugin: Box<dyn Plugin> = Box::new(plugin);
    Box::into_raw(Box::new(plugin)).cast()
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AllocationLedger, HandleId, HandleRegistry, PluginHandle, RbBytes, RbBytesOwned,
        RbResponse, RbString, RbStringOwned,
    };
    pub use plugwire_core::prelude::*;
    pub use plugwire_logging::prelude::*;
    pub use plugwire_runtime::prelude::*;
    pub use plugwire_transport::prelude::*;
}

/// Generate the `plugin_create` entry point for a plugin
///
/// # Example
///
/// ```ignore
/// use plugwire_ffi::prelude::*;
///
/// struct MyPlugin;
///
/// // ... implement Plugin ...
///
/// plugwire_ffi::plugin_entry!(|| MyPlugin);
/// ```
#[macro_export]
macro_rules! plugin_entry {
    ($factory:expr) => {
        /// Allocate a plugin instance for `plugin_init`
        #[unsafe(no_mangle)]
        pub extern "C" fn plugin_create() -> *mut ::std::ffi::c_void {
            match ::std::panic::catch_unwind(|| $crate::into_plugin_ptr(($factory)())) {
                Ok(ptr) => ptr,
                Err(_) => ::std::ptr::null_mut(),
            }
        }
    };
}
