//! C ABI exported functions
//!
//! Every export resolves its handle through the global [`HandleRegistry`],
//! enters the instance log scope so `tracing` output reaches that instance's
//! host callback, and contains panics with [`catch_panic`].

use crate::binary_types::{RbBytesOwned, RbResponse, RbStringOwned, borrowed_slice};
use crate::handle::PluginHandle;
use crate::panic_guard::{catch_panic, install_panic_hook};
use crate::registry::{HandleId, HandleRegistry};
use plugwire_core::{
    LifecycleState, LogLevel, Plugin, PluginConfig, PluginError, PluginResult, STATE_SENTINEL,
};
use plugwire_logging::{LogCallback, LogChannel, LogScope};
use std::ffi::c_void;
use std::panic::AssertUnwindSafe;
use std::ptr;
use std::sync::Arc;

/// Opaque handle type for FFI
pub type FfiPluginHandle = *mut c_void;

fn handle_id(handle: FfiPluginHandle) -> HandleId {
    HandleId::from_raw(handle.addr() as u64)
}

fn lookup(id: HandleId) -> Option<Arc<PluginHandle>> {
    HandleRegistry::<PluginHandle>::global().get(id)
}

fn unknown_handle() -> PluginError {
    PluginError::InvalidState("unknown plugin handle".to_string())
}

/// Initialize a plugin instance
///
/// # Parameters
/// - `plugin_ptr`: Plugin from `plugin_create`; ownership passes to this call
/// - `config_json`: JSON configuration, or null for defaults
/// - `config_len`: Length of `config_json`; 0 also selects defaults
/// - `log_callback`: Optional log callback, used for the instance lifetime
///
/// # Returns
/// Handle of an `Active` instance, or null on failure. The failure reason
/// (`CONFIG`, `INIT_FAILED`, ...) is reported through the log callback.
///
/// # Safety
/// - `plugin_ptr` must come from `plugin_create` and not be reused afterwards
/// - `config_json` must be valid for `config_len` bytes if not null
#[unsafe(no_mangle)]
pub unsafe extern "C" fn plugin_init(
    plugin_ptr: *mut c_void,
    config_json: *const u8,
    config_len: usize,
    log_callback: Option<LogCallback>,
) -> FfiPluginHandle {
    catch_panic(
        None,
        AssertUnwindSafe(|| unsafe {
            plugin_init_impl(plugin_ptr, config_json, config_len, log_callback)
        }),
    )
    .unwrap_or(ptr::null_mut())
}

unsafe fn plugin_init_impl(
    plugin_ptr: *mut c_void,
    config_json: *const u8,
    config_len: usize,
    log_callback: Option<LogCallback>,
) -> FfiPluginHandle {
    if plugin_ptr.is_null() {
        return ptr::null_mut();
    }
    // SAFETY: caller guarantees plugin_ptr came from plugin_create
    let plugin: Box<Box<dyn Plugin>> =
        unsafe { Box::from_raw(plugin_ptr.cast::<Box<dyn Plugin>>()) };

    let logs = Arc::new(LogChannel::from_callback(log_callback, LogLevel::Info));
    let _scope = LogScope::enter(logs.clone());
    plugwire_logging::init_logging();
    install_panic_hook();

    // SAFETY: caller guarantees config_json is valid for config_len bytes
    let config = unsafe { borrowed_slice(config_json, config_len) };

    match start_instance(*plugin, config.unwrap_or_default(), logs.clone()) {
        Ok(id) => ptr::without_provenance_mut(id.as_raw() as usize),
        Err(e) => {
            tracing::error!(code = e.error_code(), "plugin initialization failed: {e}");
            logs.detach();
            ptr::null_mut()
        }
    }
}

fn start_instance(
    plugin: Box<dyn Plugin>,
    config: &[u8],
    logs: Arc<LogChannel>,
) -> PluginResult<HandleId> {
    let config = PluginConfig::from_json(config)?;
    logs.set_level(config.log_level()?);

    let instance = Arc::new(PluginHandle::new(plugin, config, logs)?);
    instance.start()?;

    HandleRegistry::<PluginHandle>::global()
        .insert(instance)
        .ok_or_else(|| PluginError::Runtime("plugin handle space exhausted".to_string()))
}

/// Make a synchronous binary call to the plugin
///
/// # Parameters
/// - `handle`: Plugin handle from `plugin_init`
/// - `message_id`: Numeric message identifier
/// - `request`: Pointer to the request struct, or null for no request
/// - `request_size`: Size of the request in bytes
///
/// # Returns
/// Response envelope; always release it with `rb_response_free`
///
/// # Safety
/// - `request` must be valid for `request_size` bytes if not null
#[unsafe(no_mangle)]
pub unsafe extern "C" fn plugin_call_raw(
    handle: FfiPluginHandle,
    message_id: u32,
    request: *const c_void,
    request_size: usize,
) -> RbResponse {
    let id = handle_id(handle);
    match catch_panic(
        Some(id),
        AssertUnwindSafe(|| unsafe { plugin_call_raw_impl(id, message_id, request, request_size) }),
    ) {
        Ok(response) => response,
        Err(e) => RbResponse::from_error(&e),
    }
}

unsafe fn plugin_call_raw_impl(
    id: HandleId,
    message_id: u32,
    request: *const c_void,
    request_size: usize,
) -> RbResponse {
    let Some(instance) = lookup(id) else {
        return RbResponse::from_error(&unknown_handle());
    };
    let _scope = LogScope::enter(instance.logs().clone());

    // SAFETY: caller guarantees request is valid for request_size bytes
    let request = unsafe { borrowed_slice(request.cast::<u8>(), request_size) };
    RbResponse::from_result(instance.call(message_id, request.unwrap_or_default()))
}

/// Release an envelope returned by `plugin_call_raw`
///
/// The struct fields are reset afterwards. Releasing an already released or
/// foreign envelope is detected and ignored.
///
/// # Safety
/// - `response` must be null or point to a writable `RbResponse`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rb_response_free(response: *mut RbResponse) {
    // SAFETY: caller guarantees the pointer is null or valid
    if let Some(response) = unsafe { response.as_mut() } {
        let _ = catch_panic(None, AssertUnwindSafe(|| response.release()));
    }
}

/// Release a string returned by `plugin_get_metadata`
///
/// # Safety
/// - `string` must be null or point to a writable `RbStringOwned`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rb_string_free(string: *mut RbStringOwned) {
    // SAFETY: caller guarantees the pointer is null or valid
    if let Some(string) = unsafe { string.as_mut() } {
        let _ = catch_panic(None, AssertUnwindSafe(|| string.release()));
    }
}

/// Release bytes returned by `plugin_get_message_ids`
///
/// # Safety
/// - `bytes` must be null or point to a writable `RbBytesOwned`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rb_bytes_free(bytes: *mut RbBytesOwned) {
    // SAFETY: caller guarantees the pointer is null or valid
    if let Some(bytes) = unsafe { bytes.as_mut() } {
        let _ = catch_panic(None, AssertUnwindSafe(|| bytes.release()));
    }
}

/// Shutdown a plugin instance
///
/// Waits for in-flight calls, runs the stop hook and stops the instance
/// runtime. The handle stays valid so `plugin_get_state` can report the
/// outcome; retire it with `plugin_release`.
///
/// # Returns
/// true when the instance is `Stopped` (also for a repeated call), false on
/// failure or for an unknown handle
#[unsafe(no_mangle)]
pub extern "C" fn plugin_shutdown(handle: FfiPluginHandle) -> bool {
    let id = handle_id(handle);
    catch_panic(Some(id), AssertUnwindSafe(|| plugin_shutdown_impl(id))).unwrap_or(false)
}

fn plugin_shutdown_impl(id: HandleId) -> bool {
    let Some(instance) = lookup(id) else {
        return false;
    };
    let _scope = LogScope::enter(instance.logs().clone());

    match instance.shutdown() {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(code = e.error_code(), "shutdown error: {e}");
            false
        }
    }
}

/// Retire a handle
///
/// An instance that is not stopped yet is shut down first. Afterwards the
/// handle is stale: `plugin_get_state` returns 255 and calls fail with
/// `INVALID_STATE`.
///
/// # Returns
/// true when `handle` was live
#[unsafe(no_mangle)]
pub extern "C" fn plugin_release(handle: FfiPluginHandle) -> bool {
    let id = handle_id(handle);
    catch_panic(None, AssertUnwindSafe(|| plugin_release_impl(id))).unwrap_or(false)
}

fn plugin_release_impl(id: HandleId) -> bool {
    let Some(instance) = HandleRegistry::<PluginHandle>::global().remove(id) else {
        return false;
    };
    {
        let _scope = LogScope::enter(instance.logs().clone());
        if instance.state() != LifecycleState::Stopped {
            if let Err(e) = instance.shutdown() {
                tracing::warn!("released instance did not stop cleanly: {e}");
            }
        }
        tracing::debug!("plugin handle released");
    }
    instance.logs().detach();
    true
}

/// Set the log level for a plugin
///
/// # Parameters
/// - `level`: 0=Trace, 1=Debug, 2=Info, 3=Warn, 4=Error, 5 or above=Off
#[unsafe(no_mangle)]
pub extern "C" fn plugin_set_log_level(handle: FfiPluginHandle, level: u8) {
    let id = handle_id(handle);
    let _ = catch_panic(
        None,
        AssertUnwindSafe(|| {
            if let Some(instance) = lookup(id) {
                let level = LogLevel::from_u8(level);
                instance.set_log_level(level);
                let _scope = LogScope::enter(instance.logs().clone());
                tracing::debug!("log level set to {level}");
            }
        }),
    );
}

/// Get the current lifecycle state of a plugin
///
/// # Returns
/// 0=Installed, 1=Starting, 2=Active, 3=Stopping, 4=Stopped, 5=Failed, or 255
/// for a handle that is unknown or released
#[unsafe(no_mangle)]
pub extern "C" fn plugin_get_state(handle: FfiPluginHandle) -> u8 {
    let id = handle_id(handle);
    catch_panic(
        None,
        AssertUnwindSafe(|| lookup(id).map_or(STATE_SENTINEL, |h| h.state().code())),
    )
    .unwrap_or(STATE_SENTINEL)
}

/// Number of calls rejected because the concurrency limit was reached
///
/// Returns 0 for an unknown handle.
#[unsafe(no_mangle)]
pub extern "C" fn plugin_get_rejected_count(handle: FfiPluginHandle) -> u64 {
    let id = handle_id(handle);
    catch_panic(
        None,
        AssertUnwindSafe(|| lookup(id).map_or(0, |h| h.rejected_count())),
    )
    .unwrap_or(0)
}

/// Describe a plugin as a JSON object
///
/// Fields: `name`, `version`, `description` (null when the plugin reports no
/// metadata), `state` and `message_ids`.
///
/// # Returns
/// Owned string to release with `rb_string_free`; absent for an unknown handle
#[unsafe(no_mangle)]
pub extern "C" fn plugin_get_metadata(handle: FfiPluginHandle) -> RbStringOwned {
    let id = handle_id(handle);
    catch_panic(None, AssertUnwindSafe(|| plugin_get_metadata_impl(id)))
        .unwrap_or_else(|_| RbStringOwned::none())
}

fn plugin_get_metadata_impl(id: HandleId) -> RbStringOwned {
    let Some(instance) = lookup(id) else {
        return RbStringOwned::none();
    };
    let _scope = LogScope::enter(instance.logs().clone());

    let encoded = serde_json::to_string(&instance.report())
        .map_err(|e| PluginError::Serialization(e.to_string()))
        .and_then(|json| RbStringOwned::from_slice(&json));
    encoded.unwrap_or_else(|e| {
        tracing::error!("failed to encode plugin metadata: {e}");
        RbStringOwned::none()
    })
}

/// Registered message ids as native-endian `u32`s, ascending
///
/// # Returns
/// Owned bytes to release with `rb_bytes_free`; absent for an unknown handle
#[unsafe(no_mangle)]
pub extern "C" fn plugin_get_message_ids(handle: FfiPluginHandle) -> RbBytesOwned {
    let id = handle_id(handle);
    catch_panic(
        None,
        AssertUnwindSafe(|| {
            let Some(instance) = lookup(id) else {
                return RbBytesOwned::none();
            };
            let bytes: Vec<u8> = instance
                .message_ids()
                .into_iter()
                .flat_map(u32::to_ne_bytes)
                .collect();
            RbBytesOwned::from_slice(&bytes).unwrap_or_else(|_| RbBytesOwned::none())
        }),
    )
    .unwrap_or_else(|_| RbBytesOwned::none())
}
