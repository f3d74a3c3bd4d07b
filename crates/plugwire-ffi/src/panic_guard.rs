//! Panic containment at the C boundary
//!
//! Unwinding into the host is undefined behavior, so every export runs its
//! body through [`catch_panic`].

use crate::handle::PluginHandle;
use crate::registry::{HandleId, HandleRegistry};
use plugwire_core::PluginError;
use std::panic::{self, PanicHookInfo, UnwindSafe};
use std::sync::Once;

static HOOK: Once = Once::new();

/// Run `f`, converting a panic into [`PluginError::Internal`]
///
/// When `handle` resolves to a live instance, that instance is moved to
/// `Failed`: a panic outside handler code means its invariants can no longer
/// be trusted.
pub fn catch_panic<F, R>(handle: Option<HandleId>, f: F) -> Result<R, PluginError>
where
    F: FnOnce() -> R + UnwindSafe,
{
    panic::catch_unwind(f).map_err(|payload| {
        let err = PluginError::from_panic(payload.as_ref());
        tracing::error!("panic caught at FFI boundary: {err}");

        let instance = handle.and_then(|id| HandleRegistry::<PluginHandle>::global().get(id));
        if let Some(instance) = instance {
            if instance.context().mark_failed() {
                tracing::warn!("plugin instance marked as failed after panic");
            }
        }
        err
    })
}

/// Install a process-wide hook that reports panic locations through `tracing`
///
/// The previously installed hook still runs afterwards. Only the first call
/// has an effect.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            tracing::error!("{}", describe_panic(info));
            previous(info);
        }));
    });
}

fn describe_panic(info: &PanicHookInfo<'_>) -> String {
    let payload = info.payload();
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("Box<dyn Any>");
    match info.location() {
        Some(location) => format!(
            "panic at {}:{}:{}: {message}",
            location.file(),
            location.line(),
            location.column()
        ),
        None => format!("panic at unknown location: {message}"),
    }
}

#[cfg(test)]
#[path = "panic_guard/panic_guard_tests.rs"]
mod panic_guard_tests;
