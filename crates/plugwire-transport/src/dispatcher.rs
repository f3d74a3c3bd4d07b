//! Message-id dispatcher for the binary transport

use crate::limit::ConcurrencyLimit;
use parking_lot::{RwLock, RwLockWriteGuard};
use plugwire_core::{HandlerRegistry, PluginContext, PluginError, PluginResult, RequestContext};
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Routes transport calls of one plugin instance to their handlers
///
/// Every call holds the instance gate in shared mode from the state check
/// until the handler returns. Lifecycle transitions take the gate exclusively
/// through [`Dispatcher::quiesce`], so a call that saw `Active` always runs to
/// completion before shutdown proceeds, and later calls see the new state.
pub struct Dispatcher {
    handlers: HandlerRegistry,
    gate: RwLock<()>,
    limit: ConcurrencyLimit,
}

impl Dispatcher {
    pub fn new(handlers: HandlerRegistry, max_concurrent_ops: usize) -> Self {
        Self {
            handlers,
            gate: RwLock::new(()),
            limit: ConcurrencyLimit::new(max_concurrent_ops),
        }
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Number of calls rejected by the concurrency limit
    pub fn rejected_count(&self) -> u64 {
        self.limit.rejected()
    }

    pub fn in_flight(&self) -> usize {
        self.limit.in_flight()
    }

    /// Wait for in-flight calls to drain and block new ones while the guard lives
    ///
    /// Must not be called from inside a handler of the same instance.
    pub fn quiesce(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write()
    }

    /// Dispatch one request
    ///
    /// Checks run in a fixed order: lifecycle state, handler lookup, request
    /// size, concurrency limit. A panicking handler is reported as `Internal`
    /// and moves the instance to `Failed`.
    pub fn dispatch(
        &self,
        plugin: &PluginContext,
        message_id: u32,
        request: &[u8],
    ) -> PluginResult<Vec<u8>> {
        let _gate = self.gate.read();

        let state = plugin.state();
        if !state.can_handle_requests() {
            return Err(PluginError::not_active(state));
        }

        let route = self
            .handlers
            .get(message_id)
            .ok_or(PluginError::UnknownMessage(message_id))?;

        route.check_size(message_id, request.len())?;

        let Some(_permit) = self.limit.try_acquire() else {
            tracing::warn!(message_id, limit = self.limit.max(), "concurrency limit reached");
            return Err(PluginError::Runtime(format!(
                "concurrency limit of {} calls reached",
                self.limit.max()
            )));
        };

        let ctx = RequestContext::new(message_id, plugin);
        match catch_unwind(AssertUnwindSafe(|| route.invoke(&ctx, request))) {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                tracing::debug!(message_id, error = %e, "handler returned an error");
                Err(e.into_handler_outcome())
            }
            Err(payload) => {
                let err = PluginError::from_panic(payload.as_ref());
                tracing::error!(message_id, "{err}");
                if plugin.mark_failed() {
                    tracing::warn!("plugin marked as failed after handler panic");
                }
                Err(err)
            }
        }
    }
}
