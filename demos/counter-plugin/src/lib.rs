//! counter-plugin - Example plugwire plugin
//!
//! Shows the pieces a plugin library needs: `#[repr(C)]` message structs,
//! handler registration, lifecycle hooks, the generated entry point and the
//! re-exported C ABI.
//!
//! # Message IDs
//!
//! | Message | ID | Request | Response |
//! |---------|----|---------|----------|
//! | add | 1 | [`AddRequest`] | [`AddResponse`] |
//! | increment | 2 | [`IncrementRequest`] | [`CounterValue`] |
//! | echo | 3 | any bytes | the same bytes |
//! | slow | 4 | [`SlowRequest`] | [`SlowResponse`] |
//! | fail | 5 | any bytes | always `HANDLER` |
//! | panic | 6 | any bytes | always `INTERNAL` |

use plugwire::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub const MSG_ADD: u32 = 1;
pub const MSG_INCREMENT: u32 = 2;
pub const MSG_ECHO: u32 = 3;
pub const MSG_SLOW: u32 = 4;
pub const MSG_FAIL: u32 = 5;
pub const MSG_PANIC: u32 = 6;

// ============================================================================
// Message Types
// ============================================================================

/// Add two signed integers
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AddRequest {
    pub a: i64,
    pub b: i64,
}

unsafe impl RawMessage for AddRequest {}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AddResponse {
    pub sum: i64,
}

unsafe impl RawMessage for AddResponse {}

/// Bump the instance counter
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncrementRequest {
    pub amount: u64,
}

unsafe impl RawMessage for IncrementRequest {}

/// Counter value after an increment
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CounterValue {
    pub value: u64,
}

unsafe impl RawMessage for CounterValue {}

/// Simulated work with a caller-supplied deadline
///
/// A `deadline_ms` of 0 means no deadline.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlowRequest {
    pub work_ms: u32,
    pub deadline_ms: u32,
}

unsafe impl RawMessage for SlowRequest {}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlowResponse {
    pub elapsed_ms: u64,
}

unsafe impl RawMessage for SlowResponse {}

// ============================================================================
// Plugin Implementation
// ============================================================================

/// Counter plugin; one counter per loaded instance
#[derive(Default)]
pub struct CounterPlugin {
    counter: Arc<AtomicU64>,
}

impl CounterPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle_add(req: &AddRequest) -> PluginResult<AddResponse> {
        tracing::debug!("adding {} + {}", req.a, req.b);
        req.a
            .checked_add(req.b)
            .map(|sum| AddResponse { sum })
            .ok_or_else(|| PluginError::Handler(format!("{} + {} overflows", req.a, req.b)))
    }

    /// Sleep in small steps so the deadline is observed promptly
    fn handle_slow(req: &SlowRequest) -> PluginResult<SlowResponse> {
        let started = Instant::now();
        let work = Duration::from_millis(u64::from(req.work_ms));
        let deadline = (req.deadline_ms > 0).then(|| Duration::from_millis(u64::from(req.deadline_ms)));

        while started.elapsed() < work {
            if deadline.is_some_and(|d| started.elapsed() >= d) {
                tracing::warn!(deadline_ms = req.deadline_ms, "slow request hit its deadline");
                return Err(PluginError::Timeout);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        Ok(SlowResponse {
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[async_trait]
impl Plugin for CounterPlugin {
    fn register_handlers(&self, handlers: &mut HandlerRegistry) -> PluginResult<()> {
        handlers.register(MSG_ADD, |_ctx, req: &AddRequest| Self::handle_add(req))?;

        let counter = self.counter.clone();
        handlers.register(MSG_INCREMENT, move |_ctx, req: &IncrementRequest| {
            let value = counter.fetch_add(req.amount, Ordering::SeqCst) + req.amount;
            Ok(CounterValue { value })
        })?;

        handlers.register_raw(MSG_ECHO, None, |_ctx, req| Ok(req.to_vec()))?;
        handlers.register(MSG_SLOW, |_ctx, req: &SlowRequest| Self::handle_slow(req))?;
        handlers.register_raw(MSG_FAIL, None, |ctx, _req| {
            Err(PluginError::Handler(format!(
                "message {} always fails",
                ctx.message_id()
            )))
        })?;
        handlers.register_raw(MSG_PANIC, None, |_ctx, _req| {
            panic!("counter-plugin was asked to panic")
        })
    }

    async fn on_start(&self, ctx: &PluginContext) -> PluginResult<()> {
        if let Some(start) = ctx.config().get_init_param::<u64>("start_value") {
            self.counter.store(start, Ordering::SeqCst);
        }
        tracing::info!(
            start_value = self.counter.load(Ordering::SeqCst),
            "counter-plugin started"
        );
        Ok(())
    }

    async fn on_stop(&self, _ctx: &PluginContext) -> PluginResult<()> {
        tracing::info!(
            final_value = self.counter.load(Ordering::SeqCst),
            "counter-plugin stopped"
        );
        Ok(())
    }

    fn metadata(&self) -> Option<PluginMetadata> {
        Some(
            PluginMetadata::new("counter-plugin", env!("CARGO_PKG_VERSION"))
                .with_description("Example plugwire plugin"),
        )
    }
}

// Generate the FFI entry point
plugin_entry!(CounterPlugin::new);

// Re-export the C ABI from plugwire-ffi
pub use plugwire::ffi_exports::*;
