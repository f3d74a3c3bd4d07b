//! Calculator plugin shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use plugwire_core::{
    HandlerRegistry, Plugin, PluginContext, PluginError, PluginResult, RawMessage,
};
use plugwire_ffi::{FfiPluginHandle, RbResponse, into_plugin_ptr, plugin_call_raw, plugin_init};
use std::time::Duration;

pub const MSG_ADD: u32 = 1;
pub const MSG_TAGGED: u32 = 2;
pub const MSG_SLEEP: u32 = 3;
pub const MSG_PANIC: u32 = 4;
pub const MSG_FAIL: u32 = 5;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AddRequest {
    pub a: i64,
    pub b: i64,
}

unsafe impl RawMessage for AddRequest {}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AddResponse {
    pub sum: i64,
}

unsafe impl RawMessage for AddResponse {}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tagged {
    pub caller: u64,
    pub seq: u64,
}

unsafe impl RawMessage for Tagged {}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SleepRequest {
    pub millis: u64,
}

unsafe impl RawMessage for SleepRequest {}

pub struct Calculator;

#[async_trait]
impl Plugin for Calculator {
    fn register_handlers(&self, handlers: &mut HandlerRegistry) -> PluginResult<()> {
        handlers.register(MSG_ADD, |_ctx, req: &AddRequest| {
            Ok(AddResponse {
                sum: req.a.wrapping_add(req.b),
            })
        })?;
        handlers.register(MSG_TAGGED, |_ctx, req: &Tagged| {
            std::thread::yield_now();
            Ok(Tagged {
                caller: req.caller,
                seq: req.seq.wrapping_mul(3),
            })
        })?;
        handlers.register(MSG_SLEEP, |_ctx, req: &SleepRequest| {
            std::thread::sleep(Duration::from_millis(req.millis));
            Ok(*req)
        })?;
        handlers.register_raw(MSG_PANIC, None, |_ctx, _req| panic!("calculator exploded"))?;
        handlers.register_raw(MSG_FAIL, None, |_ctx, _req| {
            Err(PluginError::Handler("division by zero".into()))
        })
    }

    async fn on_start(&self, _ctx: &PluginContext) -> PluginResult<()> {
        Ok(())
    }

    async fn on_stop(&self, _ctx: &PluginContext) -> PluginResult<()> {
        Ok(())
    }
}

/// Init a calculator with an optional JSON config
pub fn init_calculator(config: Option<&str>) -> FfiPluginHandle {
    let plugin = into_plugin_ptr(Calculator);
    let (ptr, len) = config.map_or((std::ptr::null(), 0), |c| (c.as_ptr(), c.len()));
    unsafe { plugin_init(plugin, ptr, len, None) }
}

/// Call with a typed request
pub fn call<T: RawMessage>(handle: FfiPluginHandle, message_id: u32, request: &T) -> RbResponse {
    unsafe {
        plugin_call_raw(
            handle,
            message_id,
            (request as *const T).cast(),
            std::mem::size_of::<T>(),
        )
    }
}
