//! Bridge between blocking FFI calls and async lifecycle hooks

use crate::AsyncRuntime;
use plugwire_core::{PluginError, PluginResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Runs plugin futures to completion for a synchronous caller
#[derive(Clone)]
pub struct AsyncBridge {
    runtime: Arc<AsyncRuntime>,
}

impl AsyncBridge {
    pub fn new(runtime: Arc<AsyncRuntime>) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &Arc<AsyncRuntime> {
        &self.runtime
    }

    /// Execute an async operation synchronously (blocking)
    pub fn call_sync<F, T>(&self, future: F) -> PluginResult<T>
    where
        F: Future<Output = PluginResult<T>>,
    {
        self.runtime.block_on(future)?
    }

    /// Execute an async operation, failing with `Timeout` once `timeout` elapses
    pub fn call_sync_timeout<F, T>(&self, future: F, timeout: Duration) -> PluginResult<T>
    where
        F: Future<Output = PluginResult<T>>,
    {
        self.runtime.block_on(async move {
            match tokio::time::timeout(timeout, future).await {
                Ok(result) => result,
                Err(_) => Err(PluginError::Timeout),
            }
        })?
    }

    pub fn is_shutting_down(&self) -> bool {
        self.runtime.is_shutting_down()
    }
}
