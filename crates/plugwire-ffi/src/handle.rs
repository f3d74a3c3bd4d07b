//! Plugin instance management

use crate::registry::HandleRegistry;
use once_cell::sync::Lazy;
use plugwire_core::{
    LifecycleState, LogLevel, Plugin, PluginConfig, PluginContext, PluginError, PluginMetadata,
    PluginResult,
};
use plugwire_logging::LogChannel;
use plugwire_runtime::{AsyncBridge, AsyncRuntime, RuntimeConfig};
use plugwire_transport::Dispatcher;
use serde::Serialize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

static HANDLES: Lazy<HandleRegistry<PluginHandle>> = Lazy::new(HandleRegistry::new);

impl HandleRegistry<PluginHandle> {
    /// Registry resolving the handles given to the host
    pub fn global() -> &'static Self {
        &HANDLES
    }
}

/// One initialized plugin instance
pub struct PluginHandle {
    plugin: Box<dyn Plugin>,
    context: PluginContext,
    dispatcher: Dispatcher,
    runtime: Arc<AsyncRuntime>,
    bridge: AsyncBridge,
    logs: Arc<LogChannel>,
}

/// Introspection record returned to the host as JSON
#[derive(Debug, Serialize)]
pub struct HandleReport {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub state: LifecycleState,
    pub message_ids: Vec<u32>,
}

impl PluginHandle {
    /// Build an instance in the `Installed` state
    ///
    /// Collects the plugin's handlers and creates its runtime. Nothing of the
    /// plugin runs yet apart from `register_handlers`.
    pub fn new(
        plugin: Box<dyn Plugin>,
        config: PluginConfig,
        logs: Arc<LogChannel>,
    ) -> PluginResult<Self> {
        let mut handlers = plugwire_core::HandlerRegistry::new();
        plugin.register_handlers(&mut handlers)?;
        tracing::debug!(handlers = handlers.len(), "handlers registered");

        let runtime = Arc::new(AsyncRuntime::new(RuntimeConfig::from_plugin_config(&config))?);
        let bridge = AsyncBridge::new(runtime.clone());
        let dispatcher = Dispatcher::new(handlers, config.max_concurrent_ops);
        let context = PluginContext::new(config);

        Ok(Self {
            plugin,
            context,
            dispatcher,
            runtime,
            bridge,
            logs,
        })
    }

    pub fn state(&self) -> LifecycleState {
        self.context.state()
    }

    pub fn context(&self) -> &PluginContext {
        &self.context
    }

    /// Log channel of this instance
    pub fn logs(&self) -> &Arc<LogChannel> {
        &self.logs
    }

    pub fn rejected_count(&self) -> u64 {
        self.dispatcher.rejected_count()
    }

    pub fn message_ids(&self) -> Vec<u32> {
        self.dispatcher.handlers().message_ids()
    }

    pub fn metadata(&self) -> Option<PluginMetadata> {
        self.plugin.metadata()
    }

    pub fn report(&self) -> HandleReport {
        let metadata = self.metadata();
        HandleReport {
            name: metadata.as_ref().map(|m| m.name.clone()),
            version: metadata.as_ref().map(|m| m.version.clone()),
            description: metadata.and_then(|m| m.description),
            state: self.state(),
            message_ids: self.message_ids(),
        }
    }

    /// Run `on_start`: `Installed -> Starting -> Active`, or `Failed`
    ///
    /// A failing or panicking start hook leaves the instance `Failed` with its
    /// runtime stopped. Configuration errors keep their kind, everything else
    /// is reported as `InitFailed`.
    pub fn start(&self) -> PluginResult<()> {
        let _exclusive = self.dispatcher.quiesce();
        self.context.transition_to(LifecycleState::Starting)?;

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.bridge.call_sync(self.plugin.on_start(&self.context))
        }))
        .unwrap_or_else(|payload| Err(PluginError::from_panic(payload.as_ref())));

        match outcome {
            Ok(()) => {
                self.context.transition_to(LifecycleState::Active)?;
                tracing::info!("plugin started");
                Ok(())
            }
            Err(e) => {
                self.context.mark_failed();
                self.runtime.shutdown(self.stop_budget() / 2);
                tracing::error!("plugin failed to start: {e}");
                Err(match e {
                    PluginError::Config(_) | PluginError::InitFailed(_) => e,
                    other => PluginError::InitFailed(other.to_string()),
                })
            }
        }
    }

    /// Handle one transport request
    pub fn call(&self, message_id: u32, request: &[u8]) -> PluginResult<Vec<u8>> {
        self.dispatcher.dispatch(&self.context, message_id, request)
    }

    /// Run `on_stop`: `Active -> Stopping -> Stopped`, or `Failed`
    ///
    /// Waits for in-flight calls, then rejects new ones. A stop hook that
    /// overruns `shutdown_timeout_ms` still ends `Stopped`. Returns `Ok` again
    /// for an instance that is already `Stopped`. A `Failed` instance has its
    /// runtime released but reports `InvalidState`.
    pub fn shutdown(&self) -> PluginResult<()> {
        let exclusive = self.dispatcher.quiesce();
        match self.context.state() {
            LifecycleState::Active => {}
            LifecycleState::Stopped => return Ok(()),
            LifecycleState::Failed => {
                self.runtime.shutdown(self.stop_budget() / 2);
                return Err(PluginError::not_active(LifecycleState::Failed));
            }
            other => return Err(PluginError::not_active(other)),
        }
        self.context.transition_to(LifecycleState::Stopping)?;
        // Calls arriving from here on observe `Stopping` and are rejected.
        drop(exclusive);

        let budget = self.stop_budget();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.bridge
                .call_sync_timeout(self.plugin.on_stop(&self.context), budget)
        }))
        .unwrap_or_else(|payload| Err(PluginError::from_panic(payload.as_ref())));

        self.runtime.shutdown(budget / 2);

        match outcome {
            Ok(()) => {
                self.context.transition_to(LifecycleState::Stopped)?;
                tracing::info!("plugin stopped");
                Ok(())
            }
            Err(PluginError::Timeout) => {
                self.context.transition_to(LifecycleState::Stopped)?;
                tracing::warn!(timeout_ms = budget.as_millis() as u64, "plugin stop hook timed out");
                Ok(())
            }
            Err(e) => {
                self.context.mark_failed();
                tracing::error!("plugin shutdown failed: {e}");
                Err(PluginError::ShutdownFailed(e.to_string()))
            }
        }
    }

    /// Threshold for later records of this instance
    pub fn set_log_level(&self, level: LogLevel) {
        self.logs.set_level(level);
    }

    fn stop_budget(&self) -> Duration {
        Duration::from_millis(self.context.config().shutdown_timeout_ms)
    }
}

#[cfg(test)]
#[path = "handle/handle_tests.rs"]
mod handle_tests;
