//! Tokio runtime owned by one plugin instance

use parking_lot::RwLock;
use plugwire_core::{PluginConfig, PluginError, PluginResult};
use std::future::Future;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

/// Configuration for the async runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of worker threads (None = number of CPU cores)
    pub worker_threads: Option<usize>,
    /// Name prefix for worker threads
    pub thread_name: String,
    /// Maximum blocking threads
    pub max_blocking_threads: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            thread_name: "plugwire-worker".to_string(),
            max_blocking_threads: 64,
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runtime settings derived from a plugin configuration
    pub fn from_plugin_config(config: &PluginConfig) -> Self {
        Self {
            worker_threads: config.worker_threads,
            ..Self::default()
        }
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

/// Manages the Tokio runtime of a plugin instance
///
/// The runtime lives until [`AsyncRuntime::shutdown`]; afterwards every
/// attempt to run a future reports a runtime error.
pub struct AsyncRuntime {
    runtime: RwLock<Option<Runtime>>,
    config: RuntimeConfig,
}

impl AsyncRuntime {
    pub fn new(config: RuntimeConfig) -> PluginResult<Self> {
        let mut builder = Builder::new_multi_thread();

        if let Some(threads) = config.worker_threads {
            builder.worker_threads(threads);
        }

        let runtime = builder
            .thread_name(&config.thread_name)
            .max_blocking_threads(config.max_blocking_threads)
            .enable_all()
            .build()
            .map_err(|e| PluginError::Runtime(format!("failed to create runtime: {e}")))?;

        Ok(Self {
            runtime: RwLock::new(Some(runtime)),
            config,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Drive a future to completion on the calling thread
    ///
    /// Must not be called from inside an async context.
    pub fn block_on<F>(&self, future: F) -> PluginResult<F::Output>
    where
        F: Future,
    {
        let guard = self.runtime.read();
        match guard.as_ref() {
            Some(rt) => Ok(rt.block_on(future)),
            None => Err(PluginError::Runtime("runtime has been shut down".to_string())),
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.runtime.read().is_none()
    }

    /// Stop the runtime, giving spawned tasks up to `timeout` to finish
    ///
    /// Calling this more than once is a no-op.
    pub fn shutdown(&self, timeout: Duration) {
        let taken = self.runtime.write().take();
        if let Some(rt) = taken {
            tracing::debug!(?timeout, "shutting down plugin runtime");
            rt.shutdown_timeout(timeout);
        }
    }
}
