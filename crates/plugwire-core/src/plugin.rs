//! Plugin trait and per-instance context

use crate::{HandlerRegistry, LifecycleState, PluginConfig, PluginError, PluginResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU8, Ordering};

/// Context shared by the lifecycle hooks and every handler of one instance
pub struct PluginContext {
    config: PluginConfig,
    state: AtomicU8,
}

impl PluginContext {
    pub fn new(config: PluginConfig) -> Self {
        Self {
            config,
            state: AtomicU8::new(LifecycleState::Installed.code()),
        }
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_code(self.state.load(Ordering::Acquire))
            .unwrap_or(LifecycleState::Failed)
    }

    /// Atomically move to `target` if the current state allows it
    ///
    /// Two racing callers cannot both apply the same transition: the loser
    /// observes the winner's state and gets `InvalidState`.
    pub fn transition_to(&self, target: LifecycleState) -> PluginResult<LifecycleState> {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |code| {
                LifecycleState::from_code(code)
                    .filter(|current| current.can_transition_to(target))
                    .map(|_| target.code())
            })
            .map(|previous| LifecycleState::from_code(previous).unwrap_or(LifecycleState::Failed))
            .map_err(|actual| {
                let actual = LifecycleState::from_code(actual).unwrap_or(LifecycleState::Failed);
                PluginError::InvalidState(format!("cannot move from {actual} to {target}"))
            })
    }

    /// Move to `Failed` unless the instance already reached a terminal state
    ///
    /// Returns true when this call performed the transition.
    pub fn mark_failed(&self) -> bool {
        self.transition_to(LifecycleState::Failed).is_ok()
    }
}

/// Main trait for implementing plugwire plugins
///
/// Lifecycle hooks are async and run on the instance runtime; transport
/// handlers are plain synchronous closures registered once at init.
///
/// # Example
///
/// ```ignore
/// use plugwire_core::prelude::*;
///
/// struct Adder;
///
/// #[async_trait::async_trait]
/// impl Plugin for Adder {
///     fn register_handlers(&self, handlers: &mut HandlerRegistry) -> PluginResult<()> {
///         handlers.register(1, |_ctx, req: &AddRequest| Ok(AddResponse { sum: req.a + req.b }))
///     }
///
///     async fn on_start(&self, _ctx: &PluginContext) -> PluginResult<()> {
///         Ok(())
///     }
///
///     async fn on_stop(&self, _ctx: &PluginContext) -> PluginResult<()> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Register transport handlers; called once during init, before `on_start`
    fn register_handlers(&self, handlers: &mut HandlerRegistry) -> PluginResult<()>;

    /// Acquire resources. The instance becomes `Active` when this succeeds.
    async fn on_start(&self, ctx: &PluginContext) -> PluginResult<()>;

    /// Release every plugin-held resource before returning
    async fn on_stop(&self, ctx: &PluginContext) -> PluginResult<()>;

    fn metadata(&self) -> Option<crate::PluginMetadata> {
        None
    }
}
