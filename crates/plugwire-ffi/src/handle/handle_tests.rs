#![allow(non_snake_case)]

use super::*;
use async_trait::async_trait;
use plugwire_core::{ErrorCode, HandlerRegistry};
use std::sync::atomic::{AtomicBool, Ordering};

const MSG_ECHO: u32 = 1;

#[derive(Default)]
struct TestPlugin {
    fail_start: bool,
    panic_start: bool,
    fail_stop: bool,
    slow_stop: bool,
    duplicate_ids: bool,
    stopped: Arc<AtomicBool>,
}

#[async_trait]
impl Plugin for TestPlugin {
    fn register_handlers(&self, handlers: &mut HandlerRegistry) -> PluginResult<()> {
        handlers.register_raw(MSG_ECHO, None, |_ctx, req| Ok(req.to_vec()))?;
        if self.duplicate_ids {
            handlers.register_raw(MSG_ECHO, None, |_ctx, _req| Ok(Vec::new()))?;
        }
        Ok(())
    }

    async fn on_start(&self, _ctx: &PluginContext) -> PluginResult<()> {
        if self.panic_start {
            panic!("start exploded");
        }
        if self.fail_start {
            return Err(PluginError::Handler("database unreachable".into()));
        }
        Ok(())
    }

    async fn on_stop(&self, _ctx: &PluginContext) -> PluginResult<()> {
        if self.slow_stop {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if self.fail_stop {
            return Err(PluginError::Runtime("flush failed".into()));
        }
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn metadata(&self) -> Option<PluginMetadata> {
        Some(PluginMetadata::new("test", "1.2.3"))
    }
}

fn handle_for(plugin: TestPlugin) -> PluginHandle {
    handle_with_config(plugin, PluginConfig::default())
}

fn handle_with_config(plugin: TestPlugin, config: PluginConfig) -> PluginHandle {
    PluginHandle::new(
        Box::new(plugin),
        config,
        Arc::new(LogChannel::disabled()),
    )
    .unwrap()
}

#[test]
fn PluginHandle___new___starts_in_installed_state() {
    let handle = handle_for(TestPlugin::default());

    assert_eq!(handle.state(), LifecycleState::Installed);
    assert_eq!(handle.message_ids(), vec![MSG_ECHO]);
}

#[test]
fn PluginHandle___new_with_duplicate_ids___is_config_error() {
    let plugin = TestPlugin {
        duplicate_ids: true,
        ..Default::default()
    };

    let result = PluginHandle::new(
        Box::new(plugin),
        PluginConfig::default(),
        Arc::new(LogChannel::disabled()),
    );

    assert_eq!(result.err().map(|e| e.code()), Some(ErrorCode::Config));
}

#[test]
fn PluginHandle___call_before_start___is_invalid_state() {
    let handle = handle_for(TestPlugin::default());

    let err = handle.call(MSG_ECHO, b"hi").unwrap_err();

    assert_eq!(err.code(), ErrorCode::InvalidState);
}

#[test]
fn PluginHandle___start___transitions_to_active_and_serves_calls() {
    let handle = handle_for(TestPlugin::default());

    handle.start().unwrap();

    assert_eq!(handle.state(), LifecycleState::Active);
    assert_eq!(handle.call(MSG_ECHO, b"hi").unwrap(), b"hi".to_vec());
}

#[test]
fn PluginHandle___start_twice___is_rejected() {
    let handle = handle_for(TestPlugin::default());
    handle.start().unwrap();

    let err = handle.start().unwrap_err();

    assert_eq!(err.code(), ErrorCode::InvalidState);
    assert_eq!(handle.state(), LifecycleState::Active);
}

#[test]
fn PluginHandle___start_hook_error___fails_with_init_failed() {
    let handle = handle_for(TestPlugin {
        fail_start: true,
        ..Default::default()
    });

    let err = handle.start().unwrap_err();

    assert_eq!(err.code(), ErrorCode::InitFailed);
    assert!(err.to_string().contains("database unreachable"));
    assert_eq!(handle.state(), LifecycleState::Failed);
}

#[test]
fn PluginHandle___start_hook_panic___fails_without_unwinding() {
    let handle = handle_for(TestPlugin {
        panic_start: true,
        ..Default::default()
    });

    let err = handle.start().unwrap_err();

    assert_eq!(err.code(), ErrorCode::InitFailed);
    assert!(err.to_string().contains("start exploded"));
    assert_eq!(handle.state(), LifecycleState::Failed);
}

#[test]
fn PluginHandle___shutdown___runs_stop_hook_and_stops() {
    let stopped = Arc::new(AtomicBool::new(false));
    let handle = handle_for(TestPlugin {
        stopped: stopped.clone(),
        ..Default::default()
    });
    handle.start().unwrap();

    handle.shutdown().unwrap();

    assert_eq!(handle.state(), LifecycleState::Stopped);
    assert!(stopped.load(Ordering::SeqCst));
    assert_eq!(
        handle.call(MSG_ECHO, b"late").unwrap_err().code(),
        ErrorCode::InvalidState
    );
}

#[test]
fn PluginHandle___shutdown_when_stopped___is_noop_success() {
    let handle = handle_for(TestPlugin::default());
    handle.start().unwrap();
    handle.shutdown().unwrap();

    assert!(handle.shutdown().is_ok());
    assert_eq!(handle.state(), LifecycleState::Stopped);
}

#[test]
fn PluginHandle___shutdown_before_start___is_invalid_state() {
    let handle = handle_for(TestPlugin::default());

    let err = handle.shutdown().unwrap_err();

    assert_eq!(err.code(), ErrorCode::InvalidState);
    assert_eq!(handle.state(), LifecycleState::Installed);
}

#[test]
fn PluginHandle___stop_hook_timeout___still_stops() {
    let mut config = PluginConfig::default();
    config.shutdown_timeout_ms = 50;
    let handle = handle_with_config(
        TestPlugin {
            slow_stop: true,
            ..Default::default()
        },
        config,
    );
    handle.start().unwrap();

    handle.shutdown().unwrap();

    assert_eq!(handle.state(), LifecycleState::Stopped);
}

#[test]
fn PluginHandle___stop_hook_error___fails_with_shutdown_failed() {
    let handle = handle_for(TestPlugin {
        fail_stop: true,
        ..Default::default()
    });
    handle.start().unwrap();

    let err = handle.shutdown().unwrap_err();

    assert_eq!(err.code(), ErrorCode::ShutdownFailed);
    assert_eq!(handle.state(), LifecycleState::Failed);
}

#[test]
fn PluginHandle___set_log_level___updates_channel() {
    let handle = handle_for(TestPlugin::default());

    handle.set_log_level(LogLevel::Error);

    assert_eq!(handle.logs().level(), LogLevel::Error);
}

#[test]
fn PluginHandle___report___lists_metadata_and_ids() {
    let handle = handle_for(TestPlugin::default());
    handle.start().unwrap();

    let report = handle.report();

    assert_eq!(report.name.as_deref(), Some("test"));
    assert_eq!(report.version.as_deref(), Some("1.2.3"));
    assert_eq!(report.state, LifecycleState::Active);
    assert_eq!(report.message_ids, vec![MSG_ECHO]);
}
