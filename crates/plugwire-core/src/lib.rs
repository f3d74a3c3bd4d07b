//! plugwire-core - Error taxonomy, lifecycle and plugin traits
//!
//! This crate holds everything about a plugin instance that does not touch
//! raw memory:
//! - [`PluginError`] and the stable [`ErrorCode`] table
//! - [`LifecycleState`] and its transition rules
//! - [`PluginConfig`] parsed from the optional init configuration
//! - [`Plugin`] trait, [`PluginContext`] and the [`HandlerRegistry`]

mod config;
mod error;
mod handler;
mod lifecycle;
mod plugin;

pub use config::{PluginConfig, PluginMetadata};
pub use error::{ErrorCode, PluginError, PluginResult};
pub use handler::{HandlerFn, HandlerRegistry, RawMessage, RequestContext, Route};
pub use lifecycle::{LifecycleState, STATE_SENTINEL};
pub use plugin::{Plugin, PluginContext};

use std::str::FromStr;

/// Log levels shared by the host callback and the plugin side
///
/// Ordered from most to least verbose; `Off` sits above every real level.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Off = 5,
}

impl LogLevel {
    /// Decode a level byte received over FFI; anything unknown disables logging.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Trace,
            1 => LogLevel::Debug,
            2 => LogLevel::Info,
            3 => LogLevel::Warn,
            4 => LogLevel::Error,
            _ => LogLevel::Off,
        }
    }
}

impl FromStr for LogLevel {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "off" | "none" => Ok(LogLevel::Off),
            other => Err(PluginError::Config(format!("unknown log level '{other}'"))),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Off => write!(f, "OFF"),
        }
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ErrorCode, HandlerRegistry, LifecycleState, LogLevel, Plugin, PluginConfig,
        PluginContext, PluginError, PluginResult, RawMessage, RequestContext,
    };
}
