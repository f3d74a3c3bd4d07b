//! Plugin configuration types

use crate::{LogLevel, PluginError, PluginResult};
use serde::{Deserialize, Serialize};

/// Plugin configuration passed during initialization
///
/// Decoded from the optional JSON configuration view handed to `plugin_init`.
/// Every field has a default, so an absent view yields a usable config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginConfig {
    /// Plugin-specific settings
    #[serde(default)]
    pub data: serde_json::Value,

    /// One-shot parameters intended for `on_start`
    #[serde(default)]
    pub init_params: Option<serde_json::Value>,

    /// Worker threads for the instance runtime (default: number of CPU cores)
    #[serde(default)]
    pub worker_threads: Option<usize>,

    /// Initial log level of the instance channel
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Maximum in-flight transport calls; 0 disables the limit
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_ops: usize,

    /// Bound for the stop hook in milliseconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_ms: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_concurrent() -> usize {
    1000
}

fn default_shutdown_timeout() -> u64 {
    5000
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            data: serde_json::Value::Null,
            init_params: None,
            worker_threads: None,
            log_level: default_log_level(),
            max_concurrent_ops: default_max_concurrent(),
            shutdown_timeout_ms: default_shutdown_timeout(),
        }
    }
}

impl PluginConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate configuration bytes
    ///
    /// An empty slice yields the defaults. Malformed JSON, any top-level
    /// value other than an object and out-of-range values are reported as
    /// [`PluginError::Config`].
    pub fn from_json(bytes: &[u8]) -> PluginResult<Self> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        // Derived structs also accept the positional array form.
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        if !value.is_object() {
            return Err(PluginError::Config(
                "configuration must be a JSON object".to_string(),
            ));
        }
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialize fine but cannot be honored
    pub fn validate(&self) -> PluginResult<()> {
        self.log_level()?;
        if self.worker_threads == Some(0) {
            return Err(PluginError::Config(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Initial log level
    pub fn log_level(&self) -> PluginResult<LogLevel> {
        self.log_level.parse()
    }

    /// Get a typed value from the plugin settings
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Get a typed value from the initialization parameters
    pub fn get_init_param<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.init_params
            .as_ref()?
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Descriptive metadata a plugin may report about itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl PluginMetadata {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
