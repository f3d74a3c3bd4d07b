//! Error types and the stable error code table

use crate::LifecycleState;
use std::any::Any;
use thiserror::Error;

/// Result type alias for plugin operations
pub type PluginResult<T> = Result<T, PluginError>;

/// Error codes carried in the `error_code` field of a response envelope
///
/// Values are dense, start at 0 and never change between versions.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    None = 0,
    InvalidState = 1,
    InitFailed = 2,
    ShutdownFailed = 3,
    Config = 4,
    Serialization = 5,
    UnknownMessage = 6,
    Handler = 7,
    Runtime = 8,
    Cancelled = 9,
    Timeout = 10,
    Internal = 11,
    Ffi = 12,
}

impl ErrorCode {
    /// Decode a raw code; values outside the table are treated as internal.
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => ErrorCode::None,
            1 => ErrorCode::InvalidState,
            2 => ErrorCode::InitFailed,
            3 => ErrorCode::ShutdownFailed,
            4 => ErrorCode::Config,
            5 => ErrorCode::Serialization,
            6 => ErrorCode::UnknownMessage,
            7 => ErrorCode::Handler,
            8 => ErrorCode::Runtime,
            9 => ErrorCode::Cancelled,
            10 => ErrorCode::Timeout,
            12 => ErrorCode::Ffi,
            _ => ErrorCode::Internal,
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Error type for plugin operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    /// Plugin is not in a valid state for the requested operation
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Plugin startup failed
    #[error("initialization failed: {0}")]
    InitFailed(String),

    /// Plugin stop hook failed
    #[error("shutdown failed: {0}")]
    ShutdownFailed(String),

    /// Malformed or unacceptable configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Request bytes do not match the layout the handler expects
    #[error("serialization error: {0}")]
    Serialization(String),

    /// No handler registered for a message id
    #[error("no handler for id {0}")]
    UnknownMessage(u32),

    /// Handler reported a failure
    #[error("handler error: {0}")]
    Handler(String),

    /// Runtime error (executor, concurrency limit)
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Handler observed a cancellation
    #[error("request cancelled")]
    Cancelled,

    /// Handler or hook exceeded its deadline
    #[error("request timed out")]
    Timeout,

    /// Internal fault, including intercepted panics
    #[error("internal error: {0}")]
    Internal(String),

    /// Malformed input at the C boundary
    #[error("FFI error: {0}")]
    Ffi(String),
}

impl PluginError {
    /// Error raised when a transport call reaches an instance that is not active
    pub fn not_active(actual: LifecycleState) -> Self {
        PluginError::InvalidState(format!("plugin is not active (state: {actual})"))
    }

    /// Build an internal error from a caught panic payload
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown payload".to_string()
        };
        PluginError::Internal(format!("plugin panicked: {detail}"))
    }

    /// Code placed in the envelope for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            PluginError::InvalidState(_) => ErrorCode::InvalidState,
            PluginError::InitFailed(_) => ErrorCode::InitFailed,
            PluginError::ShutdownFailed(_) => ErrorCode::ShutdownFailed,
            PluginError::Config(_) => ErrorCode::Config,
            PluginError::Serialization(_) => ErrorCode::Serialization,
            PluginError::UnknownMessage(_) => ErrorCode::UnknownMessage,
            PluginError::Handler(_) => ErrorCode::Handler,
            PluginError::Runtime(_) => ErrorCode::Runtime,
            PluginError::Cancelled => ErrorCode::Cancelled,
            PluginError::Timeout => ErrorCode::Timeout,
            PluginError::Internal(_) => ErrorCode::Internal,
            PluginError::Ffi(_) => ErrorCode::Ffi,
        }
    }

    /// Numeric form of [`PluginError::code`]
    pub fn error_code(&self) -> u32 {
        self.code().as_u32()
    }

    /// Rebuild an error from envelope fields
    ///
    /// For `UnknownMessage` the id is recovered from the trailing number of the
    /// message, defaulting to 0. Code 0 is not an error and maps to `Internal`.
    pub fn from_code(code: u32, message: String) -> Self {
        match ErrorCode::from_u32(code) {
            ErrorCode::InvalidState => PluginError::InvalidState(message),
            ErrorCode::InitFailed => PluginError::InitFailed(message),
            ErrorCode::ShutdownFailed => PluginError::ShutdownFailed(message),
            ErrorCode::Config => PluginError::Config(message),
            ErrorCode::Serialization => PluginError::Serialization(message),
            ErrorCode::UnknownMessage => PluginError::UnknownMessage(
                message
                    .rsplit(' ')
                    .next()
                    .and_then(|id| id.parse().ok())
                    .unwrap_or(0),
            ),
            ErrorCode::Handler => PluginError::Handler(message),
            ErrorCode::Runtime => PluginError::Runtime(message),
            ErrorCode::Cancelled => PluginError::Cancelled,
            ErrorCode::Timeout => PluginError::Timeout,
            ErrorCode::Ffi => PluginError::Ffi(message),
            ErrorCode::None | ErrorCode::Internal => PluginError::Internal(message),
        }
    }

    /// Normalize an error returned by a handler
    ///
    /// Kinds owned by the lifecycle and the dispatcher cannot originate in a
    /// handler; they are reported as `Handler` so that, for example,
    /// `UNKNOWN_MESSAGE` always means an unregistered id, `INTERNAL` a caught
    /// panic and `RUNTIME` a concurrency-limit rejection.
    pub fn into_handler_outcome(self) -> Self {
        match self {
            PluginError::InvalidState(_)
            | PluginError::InitFailed(_)
            | PluginError::ShutdownFailed(_)
            | PluginError::Config(_)
            | PluginError::UnknownMessage(_)
            | PluginError::Runtime(_)
            | PluginError::Internal(_) => PluginError::Handler(self.to_string()),
            other => other,
        }
    }
}

impl From<serde_json::Error> for PluginError {
    fn from(err: serde_json::Error) -> Self {
        PluginError::Config(err.to_string())
    }
}
