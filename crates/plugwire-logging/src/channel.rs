//! Per-instance log channel and host callback sink

use parking_lot::RwLock;
use plugwire_core::LogLevel;
use std::cell::RefCell;
use std::ffi::CString;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Host log callback
///
/// # Parameters
/// - `level`: Log level byte (0=Trace .. 4=Error)
/// - `message`: Null-terminated UTF-8 message
/// - `len`: Message length in bytes, excluding the terminator
///
/// The message pointer is only valid for the duration of the call.
pub type LogCallback = extern "C" fn(level: u8, message: *const std::ffi::c_char, len: usize);

/// Destination for log records of one instance
///
/// Implementations are invoked synchronously on the emitting thread and must
/// not call back into the lifecycle or transport operations of the instance.
pub trait LogSink: Send + Sync {
    fn emit(&self, level: LogLevel, message: &str);
}

/// [`LogSink`] forwarding to a host callback
pub struct CallbackSink {
    callback: LogCallback,
}

impl CallbackSink {
    pub fn new(callback: LogCallback) -> Self {
        Self { callback }
    }
}

impl LogSink for CallbackSink {
    fn emit(&self, level: LogLevel, message: &str) {
        // Interior NULs would truncate the C string on the host side.
        let text = match CString::new(message) {
            Ok(s) => s,
            Err(_) => match CString::new(message.replace('\0', "\u{FFFD}")) {
                Ok(s) => s,
                Err(_) => return,
            },
        };
        let len = text.as_bytes().len();
        (self.callback)(level as u8, text.as_ptr(), len);
    }
}

/// Leveled log channel owned by one plugin instance
pub struct LogChannel {
    sink: RwLock<Option<Arc<dyn LogSink>>>,
    level: AtomicU8,
}

impl LogChannel {
    pub fn new(sink: Option<Arc<dyn LogSink>>, level: LogLevel) -> Self {
        Self {
            sink: RwLock::new(sink),
            level: AtomicU8::new(level as u8),
        }
    }

    /// Channel that drops every record
    pub fn disabled() -> Self {
        Self::new(None, LogLevel::Off)
    }

    /// Channel for an optional host callback; `None` disables logging
    pub fn from_callback(callback: Option<LogCallback>, level: LogLevel) -> Self {
        let sink = callback.map(|cb| Arc::new(CallbackSink::new(cb)) as Arc<dyn LogSink>);
        Self::new(sink, level)
    }

    /// Change the threshold for subsequent records
    pub fn set_level(&self, level: LogLevel) {
        self.level.store(level as u8, Ordering::SeqCst);
    }

    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.level.load(Ordering::SeqCst))
    }

    pub fn has_sink(&self) -> bool {
        self.sink.read().is_some()
    }

    /// Drop the sink so no further records reach the host
    pub fn detach(&self) {
        *self.sink.write() = None;
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::Off && level >= self.level() && self.has_sink()
    }

    /// Deliver a record if the channel is attached and the level passes
    pub fn log(&self, level: LogLevel, message: &str) {
        if level == LogLevel::Off || level < self.level() {
            return;
        }
        // Clone out of the lock so a slow sink never blocks `detach`.
        let sink = self.sink.read().clone();
        if let Some(sink) = sink {
            sink.emit(level, message);
        }
    }
}

thread_local! {
    static ACTIVE: RefCell<Vec<Arc<LogChannel>>> = const { RefCell::new(Vec::new()) };
}

/// Guard marking `channel` as the destination of `tracing` events emitted on
/// this thread until it is dropped
///
/// Scopes nest; the innermost one wins.
pub struct LogScope {
    _not_send: PhantomData<*const ()>,
}

impl LogScope {
    pub fn enter(channel: Arc<LogChannel>) -> Self {
        ACTIVE.with(|stack| stack.borrow_mut().push(channel));
        Self {
            _not_send: PhantomData,
        }
    }

    /// Channel of the innermost scope on this thread
    pub fn current() -> Option<Arc<LogChannel>> {
        ACTIVE
            .try_with(|stack| stack.borrow().last().cloned())
            .ok()
            .flatten()
    }
}

impl Drop for LogScope {
    fn drop(&mut self) {
        let _ = ACTIVE.try_with(|stack| stack.borrow_mut().pop());
    }
}

#[cfg(test)]
#[path = "channel/channel_tests.rs"]
mod channel_tests;
