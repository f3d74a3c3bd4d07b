#![allow(non_snake_case)]

use super::*;
use parking_lot::Mutex;
use std::sync::atomic::AtomicUsize;

#[derive(Default)]
struct RecordingSink {
    records: Mutex<Vec<(LogLevel, String)>>,
}

impl LogSink for RecordingSink {
    fn emit(&self, level: LogLevel, message: &str) {
        self.records.lock().push((level, message.to_string()));
    }
}

static CALLBACK_CALLS: AtomicUsize = AtomicUsize::new(0);
static CALLBACK_LAST: Mutex<Option<(u8, String, usize)>> = Mutex::new(None);
static CALLBACK_LOCK: Mutex<()> = Mutex::new(());

extern "C" fn capture_callback(level: u8, message: *const std::ffi::c_char, len: usize) {
    CALLBACK_CALLS.fetch_add(1, Ordering::SeqCst);
    let text = unsafe { std::ffi::CStr::from_ptr(message) }
        .to_string_lossy()
        .into_owned();
    *CALLBACK_LAST.lock() = Some((level, text, len));
}

fn recording(level: LogLevel) -> (Arc<RecordingSink>, LogChannel) {
    let sink = Arc::new(RecordingSink::default());
    let channel = LogChannel::new(Some(sink.clone() as Arc<dyn LogSink>), level);
    (sink, channel)
}

#[test]
fn LogChannel___log___delivers_records_at_or_above_level() {
    let (sink, channel) = recording(LogLevel::Info);

    channel.log(LogLevel::Debug, "hidden");
    channel.log(LogLevel::Info, "shown");
    channel.log(LogLevel::Error, "also shown");

    let records = sink.records.lock();
    assert_eq!(
        *records,
        vec![
            (LogLevel::Info, "shown".to_string()),
            (LogLevel::Error, "also shown".to_string())
        ]
    );
}

#[test]
fn LogChannel___set_level___applies_to_later_records_only() {
    let (sink, channel) = recording(LogLevel::Info);
    channel.log(LogLevel::Info, "before");

    channel.set_level(LogLevel::Error);
    channel.log(LogLevel::Info, "after");

    assert_eq!(sink.records.lock().len(), 1);
    assert_eq!(channel.level(), LogLevel::Error);
}

#[test]
fn LogChannel___level_off___silences_everything() {
    let (sink, channel) = recording(LogLevel::Off);

    channel.log(LogLevel::Error, "nope");
    channel.log(LogLevel::Off, "nope");

    assert!(sink.records.lock().is_empty());
    assert!(!channel.is_enabled(LogLevel::Error));
}

#[test]
fn LogChannel___disabled___is_never_enabled() {
    let channel = LogChannel::disabled();

    channel.set_level(LogLevel::Trace);

    assert!(!channel.is_enabled(LogLevel::Error));
    channel.log(LogLevel::Error, "dropped");
}

#[test]
fn LogChannel___detach___stops_delivery() {
    let (sink, channel) = recording(LogLevel::Trace);

    channel.detach();
    channel.log(LogLevel::Error, "late");

    assert!(!channel.has_sink());
    assert!(sink.records.lock().is_empty());
}

#[test]
fn LogChannel___from_callback_none___has_no_sink() {
    let channel = LogChannel::from_callback(None, LogLevel::Trace);

    assert!(!channel.has_sink());
}

#[test]
fn CallbackSink___emit___passes_level_terminated_text_and_length() {
    let _guard = CALLBACK_LOCK.lock();
    CALLBACK_CALLS.store(0, Ordering::SeqCst);
    let channel = LogChannel::from_callback(Some(capture_callback), LogLevel::Trace);

    channel.log(LogLevel::Warn, "disk almost full");

    assert_eq!(CALLBACK_CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(
        *CALLBACK_LAST.lock(),
        Some((3, "disk almost full".to_string(), 16))
    );
}

#[test]
fn CallbackSink___emit_with_interior_nul___replaces_it() {
    let _guard = CALLBACK_LOCK.lock();
    let channel = LogChannel::from_callback(Some(capture_callback), LogLevel::Trace);

    channel.log(LogLevel::Info, "a\0b");

    let last = CALLBACK_LAST.lock().clone().unwrap();
    assert_eq!(last.1, "a\u{FFFD}b");
}

#[test]
fn LogScope___current___tracks_innermost_scope() {
    let outer = Arc::new(LogChannel::disabled());
    let inner = Arc::new(LogChannel::disabled());

    assert!(LogScope::current().is_none());
    {
        let _outer = LogScope::enter(outer.clone());
        {
            let _inner = LogScope::enter(inner.clone());
            assert!(Arc::ptr_eq(&LogScope::current().unwrap(), &inner));
        }
        assert!(Arc::ptr_eq(&LogScope::current().unwrap(), &outer));
    }
    assert!(LogScope::current().is_none());
}

#[test]
fn LogScope___is_thread_local() {
    let channel = Arc::new(LogChannel::disabled());
    let _scope = LogScope::enter(channel);

    let seen_elsewhere = std::thread::spawn(|| LogScope::current().is_some())
        .join()
        .unwrap();

    assert!(!seen_elsewhere);
}
