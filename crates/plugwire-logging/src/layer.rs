//! Tracing layer that forwards events to the scoped instance channel

use crate::channel::LogScope;
use once_cell::sync::OnceCell;
use plugwire_core::LogLevel;
use tracing::field::{Field, Visit};
use tracing::subscriber::Interest;
use tracing::{Event, Level, Metadata, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

/// Tracing layer routing each event to the [`LogScope`] active on the
/// emitting thread
///
/// Events emitted outside any scope are dropped by this layer.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChannelLayer;

impl ChannelLayer {
    pub fn new() -> Self {
        Self
    }

    pub(crate) fn convert_level(level: &Level) -> LogLevel {
        match *level {
            Level::TRACE => LogLevel::Trace,
            Level::DEBUG => LogLevel::Debug,
            Level::INFO => LogLevel::Info,
            Level::WARN => LogLevel::Warn,
            Level::ERROR => LogLevel::Error,
        }
    }
}

impl<S> Layer<S> for ChannelLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    // Levels change at runtime and per instance, so interest is never cached.
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        let level = Self::convert_level(metadata.level());
        LogScope::current().is_some_and(|channel| channel.is_enabled(level))
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let Some(channel) = LogScope::current() else {
            return;
        };
        let level = Self::convert_level(event.metadata().level());
        if !channel.is_enabled(level) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        channel.log(level, &visitor.finish());
    }
}

/// Collects the `message` field and appends the remaining fields as `key=value`
#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        let mut out = self.message.unwrap_or_default();
        for field in self.fields {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&field);
        }
        out
    }
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.fields.push(format!("{}={value:?}", field.name()));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push(format!("{}={value}", field.name()));
        }
    }
}

static INSTALLED: OnceCell<bool> = OnceCell::new();

/// Install the [`ChannelLayer`] as the process-wide subscriber
///
/// Safe to call repeatedly; only the first call has an effect. Returns false
/// when another global subscriber was already set by the host process.
pub fn init_logging() -> bool {
    *INSTALLED.get_or_init(|| {
        use tracing_subscriber::prelude::*;

        let subscriber = tracing_subscriber::registry().with(ChannelLayer::new());
        tracing::subscriber::set_global_default(subscriber).is_ok()
    })
}
