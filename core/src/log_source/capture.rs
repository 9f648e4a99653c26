use std::fmt::{self, Write as _};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use crate::log_event::{LogEvent, Severity};

use super::broadcaster::LogBroadcaster;

/// Forwards this process's own `tracing` events at WARN and above into a
/// [`LogBroadcaster`]. The stack trace is the event's module path and location,
/// followed by one `in <module>::<span>` line per enclosing span, innermost first.
pub struct LogCaptureLayer {
    broadcaster: LogBroadcaster,
    max_level: Level,
}

impl LogCaptureLayer {
    pub fn new(broadcaster: LogBroadcaster) -> Self {
        Self {
            broadcaster,
            max_level: Level::WARN,
        }
    }

    /// Capture events at this level and more severe.
    pub fn with_max_level(mut self, level: Level) -> Self {
        self.max_level = level;
        self
    }
}

impl<S> Layer<S> for LogCaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() > self.max_level {
            return;
        }

        let severity = match *meta.level() {
            Level::ERROR => Severity::Error,
            Level::WARN => Severity::Warning,
            _ => Severity::Info,
        };

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let mut stack_trace = format!(
            "at {} ({}:{})",
            meta.module_path().unwrap_or_else(|| meta.target()),
            meta.file().unwrap_or("<unknown>"),
            meta.line().unwrap_or(0)
        );
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                let span_meta = span.metadata();
                let _ = write!(
                    stack_trace,
                    "\n  in {}::{}",
                    span_meta.module_path().unwrap_or_else(|| span_meta.target()),
                    span_meta.name()
                );
            }
        }

        self.broadcaster
            .publish(&LogEvent::new(visitor.finish(), stack_trace, severity));
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields
        } else {
            format!("{} {}", self.message, self.fields)
        }
    }

    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{name}={value}");
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field.name(), format_args!("{value}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }
}
