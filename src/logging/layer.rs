//! Tracing layer feeding the log file queue.
//!
//! Every event that passes the subscriber's filter becomes one [`LogEntry`]:
//! the `message` field first, then the other fields as `key=value`.

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

use super::sink::{LogEntry, LogLevel, LogQueue};

/// [`tracing_subscriber::Layer`] pushing events into a [`LogQueue`].
pub struct SinkLayer {
    queue: Arc<LogQueue>,
}

impl SinkLayer {
    /// Layer writing into `queue`.
    pub fn new(queue: Arc<LogQueue>) -> Self {
        Self { queue }
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn field(&mut self, name: &str, value: &dyn std::fmt::Display) {
        let _ = write!(self.fields, " {name}={value}");
    }
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.field(field.name(), &value);
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.field(field.name(), &value);
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.field(field.name(), &value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.field(field.name(), &value);
    }
}

impl<S> tracing_subscriber::Layer<S> for SinkLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let mut message = if visitor.message.is_empty() {
            meta.name().to_string()
        } else {
            visitor.message
        };
        message.push_str(&visitor.fields);

        self.queue
            .push(LogEntry::now(LogLevel::from(meta.level()), message));
    }
}
