use crate::attribute::{AttributeValue, Attributes};
use crate::logger::Logger;
use crate::record::{keys, process_id, thread_id, LogRecord};
use chrono::Utc;
use std::cell::Cell;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

thread_local! {
    static IN_LOGGER: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as inside [`Logger::log`] until dropped.
struct LoggingGuard;

impl LoggingGuard {
    fn enter() -> Option<Self> {
        if IN_LOGGER.with(|flag| flag.replace(true)) {
            None
        } else {
            Some(LoggingGuard)
        }
    }
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        IN_LOGGER.with(|flag| flag.set(false));
    }
}

/// `tracing_subscriber` layer that turns events into [`LogRecord`]s and
/// pushes them through a [`Logger`].
///
/// The logger sits behind a mutex, so records from concurrent threads reach
/// its sinks one at a time. Writes happen on the emitting thread. Events
/// raised by the logger's own components while it writes (a sink reporting
/// a rotation, say) are counted in `reentrant_events` and dropped.
pub struct LoggerLayer {
    logger: Mutex<Logger>,
    min_level: Level,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Events the logger accepted and wrote.
    pub written_events: Arc<AtomicU64>,
    /// Events lost to a filter, format or sink error.
    pub failed_events: Arc<AtomicU64>,
    /// Events emitted from inside the logger itself.
    pub reentrant_events: Arc<AtomicU64>,
}

impl LoggerLayer {
    /// Create a layer forwarding events at `min_level` or more severe.
    pub fn new(logger: Logger, min_level: Level) -> Self {
        Self {
            logger: Mutex::new(logger),
            min_level,
            total_events: Arc::new(AtomicU64::new(0)),
            written_events: Arc::new(AtomicU64::new(0)),
            failed_events: Arc::new(AtomicU64::new(0)),
            reentrant_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<S> Layer<S> for LoggerLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        let meta = event.metadata();
        if *meta.level() > self.min_level {
            return;
        }

        let _guard = match LoggingGuard::enter() {
            Some(guard) => guard,
            None => {
                self.reentrant_events.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        let mut fields = Attributes::new()
            .with(keys::TARGET, meta.target())
            .with(keys::PID, process_id())
            .with(keys::TID, thread_id());
        let mut message: Option<String> = None;
        let mut visitor = FieldVisitor { fields: &mut fields, message: &mut message };
        event.record(&mut visitor);

        let record = LogRecord::with_message(
            Utc::now(),
            meta.level().as_str(),
            message.as_deref().unwrap_or_default(),
            fields,
        );

        let mut logger = match self.logger.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match logger.log(&record) {
            Ok(true) => {
                self.written_events.fetch_add(1, Ordering::Relaxed);
            }
            Ok(false) => {}
            Err(e) => {
                self.failed_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("logger '{}' failed to write record: {}", logger.name(), e);
            }
        }
    }
}

/// Collects event fields into [`Attributes`], keeping `message` apart.
pub struct FieldVisitor<'a> {
    pub fields: &'a mut Attributes,
    pub message: &'a mut Option<String>,
}

impl<'a> FieldVisitor<'a> {
    fn insert(&mut self, field: &Field, value: AttributeValue) {
        self.fields.insert(field.name(), value);
    }
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == keys::MESSAGE {
            *self.message = Some(value.to_string());
        } else {
            self.insert(field, AttributeValue::from(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, AttributeValue::Int(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, AttributeValue::UInt(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, AttributeValue::Float(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, AttributeValue::Bool(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == keys::MESSAGE {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.insert(field, AttributeValue::String(format!("{:?}", value)));
        }
    }
}
