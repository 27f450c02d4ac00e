//! In-memory log capture for run summaries.
//!
//! Provides a [`LogCollector`] layer that captures `tracing` events into a
//! bounded ring buffer, and a [`LogReader`] handle for inspecting them after
//! a run: how many warnings and errors were emitted, and which tool emitted
//! them.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// A single captured log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Seconds since the collector was created.
    pub elapsed_secs: f64,
    pub level: Level,
    /// Target module path.
    pub target: String,
    pub message: String,
    /// The `tool` field, when the event carried one.
    pub tool: Option<String>,
    /// The `entry` field, when the event carried one.
    pub entry: Option<u64>,
}

#[derive(Debug)]
struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    start_time: std::time::Instant,
}

impl LogBuffer {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            start_time: std::time::Instant::now(),
        }
    }

    fn push(&mut self, level: Level, target: String, fields: EventFields) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            elapsed_secs: self.start_time.elapsed().as_secs_f64(),
            level,
            target,
            message: fields.message,
            tool: fields.tool,
            entry: fields.entry,
        });
    }
}

/// A `tracing` layer that captures log events into a shared ring buffer.
///
/// Attach it to a `tracing_subscriber` registry next to the formatting
/// layer; the [`LogReader`] obtained from [`reader`](Self::reader) stays
/// valid after the subscriber is installed.
#[derive(Debug, Clone)]
pub struct LogCollector {
    buffer: Arc<Mutex<LogBuffer>>,
}

impl LogCollector {
    /// Create a new collector with the given ring buffer capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(LogBuffer::new(capacity))),
        }
    }

    pub fn reader(&self) -> LogReader {
        LogReader {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCollector {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = *metadata.level();
        let target = metadata.target().to_string();

        let mut fields = EventFields::default();
        event.record(&mut fields);

        if let Ok(mut buf) = self.buffer.lock() {
            buf.push(level, target, fields);
        }
    }
}

/// A read handle for the log buffer.
#[derive(Debug, Clone)]
pub struct LogReader {
    buffer: Arc<Mutex<LogBuffer>>,
}

impl LogReader {
    /// Snapshot of all captured entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.buffer
            .lock()
            .map(|buf| buf.entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of captured entries at exactly `level`.
    pub fn count(&self, level: Level) -> usize {
        self.buffer
            .lock()
            .map(|buf| buf.entries.iter().filter(|e| e.level == level).count())
            .unwrap_or(0)
    }

    /// `(warnings, errors)` captured so far.
    pub fn warnings_and_errors(&self) -> (usize, usize) {
        (self.count(Level::WARN), self.count(Level::ERROR))
    }

    /// Entries emitted on behalf of `tool`.
    pub fn for_tool(&self, tool: &str) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.tool.as_deref() == Some(tool))
            .collect()
    }

    /// Drop every captured entry.
    pub fn clear(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.entries.clear();
        }
    }
}

/// Visitor that extracts `message`, `tool` and `entry` from an event.
#[derive(Default)]
struct EventFields {
    message: String,
    tool: Option<String>,
    entry: Option<u64>,
}

impl Visit for EventFields {
    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == "entry" {
            self.entry = Some(value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "tool" => self.tool = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            // `tool = %name` arrives here as a Display wrapper.
            "tool" => self.tool = Some(format!("{value:?}")),
            "entry" => self.entry = format!("{value:?}").parse().ok(),
            _ => {}
        }
    }
}
