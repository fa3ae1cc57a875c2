//! Board event logging.
//!
//! Every event goes to `tracing`. When an [`EventSink`] is attached (for
//! example a governance recorder owned by the host process) the same event is
//! forwarded to it. The board behaves identically with or without a sink.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Severity of a board event, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventLevel::Debug => "debug",
            EventLevel::Info => "info",
            EventLevel::Warning => "warning",
            EventLevel::Error => "error",
        };
        f.write_str(s)
    }
}

/// Receiver for board notifications.
///
/// Implementations must not block for long: they are called on the thread
/// performing the board operation, possibly while board locks are held.
pub trait EventSink: Send + Sync {
    fn notify(&self, level: EventLevel, message: &str, data: &Value);
}

/// Logger that outputs to tracing and, optionally, an event sink.
#[derive(Clone, Default)]
pub struct Logger {
    sink: Option<Arc<dyn EventSink>>,
    /// Logger name/category.
    name: Option<String>,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Emit `message` to tracing and forward it, with `data`, to the sink.
    pub fn log_with_data(&self, level: EventLevel, message: &str, data: Value) {
        let name = self.name.as_deref().unwrap_or("board");
        match level {
            EventLevel::Error => tracing::error!(logger = %name, "{}", message),
            EventLevel::Warning => tracing::warn!(logger = %name, "{}", message),
            EventLevel::Info => tracing::info!(logger = %name, "{}", message),
            EventLevel::Debug => tracing::debug!(logger = %name, "{}", message),
        }

        if let Some(ref sink) = self.sink {
            sink.notify(level, message, &data);
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
