//! Logging sink collaborator.
//!
//! Primitives never reach for a global logger. They hold an `Arc<dyn LogSink>`
//! handed to them at construction time; [`TracingSink`] is the default and
//! forwards everything to `tracing`.

use std::collections::VecDeque;
use std::fmt;

use parking_lot::Mutex;

/// Severity of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Fine-grained tracing of individual operations.
    Debug,
    /// Lifecycle events (start, shutdown).
    Info,
    /// Something unexpected that the primitive recovered from.
    Warning,
    /// A task or stage failure.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Receiver of leveled diagnostic messages.
///
/// Calls are fire-and-forget: implementations must not block the caller for
/// long and cannot push back on it.
pub trait LogSink: Send + Sync {
    /// Record a message at the given level.
    fn record(&self, level: LogLevel, message: &str);
}

/// Sink that forwards records to the `tracing` macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn record(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(target: "prometheus_concurrency", "{message}"),
            LogLevel::Info => tracing::info!(target: "prometheus_concurrency", "{message}"),
            LogLevel::Warning => tracing::warn!(target: "prometheus_concurrency", "{message}"),
            LogLevel::Error => tracing::error!(target: "prometheus_concurrency", "{message}"),
        }
    }
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn record(&self, _level: LogLevel, _message: &str) {}
}

/// A captured log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Severity.
    pub level: LogLevel,
    /// Message text.
    pub message: String,
    /// Name of the thread that produced the record, if it had one.
    pub thread: Option<String>,
}

/// In-memory sink with a bounded buffer, for tests and embedding applications.
///
/// Oldest records are evicted once `max_records` is reached.
#[derive(Debug)]
pub struct InMemoryLogSink {
    records: Mutex<VecDeque<LogRecord>>,
    max_records: usize,
}

impl InMemoryLogSink {
    /// Create a new in-memory sink holding at most `max_records` entries.
    #[must_use]
    pub fn new(max_records: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(max_records.min(1024))),
            max_records,
        }
    }

    /// Snapshot of the stored records, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().iter().cloned().collect()
    }

    /// Number of stored records at `level`.
    #[must_use]
    pub fn count(&self, level: LogLevel) -> usize {
        self.records.lock().iter().filter(|r| r.level == level).count()
    }

    /// True if any stored message contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.records.lock().iter().any(|r| r.message.contains(needle))
    }
}

impl LogSink for InMemoryLogSink {
    fn record(&self, level: LogLevel, message: &str) {
        if self.max_records == 0 {
            return;
        }
        let record = LogRecord {
            level,
            message: message.to_owned(),
            thread: std::thread::current().name().map(str::to_owned),
        };
        let mut records = self.records.lock();
        if records.len() >= self.max_records {
            records.pop_front();
        }
        records.push_back(record);
    }
}
