//! Shared log entry queue: many producers, one draining writer.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Local};
use parking_lot::Mutex;

/// Default upper bound on buffered entries.
pub const DEFAULT_QUEUE_LIMIT: usize = 65_536;

/// Severity of a log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Failures.
    Error,
    /// Suspicious but recovered.
    Warn,
    /// Normal operation.
    Info,
    /// Diagnostics.
    Debug,
    /// Very verbose diagnostics.
    Trace,
}

impl From<&tracing::Level> for LogLevel {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => LogLevel::Error,
            tracing::Level::WARN => LogLevel::Warn,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::TRACE => LogLevel::Trace,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        })
    }
}

/// One line bound for the log files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    /// Severity.
    pub level: LogLevel,
    /// Local time the entry was recorded.
    pub at: DateTime<Local>,
    /// Rendered message including structured fields.
    pub message: String,
}

impl LogEntry {
    /// Entry stamped now.
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            at: Local::now(),
            message: message.into(),
        }
    }

    /// File line: `HH:MM:SS MM/DD/YY message`.
    pub fn render(&self) -> String {
        format!("{} {}", self.at.format("%H:%M:%S %m/%d/%y"), self.message)
    }
}

/// Bounded FIFO of pending entries; the oldest are dropped on overflow.
pub struct LogQueue {
    entries: Mutex<VecDeque<LogEntry>>,
    limit: usize,
    dropped: Mutex<u64>,
}

impl Default for LogQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_LIMIT)
    }
}

impl LogQueue {
    /// Queue holding at most `limit` entries (min 1).
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            limit: limit.max(1),
            dropped: Mutex::new(0),
        }
    }

    /// Appends an entry.
    pub fn push(&self, entry: LogEntry) {
        let mut q = self.entries.lock();
        if q.len() >= self.limit {
            q.pop_front();
            *self.dropped.lock() += 1;
        }
        q.push_back(entry);
    }

    /// Takes everything queued so far.
    pub fn drain(&self) -> Vec<LogEntry> {
        self.entries.lock().drain(..).collect()
    }

    /// Entries lost to overflow since the last call; resets the counter.
    pub fn take_dropped(&self) -> u64 {
        std::mem::take(&mut *self.dropped.lock())
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn renders_time_then_message() {
        let at = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap();
        let e = LogEntry {
            level: LogLevel::Info,
            at,
            message: "hello".into(),
        };
        assert_eq!(e.render(), "09:05:01 03/07/24 hello");
    }

    #[test]
    fn overflow_drops_oldest() {
        let q = LogQueue::new(2);
        for m in ["a", "b", "c"] {
            q.push(LogEntry::now(LogLevel::Info, m));
        }
        let msgs: Vec<String> = q.drain().into_iter().map(|e| e.message).collect();
        assert_eq!(msgs, ["b", "c"]);
        assert_eq!(q.take_dropped(), 1);
        assert_eq!(q.take_dropped(), 0);
        assert!(q.is_empty());
    }
}
