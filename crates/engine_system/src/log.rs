//! Pluggable log sink.
//!
//! The manager never calls `tracing` directly: it writes through a
//! [`LogSink`] injected at construction. [`TracingSink`] forwards to
//! `tracing`. With the `test-util` feature, `MemorySink` captures lines for
//! tests.

use std::fmt;

#[cfg(any(test, feature = "test-util"))]
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: fmt::Arguments<'_>);

    /// Lets callers skip formatting for disabled levels.
    fn enabled(&self, _level: LogLevel) -> bool {
        true
    }
}

/// Forwards to the `tracing` macros under the `engine` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: fmt::Arguments<'_>) {
        match level {
            LogLevel::Error => tracing::error!(target: "engine", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "engine", "{message}"),
            LogLevel::Info => tracing::info!(target: "engine", "{message}"),
            LogLevel::Debug => tracing::debug!(target: "engine", "{message}"),
            LogLevel::Trace => tracing::trace!(target: "engine", "{message}"),
        }
    }

    fn enabled(&self, level: LogLevel) -> bool {
        match level {
            LogLevel::Error => tracing::enabled!(target: "engine", tracing::Level::ERROR),
            LogLevel::Warn => tracing::enabled!(target: "engine", tracing::Level::WARN),
            LogLevel::Info => tracing::enabled!(target: "engine", tracing::Level::INFO),
            LogLevel::Debug => tracing::enabled!(target: "engine", tracing::Level::DEBUG),
            LogLevel::Trace => tracing::enabled!(target: "engine", tracing::Level::TRACE),
        }
    }
}

/// Keeps every line at or above `max_level` in memory.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug)]
pub struct MemorySink {
    max_level: LogLevel,
    lines: Mutex<Vec<(LogLevel, String)>>,
}

#[cfg(any(test, feature = "test-util"))]
impl MemorySink {
    #[must_use]
    pub fn new(max_level: LogLevel) -> Self {
        Self { max_level, lines: Mutex::new(Vec::new()) }
    }

    #[must_use]
    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().clone()
    }

    /// Returns `true` if some line at `level` contains `needle`.
    #[must_use]
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.lines.lock().iter().any(|(l, line)| *l == level && line.contains(needle))
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Default for MemorySink {
    fn default() -> Self {
        Self::new(LogLevel::Debug)
    }
}

#[cfg(any(test, feature = "test-util"))]
impl LogSink for MemorySink {
    fn log(&self, level: LogLevel, message: fmt::Arguments<'_>) {
        if self.enabled(level) {
            self.lines.lock().push((level, message.to_string()));
        }
    }

    fn enabled(&self, level: LogLevel) -> bool {
        level <= self.max_level
    }
}
