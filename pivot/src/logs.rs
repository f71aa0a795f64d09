//! Progress logging for pipeline runs.
//!
//! Entries go to stderr so that commands writing data to stdout stay
//! pipeable. The output style is process-wide and set once by the CLI.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

/// Log level for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Log message
    pub message: String,
    /// Optional indentation level (for nested logs)
    #[serde(default)]
    pub indent: u8,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Info, message: message.into(), indent: 0 }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Success, message: message.into(), indent: 0 }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Warning, message: message.into(), indent: 0 }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Error, message: message.into(), indent: 0 }
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }

    /// Human-readable line, prefixed by level icon and indentation.
    pub fn render(&self) -> String {
        let prefix = match self.level {
            LogLevel::Info => "   ",
            LogLevel::Success => "   ✓",
            LogLevel::Warning => "   ⚠️",
            LogLevel::Error => "   ❌",
        };
        let indent = "   ".repeat(self.indent as usize);
        format!("{}{} {}", indent, prefix, self.message)
    }
}

/// How entries are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStyle {
    /// Everything, human-readable.
    Pretty,
    /// Warnings and errors only.
    Quiet,
    /// Everything, one JSON object per line.
    Json,
}

static STYLE: AtomicU8 = AtomicU8::new(0);

/// Set the output style for the rest of the process.
pub fn set_style(style: LogStyle) {
    let raw = match style {
        LogStyle::Pretty => 0,
        LogStyle::Quiet => 1,
        LogStyle::Json => 2,
    };
    STYLE.store(raw, Ordering::Relaxed);
}

pub fn style() -> LogStyle {
    match STYLE.load(Ordering::Relaxed) {
        1 => LogStyle::Quiet,
        2 => LogStyle::Json,
        _ => LogStyle::Pretty,
    }
}

/// Format an entry for the given style, or `None` if it is filtered out.
pub fn format_entry(entry: &LogEntry, style: LogStyle) -> Option<String> {
    match style {
        LogStyle::Quiet if matches!(entry.level, LogLevel::Info | LogLevel::Success) => None,
        LogStyle::Json => serde_json::to_string(entry).ok(),
        _ => Some(entry.render()),
    }
}

/// Write one entry to stderr.
pub fn log(entry: LogEntry) {
    if let Some(line) = format_entry(&entry, style()) {
        eprintln!("{}", line);
    }
}

/// Convenient logging functions
pub fn log_info(msg: impl Into<String>) {
    log(LogEntry::info(msg));
}

pub fn log_success(msg: impl Into<String>) {
    log(LogEntry::success(msg));
}

pub fn log_warning(msg: impl Into<String>) {
    log(LogEntry::warning(msg));
}

pub fn log_error(msg: impl Into<String>) {
    log(LogEntry::error(msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    log(LogEntry::info(msg).with_indent(indent));
}
