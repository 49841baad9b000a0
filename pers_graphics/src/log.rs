//! Internal logging system for pers
//!
//! This module provides a flexible logging system with:
//! - Customizable logger via Logger trait
//! - Severity levels (Trace, Debug, Info, Warn, Error, Critical)
//! - Colored console output by default
//! - Minimum severity filtering applied before formatting
//! - File and line information for detailed ERROR logs

use colored::*;
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Logger trait for custom logging implementations
///
/// Implement this trait to route pers messages elsewhere (file, test capture, ...)
///
/// # Example
///
/// ```no_run
/// use pers_graphics::pers::log::{Logger, LogEntry};
///
/// struct FileLogger {
///     file: std::fs::File,
/// }
///
/// impl Logger for FileLogger {
///     fn log(&self, entry: &LogEntry) {
///         // Write to file...
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    /// Log an entry
    ///
    /// # Arguments
    ///
    /// * `entry` - The log entry to process
    fn log(&self, entry: &LogEntry);
}

/// Log entry containing all information about a log message
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Severity level
    pub severity: LogSeverity,

    /// Timestamp when the log was created
    pub timestamp: SystemTime,

    /// Source module (e.g., "pers::BufferFactory", "pers::webgpu::Buffer")
    pub source: String,

    /// Log message
    pub message: String,

    /// Source file (only for detailed logs)
    pub file: Option<&'static str>,

    /// Source line (only for detailed logs)
    pub line: Option<u32>,
}

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogSeverity {
    /// Very verbose debug information (mutex tracing, per-copy details)
    Trace,

    /// Development/debugging information
    Debug,

    /// Important informational messages
    Info,

    /// Warning messages (potential issues)
    Warn,

    /// Error messages (with file:line details)
    Error,

    /// Broken internal invariant; the affected object is unusable
    Critical,
}

impl LogSeverity {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            LogSeverity::Trace => 0,
            LogSeverity::Debug => 1,
            LogSeverity::Info => 2,
            LogSeverity::Warn => 3,
            LogSeverity::Error => 4,
            LogSeverity::Critical => 5,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => LogSeverity::Trace,
            1 => LogSeverity::Debug,
            2 => LogSeverity::Info,
            3 => LogSeverity::Warn,
            4 => LogSeverity::Error,
            _ => LogSeverity::Critical,
        }
    }
}

/// Default logger implementation using colored console output
///
/// Colors:
/// - Trace: bright_black
/// - Debug: cyan
/// - Info: green
/// - Warn: yellow
/// - Error: red + bold
/// - Critical: white on red
///
/// Format:
/// - Normal: `[timestamp] [SEVERITY] [source] message`
/// - Detailed: `[timestamp] [ERROR] [source] message (file:line)`
pub struct DefaultLogger;

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        // Format timestamp as YYYY-MM-DD HH:MM:SS.mmm
        let datetime: DateTime<Local> = entry.timestamp.into();
        let timestamp = datetime.format("%Y-%m-%d %H:%M:%S%.3f").to_string();

        let severity_str = match entry.severity {
            LogSeverity::Trace => "TRACE".bright_black(),
            LogSeverity::Debug => "DEBUG".cyan(),
            LogSeverity::Info => "INFO ".green(),
            LogSeverity::Warn => "WARN ".yellow(),
            LogSeverity::Error => "ERROR".red().bold(),
            LogSeverity::Critical => "CRIT ".white().on_red().bold(),
        };

        let source = entry.source.bright_blue();

        if let (Some(file), Some(line)) = (entry.file, entry.line) {
            println!(
                "[{}] [{}] [{}] {} ({}:{})",
                timestamp,
                severity_str,
                source,
                entry.message,
                file,
                line
            );
        } else {
            println!(
                "[{}] [{}] [{}] {}",
                timestamp,
                severity_str,
                source,
                entry.message
            );
        }
    }
}

// ===== LOGGING MACROS =====

/// Log a TRACE message (very verbose, filtered out by default)
///
/// # Example
///
/// ```no_run
/// # use pers_graphics::pers_trace;
/// pers_trace!("pers::Mutex", "lock acquired");
/// ```
#[macro_export]
macro_rules! pers_trace {
    ($source:expr, $($arg:tt)*) => {
        if $crate::pers::Runtime::is_enabled($crate::pers::log::LogSeverity::Trace) {
            $crate::pers::Runtime::log(
                $crate::pers::log::LogSeverity::Trace,
                $source,
                format!($($arg)*)
            )
        }
    };
}

/// Log a DEBUG message (development information)
///
/// # Example
///
/// ```no_run
/// # use pers_graphics::pers_debug;
/// # let bytes = 64;
/// pers_debug!("pers::DeviceBuffer", "Copied {} bytes", bytes);
/// ```
#[macro_export]
macro_rules! pers_debug {
    ($source:expr, $($arg:tt)*) => {
        if $crate::pers::Runtime::is_enabled($crate::pers::log::LogSeverity::Debug) {
            $crate::pers::Runtime::log(
                $crate::pers::log::LogSeverity::Debug,
                $source,
                format!($($arg)*)
            )
        }
    };
}

/// Log an INFO message (important events)
///
/// # Example
///
/// ```no_run
/// # use pers_graphics::pers_info;
/// pers_info!("pers::webgpu", "Logical device created");
/// ```
#[macro_export]
macro_rules! pers_info {
    ($source:expr, $($arg:tt)*) => {
        if $crate::pers::Runtime::is_enabled($crate::pers::log::LogSeverity::Info) {
            $crate::pers::Runtime::log(
                $crate::pers::log::LogSeverity::Info,
                $source,
                format!($($arg)*)
            )
        }
    };
}

/// Log a WARN message (potential issues)
///
/// # Example
///
/// ```no_run
/// # use pers_graphics::pers_warn;
/// pers_warn!("pers::MappableBuffer", "Buffer is already mapped");
/// ```
#[macro_export]
macro_rules! pers_warn {
    ($source:expr, $($arg:tt)*) => {
        if $crate::pers::Runtime::is_enabled($crate::pers::log::LogSeverity::Warn) {
            $crate::pers::Runtime::log(
                $crate::pers::log::LogSeverity::Warn,
                $source,
                format!($($arg)*)
            )
        }
    };
}

/// Log an ERROR message with file:line information
///
/// # Example
///
/// ```no_run
/// # use pers_graphics::pers_error;
/// pers_error!("pers::BufferFactory", "Failed to create buffer: {}", "invalid");
/// ```
#[macro_export]
macro_rules! pers_error {
    ($source:expr, $($arg:tt)*) => {
        if $crate::pers::Runtime::is_enabled($crate::pers::log::LogSeverity::Error) {
            $crate::pers::Runtime::log_detailed(
                $crate::pers::log::LogSeverity::Error,
                $source,
                format!($($arg)*),
                file!(),
                line!()
            )
        }
    };
}

/// Log a CRITICAL message with file:line information
///
/// Reserved for broken internal invariants.
#[macro_export]
macro_rules! pers_critical {
    ($source:expr, $($arg:tt)*) => {
        $crate::pers::Runtime::log_detailed(
            $crate::pers::log::LogSeverity::Critical,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
