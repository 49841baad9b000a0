/// Capturing logger for unit tests
///
/// Installs itself as the global logger and records every entry so tests can
/// assert on severity and message. Tests using it must be `#[serial]`.

use std::sync::{Arc, Mutex};
use crate::log::{Logger, LogEntry, LogSeverity};
use crate::runtime::Runtime;

pub struct TestLogger {
    entries: Arc<Mutex<Vec<(LogSeverity, String)>>>,
}

impl Logger for TestLogger {
    fn log(&self, entry: &LogEntry) {
        let mut entries = self.entries.lock().unwrap();
        entries.push((entry.severity, entry.message.clone()));
    }
}

/// Handle to the entries captured since `install()`; restores the default logger on drop
pub struct CapturedLogs {
    entries: Arc<Mutex<Vec<(LogSeverity, String)>>>,
    previous_min: LogSeverity,
}

impl CapturedLogs {
    pub fn install() -> Self {
        let entries = Arc::new(Mutex::new(Vec::new()));
        let previous_min = Runtime::min_severity();
        Runtime::set_min_severity(LogSeverity::Trace);
        Runtime::set_logger(TestLogger { entries: Arc::clone(&entries) });
        Self { entries, previous_min }
    }

    pub fn entries(&self) -> Vec<(LogSeverity, String)> {
        self.entries.lock().unwrap().clone()
    }

    /// True if any entry at `severity` contains `needle` (case-insensitive)
    pub fn contains(&self, severity: LogSeverity, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.entries()
            .iter()
            .any(|(sev, msg)| *sev == severity && msg.to_lowercase().contains(&needle))
    }
}

impl Drop for CapturedLogs {
    fn drop(&mut self) {
        Runtime::reset_logger();
        Runtime::set_min_severity(self.previous_min);
    }
}
