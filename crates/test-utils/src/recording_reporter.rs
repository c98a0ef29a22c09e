use std::sync::{Arc, Mutex};

use execwatch::report::Reporter;
use execwatch::types::Severity;

/// A reporter that remembers every message, for assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    entries: Arc<Mutex<Vec<(String, Severity)>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(String, Severity)> {
        self.entries.lock().unwrap().clone()
    }

    /// Messages logged at exactly `severity`.
    pub fn at(&self, severity: Severity) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(_, s)| *s == severity)
            .map(|(m, _)| m)
            .collect()
    }

    /// True if some message at `severity` contains `needle`.
    pub fn logged(&self, severity: Severity, needle: &str) -> bool {
        self.at(severity).iter().any(|m| m.contains(needle))
    }
}

impl Reporter for RecordingReporter {
    fn log(&self, message: &str, severity: Severity) {
        tracing::debug!(%severity, message, "recorded");
        self.entries
            .lock()
            .unwrap()
            .push((message.to_string(), severity));
    }
}
