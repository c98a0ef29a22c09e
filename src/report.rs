// src/report.rs

//! Collaborator boundaries: status reporting and named output variables.
//!
//! - [`Reporter`] receives warnings and errors worth showing to whoever
//!   drives the invocation (ignored settings, watchdog kills, recovered
//!   failures). [`TracingReporter`] forwards everything to `tracing`.
//! - [`OutputStore`] receives published values: captured stream output and
//!   the result code. [`MemoryStore`] keeps them in a map.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

use crate::types::Severity;

/// Opaque sink for status messages.
pub trait Reporter: Send + Sync + Debug {
    fn log(&self, message: &str, severity: Severity);
}

/// Default reporter: one tracing event per message.
#[derive(Debug, Clone, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn log(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Error => error!(target: "execwatch::report", "{message}"),
            Severity::Warn => warn!(target: "execwatch::report", "{message}"),
            Severity::Info => info!(target: "execwatch::report", "{message}"),
            Severity::Verbose => debug!(target: "execwatch::report", "{message}"),
        }
    }
}

/// Store for named output variables.
pub trait OutputStore: Send + Sync + Debug {
    fn publish(&self, name: &str, value: &str);
}

/// In-memory [`OutputStore`], shareable across invocations.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.lock().get(name).cloned()
    }

    /// Snapshot of everything published so far, sorted by name.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        // A poisoned map is still a valid map.
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl OutputStore for MemoryStore {
    fn publish(&self, name: &str, value: &str) {
        debug!(name, value, "publishing output variable");
        self.lock().insert(name.to_string(), value.to_string());
    }
}
