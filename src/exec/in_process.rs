// src/exec/in_process.rs

//! Same-runtime execution.
//!
//! Entry points are plain Rust values registered by name. They never exit
//! the process themselves: asking for an exit status is done by returning
//! [`InvocationOutcome::RequestedExit`]. Everything runs synchronously on
//! the calling thread and cannot be interrupted, so a configured timeout is
//! not enforced here (a warning says so).

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::command::{CommandSpec, Target};
use crate::errors::{ExecError, Result};
use crate::exec::properties::{self, PropertyOverlay};
use crate::exec::redirector::{CapturedOutput, Redirector};
use crate::exec::result::InvocationOutcome;
use crate::report::Reporter;
use crate::types::Severity;

/// What an entry point sees while it runs.
pub struct InvocationContext<'a> {
    name: &'a str,
    args: &'a [String],
    classpath: &'a [PathBuf],
    pub stdin: &'a mut dyn Read,
    pub stdout: &'a mut dyn Write,
    pub stderr: &'a mut dyn Write,
}

impl<'a> InvocationContext<'a> {
    pub fn new(
        name: &'a str,
        args: &'a [String],
        classpath: &'a [PathBuf],
        stdin: &'a mut dyn Read,
        stdout: &'a mut dyn Write,
        stderr: &'a mut dyn Write,
    ) -> Self {
        Self {
            name,
            args,
            classpath,
            stdin,
            stdout,
            stderr,
        }
    }

    /// Name the entry point was invoked under.
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn args(&self) -> &[String] {
        self.args
    }

    pub fn arg(&self, idx: usize) -> Option<&str> {
        self.args.get(idx).map(String::as_str)
    }

    pub fn classpath(&self) -> &[PathBuf] {
        self.classpath
    }

    /// Current system property value, including any installed for this call.
    pub fn property(&self, name: &str) -> Option<String> {
        properties::property(name)
    }
}

/// A unit of work callable inside the current process.
pub trait EntryPoint: Send + Sync {
    fn invoke(&self, ctx: &mut InvocationContext<'_>) -> anyhow::Result<InvocationOutcome>;
}

impl<F> EntryPoint for F
where
    F: Fn(&mut InvocationContext<'_>) -> anyhow::Result<InvocationOutcome> + Send + Sync,
{
    fn invoke(&self, ctx: &mut InvocationContext<'_>) -> anyhow::Result<InvocationOutcome> {
        self(ctx)
    }
}

/// Named entry points.
#[derive(Clone, Default)]
pub struct EntryPointRegistry {
    entries: BTreeMap<String, Arc<dyn EntryPoint>>,
}

impl fmt::Debug for EntryPointRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPointRegistry")
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl EntryPointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-filled with [`crate::entry::builtin`] entry points.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::entry::builtin::register_all(&mut registry);
        registry
    }

    /// Add or replace an entry point.
    pub fn register(&mut self, name: impl Into<String>, entry: impl EntryPoint + 'static) {
        self.entries.insert(name.into(), Arc::new(entry));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn EntryPoint>> {
        self.entries.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Completed same-runtime run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InProcessRun {
    pub outcome: InvocationOutcome,
    pub captured: CapturedOutput,
}

#[derive(Debug, Clone)]
pub struct SameRuntimeInvoker {
    registry: Arc<EntryPointRegistry>,
    reporter: Arc<dyn Reporter>,
}

impl SameRuntimeInvoker {
    pub fn new(registry: Arc<EntryPointRegistry>, reporter: Arc<dyn Reporter>) -> Self {
        Self { registry, reporter }
    }

    /// Run `spec`'s entry point on the calling thread.
    ///
    /// System properties are installed for the duration of the call and
    /// restored on every exit path. Working directory, environment, launcher
    /// and timeout settings only apply to forked runs and are reported as
    /// ignored.
    pub fn invoke(&self, spec: &CommandSpec, redirector: &mut Redirector) -> Result<InProcessRun> {
        let name = match spec.target() {
            Target::EntryPoint(name) => name.as_str(),
            Target::Artifact(_) => {
                return Err(ExecError::config(
                    "cannot execute an artifact in-process; set fork = true",
                ));
            }
        };

        self.warn_ignored(spec);

        let entry = self
            .registry
            .get(name)
            .ok_or_else(|| {
                let known: Vec<&str> = self.registry.names().collect();
                ExecError::execution(format!(
                    "entry point '{name}' not found (known: {})",
                    known.join(", ")
                ))
            })?;

        self.reporter.log(
            &format!("Running in same runtime {}", spec.describe()),
            Severity::Verbose,
        );

        let mut streams = redirector.in_process_streams()?;

        let called = {
            let _overlay = PropertyOverlay::install(spec.system_properties());
            let mut ctx = InvocationContext::new(
                name,
                spec.arguments(),
                spec.classpath(),
                streams.stdin.as_mut(),
                &mut streams.stdout,
                &mut streams.stderr,
            );
            panic::catch_unwind(AssertUnwindSafe(|| entry.invoke(&mut ctx)))
        };

        // Streams are released whether or not the call succeeded.
        let finished = streams.finish();

        let outcome = match called {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => return Err(ExecError::execution(format!("{name}: {e:#}"))),
            Err(payload) => {
                return Err(ExecError::execution(format!(
                    "{name} panicked: {}",
                    panic_message(payload.as_ref())
                )));
            }
        };
        let captured = finished?;

        match outcome {
            InvocationOutcome::Completed => debug!(entry = name, "entry point completed"),
            InvocationOutcome::RequestedExit(code) => {
                info!(entry = name, code, "entry point requested exit")
            }
        }

        Ok(InProcessRun { outcome, captured })
    }

    fn warn_ignored(&self, spec: &CommandSpec) {
        if spec.launcher().is_some() {
            self.reporter
                .log("Launcher ignored when same runtime is used.", Severity::Warn);
        }
        if spec.working_dir().is_some() {
            self.reporter.log(
                "Working directory ignored when same runtime is used.",
                Severity::Warn,
            );
        }
        if spec.environment().is_modified() {
            self.reporter.log(
                "Changes to environment variables are ignored when same runtime is used.",
                Severity::Warn,
            );
        }
        if let Some(timeout) = spec.timeout() {
            self.reporter.log(
                &format!(
                    "Timeout of {}ms ignored when same runtime is used; \
                     the call cannot be interrupted. Set fork = true to enforce it.",
                    timeout.as_millis()
                ),
                Severity::Warn,
            );
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
