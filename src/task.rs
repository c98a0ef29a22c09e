// src/task.rs

//! One configured invocation plus its failure policy.
//!
//! [`ExecTask::execute`] picks the execution mode, runs the command,
//! publishes captured stream output and applies [`FailurePolicy`]:
//!
//! - configuration errors are always returned;
//! - with `fail_on_error`, execution errors and failing exit codes are
//!   returned as errors;
//! - otherwise they are reported at error severity and the task looks
//!   successful (`exit_code == 0`) to the caller, while the result property
//!   still receives the *true* exit code.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::command::CommandSpec;
use crate::command::redirect::RedirectionSpec;
use crate::errors::{ExecError, Result};
use crate::exec::in_process::{EntryPointRegistry, SameRuntimeInvoker};
use crate::exec::launcher::ProcessLauncher;
use crate::exec::redirector::Redirector;
use crate::exec::result::ExecutionResult;
use crate::report::{MemoryStore, OutputStore, Reporter, TracingReporter};
use crate::types::{ExecMode, Severity};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailurePolicy {
    pub fail_on_error: bool,
    /// Output variable receiving the exit code as text.
    pub result_property: Option<String>,
}

/// What the caller's workflow gets back from a non-fatal run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskReport {
    /// Exit code as seen by control flow; 0 whenever a failure was recovered.
    pub exit_code: i32,
    /// The real result, when the command got far enough to have one.
    pub result: Option<ExecutionResult>,
    /// True when a failure was logged instead of raised.
    pub recovered: bool,
}

impl FailurePolicy {
    /// Decide fatal-vs-logged for one attempt.
    pub fn apply(
        &self,
        attempt: Result<ExecutionResult>,
        reporter: &dyn Reporter,
    ) -> Result<TaskReport> {
        match attempt {
            Err(e) if e.is_configuration() => Err(e),
            Err(e) if self.fail_on_error => Err(e),
            Err(e) => {
                reporter.log(&e.to_string(), Severity::Error);
                Ok(TaskReport {
                    exit_code: 0,
                    result: None,
                    recovered: true,
                })
            }
            Ok(result) if result.is_failure() => {
                if self.fail_on_error {
                    return Err(ExecError::Failed {
                        code: result.exit_code,
                    });
                }
                reporter.log(&format!("Result: {}", result.exit_code), Severity::Error);
                Ok(TaskReport {
                    exit_code: 0,
                    result: Some(result),
                    recovered: true,
                })
            }
            Ok(result) => Ok(TaskReport {
                exit_code: result.exit_code,
                result: Some(result),
                recovered: false,
            }),
        }
    }
}

/// A fully described invocation, ready to execute.
#[derive(Debug, Clone)]
pub struct ExecTask {
    name: String,
    spec: CommandSpec,
    redirect: RedirectionSpec,
    policy: FailurePolicy,
    base_dir: PathBuf,
    reporter: Arc<dyn Reporter>,
    store: Arc<dyn OutputStore>,
    registry: Arc<EntryPointRegistry>,
}

impl ExecTask {
    pub fn new(name: impl Into<String>, spec: CommandSpec, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            spec,
            redirect: RedirectionSpec::inherit(),
            policy: FailurePolicy::default(),
            base_dir: base_dir.into(),
            reporter: Arc::new(TracingReporter),
            store: Arc::new(MemoryStore::new()),
            registry: Arc::new(EntryPointRegistry::with_builtins()),
        }
    }

    pub fn with_redirection(mut self, redirect: RedirectionSpec) -> Self {
        self.redirect = redirect;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn OutputStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_registry(mut self, registry: Arc<EntryPointRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    /// Run once and apply the failure policy.
    ///
    /// Same-runtime tasks run synchronously on the current thread, blocking
    /// the executor for the duration of the call.
    pub async fn execute(&self) -> Result<TaskReport> {
        info!(
            task = %self.name,
            mode = ?self.spec.mode(),
            command = %self.spec.describe(),
            "executing task"
        );

        let attempt = self.run().await;
        let report = self.policy.apply(attempt, self.reporter.as_ref())?;

        if let (Some(prop), Some(result)) = (&self.policy.result_property, report.result) {
            self.store.publish(prop, &result.exit_code.to_string());
        }

        debug!(task = %self.name, ?report, "task finished");
        Ok(report)
    }

    async fn run(&self) -> Result<ExecutionResult> {
        let mut redirector = Redirector::new(&self.redirect, &self.base_dir, self.reporter.clone());

        match self.spec.mode() {
            ExecMode::Forked => {
                let launcher = ProcessLauncher::new(self.base_dir.clone(), self.reporter.clone());
                let run = launcher.run(&self.spec, redirector).await?;
                run.captured.publish_to(self.store.as_ref());
                Ok(run.result)
            }
            ExecMode::SameRuntime => {
                let invoker =
                    SameRuntimeInvoker::new(self.registry.clone(), self.reporter.clone());
                let run = invoker.invoke(&self.spec, &mut redirector)?;
                run.captured.publish_to(self.store.as_ref());
                Ok(run.outcome.into())
            }
        }
    }
}
