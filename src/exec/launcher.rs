// src/exec/launcher.rs

//! Forked execution.
//!
//! [`ProcessLauncher::launch`] validates the command, prepares redirection,
//! spawns the child and arms its watchdog. [`ProcessLauncher::await_completion`]
//! waits for exit (or kill), then for every stream drain, and only then
//! produces the [`ExecutionResult`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::command::CommandSpec;
use crate::command::redirect::resolve_path;
use crate::command::render::forked_command_line;
use crate::errors::{ExecError, Result};
use crate::exec::redirector::{CapturedOutput, Redirector};
use crate::exec::result::ExecutionResult;
use crate::exec::watchdog::Watchdog;
use crate::report::Reporter;
use crate::types::Severity;

/// How long stream drains may run on after a watchdog kill.
pub const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// A running child plus everything scoped to it.
///
/// The child is spawned with `kill_on_drop`, so dropping a handle without
/// awaiting it still terminates the process.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    watchdog: Option<Watchdog>,
    redirector: Redirector,
    label: String,
}

impl ProcessHandle {
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }
}

/// Completed forked run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkedRun {
    pub result: ExecutionResult,
    pub captured: CapturedOutput,
}

#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    base_dir: PathBuf,
    reporter: Arc<dyn Reporter>,
}

impl ProcessLauncher {
    /// `base_dir` is the working directory for specs that set none, and the
    /// anchor for relative paths.
    pub fn new(base_dir: impl Into<PathBuf>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            base_dir: base_dir.into(),
            reporter,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Spawn `spec` with its streams bound by `redirector`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn launch(&self, spec: &CommandSpec, mut redirector: Redirector) -> Result<ProcessHandle> {
        if !spec.mode().is_forked() {
            return Err(ExecError::config(
                "process launcher only runs forked command specs",
            ));
        }

        let dir = self.working_dir(spec)?;
        let cmdline = forked_command_line(spec, &self.base_dir)?;
        for setting in &cmdline.ignored {
            self.reporter.log(
                &format!("{setting} ignored when running an artifact"),
                Severity::Warn,
            );
        }

        let label = spec.describe();
        self.reporter.log(&cmdline.describe(), Severity::Verbose);

        let mut cmd = Command::new(cmdline.program());
        cmd.args(cmdline.args()).current_dir(&dir).kill_on_drop(true);

        let env = spec.environment();
        if env.is_modified() {
            for (name, value) in env.vars() {
                debug!(task = %label, "setting environment variable: {name}={value}");
            }
            cmd.env_clear().envs(env.resolve(std::env::vars_os()));
        }

        #[cfg(unix)]
        cmd.process_group(0);

        // Opening sinks may fail; nothing is running yet at that point.
        let stdio = redirector.prepare()?;
        cmd.stdin(stdio.stdin).stdout(stdio.stdout).stderr(stdio.stderr);

        let mut child = cmd.spawn().map_err(|e| {
            ExecError::execution(format!(
                "could not launch {}: {e}",
                cmdline.program().to_string_lossy()
            ))
        })?;

        info!(
            task = %label,
            pid = child.id(),
            dir = %dir.display(),
            "started process"
        );

        redirector.attach(&mut child)?;

        // Armed only now that a process exists.
        let watchdog = spec.timeout().map(Watchdog::arm);

        Ok(ProcessHandle {
            child,
            watchdog,
            redirector,
            label,
        })
    }

    /// Wait for the child and its drains; never returns before both.
    pub async fn await_completion(&self, handle: ProcessHandle) -> Result<ForkedRun> {
        let ProcessHandle {
            mut child,
            watchdog,
            mut redirector,
            label,
        } = handle;

        let waited = match watchdog {
            Some(mut watchdog) => watchdog
                .supervise(&mut child)
                .await
                .map(|status| (status, watchdog.expired())),
            None => child.wait().await.map(|status| (status, false)),
        };

        let (status, timed_out) = match waited {
            Ok(v) => v,
            Err(e) => {
                // Still release the streams before reporting.
                let _ = redirector.complete(Some(DRAIN_GRACE)).await;
                return Err(ExecError::execution(format!(
                    "waiting for process of {label}: {e}"
                )));
            }
        };

        if timed_out {
            self.reporter
                .log("Timeout: killed the sub-process", Severity::Warn);
        }

        let captured = redirector
            .complete(timed_out.then_some(DRAIN_GRACE))
            .await?;

        let result = ExecutionResult::from_status(status, timed_out);
        if result.is_failure() {
            warn!(task = %label, exit_code = result.exit_code, timed_out, "process exited");
        } else {
            info!(task = %label, exit_code = result.exit_code, "process exited");
        }

        Ok(ForkedRun { result, captured })
    }

    /// `launch` followed by `await_completion`.
    pub async fn run(&self, spec: &CommandSpec, redirector: Redirector) -> Result<ForkedRun> {
        let handle = self.launch(spec, redirector)?;
        self.await_completion(handle).await
    }

    fn working_dir(&self, spec: &CommandSpec) -> Result<PathBuf> {
        match spec.working_dir() {
            None => Ok(self.base_dir.clone()),
            Some(dir) => {
                let dir = resolve_path(&self.base_dir, dir);
                if dir.is_dir() {
                    Ok(dir)
                } else {
                    Err(ExecError::config(format!(
                        "{} is not a valid directory",
                        dir.display()
                    )))
                }
            }
        }
    }
}
