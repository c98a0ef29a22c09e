// src/config/validate.rs

use std::path::PathBuf;
use std::sync::Arc;

use crate::command::CommandSpec;
use crate::command::redirect::RedirectionSpec;
use crate::config::model::{ConfigFile, DefaultSection, JobConfig, RawConfigFile};
use crate::errors::{ExecError, Result};
use crate::exec::in_process::EntryPointRegistry;
use crate::report::{OutputStore, Reporter};
use crate::task::{ExecTask, FailurePolicy};
use crate::types::parse_duration;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ExecError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.default, raw.job))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_jobs(cfg)?;
    validate_defaults(&cfg.default)?;
    for (name, job) in cfg.job.iter() {
        job_command_spec(name, job, &cfg.default)?;
        job_redirection(name, job)?;
    }
    Ok(())
}

fn ensure_has_jobs(cfg: &RawConfigFile) -> Result<()> {
    if cfg.job.is_empty() {
        return Err(ExecError::config(
            "config must contain at least one [job.<name>] section",
        ));
    }
    Ok(())
}

fn validate_defaults(defaults: &DefaultSection) -> Result<()> {
    if let Some(raw) = &defaults.timeout {
        parse_duration(raw)
            .map_err(|e| ExecError::config(format!("[default].timeout: {e}")))?;
    }
    Ok(())
}

fn in_job(name: &str, err: ExecError) -> ExecError {
    match err {
        ExecError::Configuration(msg) => ExecError::config(format!("job '{name}': {msg}")),
        other => other,
    }
}

/// Build the [`CommandSpec`] described by one job.
pub fn job_command_spec(name: &str, job: &JobConfig, defaults: &DefaultSection) -> Result<CommandSpec> {
    let mut builder = CommandSpec::builder()
        .args(job.args.iter().cloned())
        .fork(job.effective_fork(defaults))
        .new_environment(job.new_environment);

    if let Some(launcher) = job.effective_launcher(defaults) {
        builder = builder.launcher(launcher.iter().cloned());
    }
    if let Some(artifact) = &job.artifact {
        builder = builder.artifact(artifact.clone());
    }
    if let Some(entry) = &job.entry_point {
        builder = builder.entry_point(entry.clone());
    }
    if let Some(dir) = &job.dir {
        builder = builder.working_dir(dir.clone());
    }
    if let Some(raw) = job.effective_timeout(defaults) {
        let timeout = parse_duration(raw)
            .map_err(|e| ExecError::config(format!("job '{name}': timeout: {e}")))?;
        builder = builder.timeout(timeout);
    }
    for (k, v) in &job.env {
        builder = builder.env(k.clone(), v.clone());
    }
    for path in &job.classpath {
        builder = builder.classpath_entry(path.clone());
    }
    for (k, v) in &job.properties {
        builder = builder.property(k.clone(), v.clone());
    }

    builder.build().map_err(|e| in_job(name, e))
}

/// Build the [`RedirectionSpec`] described by one job.
pub fn job_redirection(name: &str, job: &JobConfig) -> Result<RedirectionSpec> {
    let mut builder = RedirectionSpec::builder()
        .append(job.append)
        .log_error(job.log_error);

    if let Some(p) = &job.input {
        builder = builder.input(p.clone());
    }
    if let Some(s) = &job.input_string {
        builder = builder.input_string(s.clone());
    }
    if let Some(p) = &job.output {
        builder = builder.output(p.clone());
    }
    if let Some(n) = &job.output_property {
        builder = builder.output_property(n.clone());
    }
    if let Some(p) = &job.error {
        builder = builder.error(p.clone());
    }
    if let Some(n) = &job.error_property {
        builder = builder.error_property(n.clone());
    }

    builder.build().map_err(|e| in_job(name, e))
}

/// Collaborators shared by every task built from one config.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub base_dir: PathBuf,
    pub reporter: Arc<dyn Reporter>,
    pub store: Arc<dyn OutputStore>,
    pub registry: Arc<EntryPointRegistry>,
}

impl ConfigFile {
    /// Turn one job into an executable task.
    pub fn task(&self, name: &str, ctx: &TaskContext) -> Result<ExecTask> {
        let job = self
            .job
            .get(name)
            .ok_or_else(|| ExecError::config(format!("unknown job '{name}'")))?;

        let spec = job_command_spec(name, job, &self.default)?;
        let redirect = job_redirection(name, job)?;
        let policy = FailurePolicy {
            fail_on_error: job.effective_fail_on_error(&self.default),
            result_property: job.result_property.clone(),
        };

        Ok(ExecTask::new(name, spec, ctx.base_dir.clone())
            .with_redirection(redirect)
            .with_policy(policy)
            .with_reporter(ctx.reporter.clone())
            .with_store(ctx.store.clone())
            .with_registry(ctx.registry.clone()))
    }

    /// All jobs as tasks, in name order.
    pub fn tasks(&self, ctx: &TaskContext) -> Result<Vec<ExecTask>> {
        self.job.keys().map(|name| self.task(name, ctx)).collect()
    }
}
