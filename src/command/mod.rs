// src/command/mod.rs

//! Immutable descriptions of one invocation.
//!
//! - [`CommandSpec`] says *what* to run: an artifact or a named entry point,
//!   its arguments, working directory, environment, system properties and
//!   timeout.
//! - [`redirect::RedirectionSpec`] says where the standard streams go.
//! - [`render`] turns a forked `CommandSpec` into a concrete argv.
//!
//! Both specs are built once, validated by their builders and never mutated
//! afterwards; launchers only ever borrow them.

pub mod redirect;
pub mod render;

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{ExecError, Result};
use crate::types::ExecMode;

/// What the invocation starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A packaged artifact (an executable, or a file the launcher knows how
    /// to run). Forked mode only.
    Artifact(PathBuf),
    /// A named entry point, looked up in the registry when run in-process or
    /// handed to the launcher when forked.
    EntryPoint(String),
}

impl Target {
    pub fn name(&self) -> String {
        match self {
            Target::Artifact(path) => path.display().to_string(),
            Target::EntryPoint(name) => name.clone(),
        }
    }
}

/// Environment changes for a forked child.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentSpec {
    vars: BTreeMap<String, String>,
    replace_inherited: bool,
}

impl EnvironmentSpec {
    pub fn new(vars: BTreeMap<String, String>, replace_inherited: bool) -> Self {
        Self {
            vars,
            replace_inherited,
        }
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// True when running with this spec differs from plain inheritance.
    pub fn is_modified(&self) -> bool {
        self.replace_inherited || !self.vars.is_empty()
    }

    /// The environment a child would see, given the inherited one.
    pub fn resolve<I, K, V>(&self, inherited: I) -> BTreeMap<OsString, OsString>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        let mut out: BTreeMap<OsString, OsString> = if self.replace_inherited {
            BTreeMap::new()
        } else {
            inherited
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect()
        };
        for (k, v) in &self.vars {
            out.insert(k.into(), v.into());
        }
        out
    }
}

/// Immutable description of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    launcher: Option<Vec<String>>,
    target: Target,
    arguments: Vec<String>,
    working_dir: Option<PathBuf>,
    environment: EnvironmentSpec,
    classpath: Vec<PathBuf>,
    system_properties: BTreeMap<String, String>,
    timeout: Option<Duration>,
    mode: ExecMode,
}

impl CommandSpec {
    pub fn builder() -> CommandSpecBuilder {
        CommandSpecBuilder::default()
    }

    pub fn launcher(&self) -> Option<&[String]> {
        self.launcher.as_deref()
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn environment(&self) -> &EnvironmentSpec {
        &self.environment
    }

    pub fn classpath(&self) -> &[PathBuf] {
        &self.classpath
    }

    pub fn system_properties(&self) -> &BTreeMap<String, String> {
        &self.system_properties
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    /// Short human-readable form for logs: target followed by arguments.
    pub fn describe(&self) -> String {
        let mut parts = vec![self.target.name()];
        parts.extend(self.arguments.iter().cloned());
        parts.join(" ")
    }
}

/// Builder for [`CommandSpec`]; [`CommandSpecBuilder::build`] enforces the
/// entry invariants.
#[derive(Debug, Clone, Default)]
pub struct CommandSpecBuilder {
    launcher: Option<Vec<String>>,
    artifact: Option<PathBuf>,
    entry_point: Option<String>,
    arguments: Vec<String>,
    working_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
    new_environment: bool,
    classpath: Vec<PathBuf>,
    system_properties: BTreeMap<String, String>,
    timeout: Option<Duration>,
    fork: bool,
}

impl CommandSpecBuilder {
    pub fn launcher<I, S>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.launcher = Some(argv.into_iter().map(Into::into).collect());
        self
    }

    pub fn artifact(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact = Some(path.into());
        self
    }

    pub fn entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry_point = Some(name.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.arguments.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    pub fn new_environment(mut self, replace: bool) -> Self {
        self.new_environment = replace;
        self
    }

    pub fn classpath_entry(mut self, path: impl Into<PathBuf>) -> Self {
        self.classpath.push(path.into());
        self
    }

    pub fn property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.system_properties.insert(name.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn fork(mut self, fork: bool) -> Self {
        self.fork = fork;
        self
    }

    pub fn build(self) -> Result<CommandSpec> {
        let target = match (self.artifact, self.entry_point) {
            (Some(_), Some(_)) => {
                return Err(ExecError::config(
                    "cannot set both an artifact and an entry point",
                ));
            }
            (None, None) => {
                return Err(ExecError::config(
                    "an artifact or an entry point must be set",
                ));
            }
            (None, Some(name)) if name.trim().is_empty() => {
                return Err(ExecError::config("entry point name must not be empty"));
            }
            (Some(path), None) => Target::Artifact(path),
            (None, Some(name)) => Target::EntryPoint(name),
        };

        if matches!(target, Target::Artifact(_)) && !self.fork {
            return Err(ExecError::config(
                "cannot execute an artifact in-process; set fork = true",
            ));
        }

        if let Some(launcher) = &self.launcher {
            if launcher.is_empty() || launcher[0].is_empty() {
                return Err(ExecError::config("launcher must name a program"));
            }
        }

        Ok(CommandSpec {
            launcher: self.launcher,
            target,
            arguments: self.arguments,
            working_dir: self.working_dir,
            environment: EnvironmentSpec::new(self.env, self.new_environment),
            classpath: self.classpath,
            system_properties: self.system_properties,
            timeout: self.timeout,
            mode: ExecMode::from_fork(self.fork),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_and_entry_point_are_exclusive() {
        let err = CommandSpec::builder()
            .artifact("app.bin")
            .entry_point("Main")
            .fork(true)
            .build()
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn missing_entry_is_rejected() {
        let err = CommandSpec::builder().fork(true).build().unwrap_err();
        assert!(matches!(err, ExecError::Configuration(msg) if msg.contains("must be set")));
    }

    #[test]
    fn artifact_requires_fork() {
        let err = CommandSpec::builder().artifact("app.bin").build().unwrap_err();
        assert!(matches!(err, ExecError::Configuration(msg) if msg.contains("fork")));

        let spec = CommandSpec::builder()
            .artifact("app.bin")
            .fork(true)
            .build()
            .unwrap();
        assert_eq!(spec.target(), &Target::Artifact(PathBuf::from("app.bin")));
        assert!(spec.mode().is_forked());
    }

    #[test]
    fn describe_joins_target_and_args() {
        let spec = CommandSpec::builder()
            .entry_point("Echo")
            .args(["hi", "there"])
            .build()
            .unwrap();
        assert_eq!(spec.describe(), "Echo hi there");
        assert_eq!(spec.mode(), ExecMode::SameRuntime);
    }

    #[test]
    fn environment_resolution_extends_or_replaces() {
        let inherited = [("PATH", "/bin"), ("HOME", "/root")];

        let mut vars = BTreeMap::new();
        vars.insert("HOME".to_string(), "/tmp".to_string());

        let extend = EnvironmentSpec::new(vars.clone(), false);
        let env = extend.resolve(inherited);
        assert_eq!(env.get(&OsString::from("PATH")), Some(&OsString::from("/bin")));
        assert_eq!(env.get(&OsString::from("HOME")), Some(&OsString::from("/tmp")));

        let replace = EnvironmentSpec::new(vars, true);
        let env = replace.resolve(inherited);
        assert_eq!(env.len(), 1);
        assert_eq!(env.get(&OsString::from("HOME")), Some(&OsString::from("/tmp")));
    }
}
