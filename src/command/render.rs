// src/command/render.rs

//! Forked argv construction.
//!
//! - `EntryPoint(name)`: `launcher [--classpath CP] [-D k=v]... -- name args...`
//! - `Artifact(path)`: `[launcher...] path args...`
//!
//! The default launcher is the running `execwatch` binary with its `entry`
//! subcommand, which understands the flags above.

use std::ffi::OsString;
use std::path::Path;

use crate::command::redirect::resolve_path;
use crate::command::{CommandSpec, Target};
use crate::errors::{ExecError, Result};

pub const ENTRY_SUBCOMMAND: &str = "entry";
pub const CLASSPATH_FLAG: &str = "--classpath";
pub const PROPERTY_FLAG: &str = "-D";

/// A rendered argv plus the settings that had no effect on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub argv: Vec<OsString>,
    pub ignored: Vec<&'static str>,
}

impl CommandLine {
    pub fn program(&self) -> &OsString {
        &self.argv[0]
    }

    pub fn args(&self) -> &[OsString] {
        &self.argv[1..]
    }

    pub fn describe(&self) -> String {
        self.argv
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Build the argv for running `spec` as a separate process.
pub fn forked_command_line(spec: &CommandSpec, base_dir: &Path) -> Result<CommandLine> {
    let mut argv: Vec<OsString> = Vec::new();
    let mut ignored = Vec::new();

    match spec.target() {
        Target::EntryPoint(name) => {
            match spec.launcher() {
                Some(launcher) => argv.extend(launcher.iter().map(OsString::from)),
                None => argv.extend(default_launcher()?),
            }

            if !spec.classpath().is_empty() {
                let joined = std::env::join_paths(spec.classpath()).map_err(|e| {
                    ExecError::config(format!("invalid classpath entry: {e}"))
                })?;
                argv.push(CLASSPATH_FLAG.into());
                argv.push(joined);
            }

            for (k, v) in spec.system_properties() {
                argv.push(PROPERTY_FLAG.into());
                argv.push(format!("{k}={v}").into());
            }

            argv.push("--".into());
            argv.push(name.into());
        }
        Target::Artifact(path) => {
            if let Some(launcher) = spec.launcher() {
                argv.extend(launcher.iter().map(OsString::from));
            }
            if !spec.classpath().is_empty() {
                ignored.push("classpath");
            }
            if !spec.system_properties().is_empty() {
                ignored.push("system properties");
            }
            argv.push(resolve_path(base_dir, path).into_os_string());
        }
    }

    argv.extend(spec.arguments().iter().map(OsString::from));

    Ok(CommandLine { argv, ignored })
}

fn default_launcher() -> Result<Vec<OsString>> {
    let exe = std::env::current_exe()
        .map_err(|e| ExecError::execution(format!("locating the execwatch binary: {e}")))?;
    Ok(vec![exe.into_os_string(), ENTRY_SUBCOMMAND.into()])
}
