// src/entry/mod.rs

//! The `entry` side of the launcher protocol.
//!
//! A forked entry point is started as `execwatch entry [--classpath CP]
//! [-D k=v]... -- NAME ARGS...`. That child process runs the named entry
//! point in-process with console streams and exits with its code.

pub mod builtin;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::command::CommandSpec;
use crate::command::redirect::RedirectionSpec;
use crate::errors::{ExecError, Result};
use crate::exec::in_process::{EntryPointRegistry, SameRuntimeInvoker};
use crate::exec::redirector::Redirector;
use crate::report::{Reporter, TracingReporter};

/// Parsed `entry` invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryRequest {
    pub name: String,
    pub args: Vec<String>,
    pub classpath: Option<String>,
    pub properties: Vec<String>,
}

impl EntryRequest {
    fn system_properties(&self) -> Result<BTreeMap<String, String>> {
        self.properties
            .iter()
            .map(|raw| match raw.split_once('=') {
                Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
                _ => Err(ExecError::config(format!(
                    "invalid property '{raw}' (expected name=value)"
                ))),
            })
            .collect()
    }

    fn classpath_entries(&self) -> Vec<PathBuf> {
        self.classpath
            .as_deref()
            .map(|cp| std::env::split_paths(cp).collect())
            .unwrap_or_default()
    }
}

/// Run a registered entry point in this process and return its exit code.
pub fn run_entry(request: &EntryRequest, registry: Arc<EntryPointRegistry>) -> Result<i32> {
    let mut builder = CommandSpec::builder()
        .entry_point(request.name.clone())
        .args(request.args.iter().cloned());
    for (k, v) in request.system_properties()? {
        builder = builder.property(k, v);
    }
    for path in request.classpath_entries() {
        builder = builder.classpath_entry(path);
    }
    let spec = builder.build()?;

    let reporter: Arc<dyn Reporter> = Arc::new(TracingReporter);
    let base_dir = std::env::current_dir()?;
    let mut redirector = Redirector::new(&RedirectionSpec::inherit(), &base_dir, reporter.clone());

    let invoker = SameRuntimeInvoker::new(registry, reporter);
    let run = invoker.invoke(&spec, &mut redirector)?;
    Ok(run.outcome.exit_code())
}
