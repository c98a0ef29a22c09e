// src/lib.rs

pub mod cli;
pub mod command;
pub mod config;
pub mod entry;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod report;
pub mod task;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::{CliArgs, CliCommand, EntryArgs, RunArgs};
use crate::config::{ConfigFile, TaskContext, config_root_dir, load_and_validate};
use crate::entry::{EntryRequest, run_entry};
use crate::exec::EntryPointRegistry;
use crate::report::{MemoryStore, TracingReporter};

/// High-level entry point used by `main.rs`. Returns the process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    match args.command {
        CliCommand::Run(run_args) => run_jobs(run_args).await,
        CliCommand::Entry(entry_args) => run_entry_point(entry_args),
    }
}

/// Run the jobs of a config file in name order, stopping at the first fatal
/// error.
///
/// Published output variables are printed as `name=value` lines once all
/// jobs have finished.
async fn run_jobs(args: RunArgs) -> Result<i32> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(0);
    }

    let store = MemoryStore::new();
    let ctx = TaskContext {
        base_dir: config_root_dir(&config_path),
        reporter: Arc::new(TracingReporter),
        store: Arc::new(store.clone()),
        registry: Arc::new(EntryPointRegistry::with_builtins()),
    };

    let tasks = match &args.job {
        Some(name) => vec![cfg.task(name, &ctx)?],
        None => cfg.tasks(&ctx)?,
    };
    info!(jobs = tasks.len(), base_dir = %ctx.base_dir.display(), "running jobs");

    for task in &tasks {
        let report = task.execute().await?;
        debug!(job = task.name(), exit_code = report.exit_code, "job done");
    }

    for (name, value) in store.snapshot() {
        println!("{name}={value}");
    }

    Ok(0)
}

fn run_entry_point(args: EntryArgs) -> Result<i32> {
    let request = EntryRequest {
        name: args.name,
        args: args.args,
        classpath: args.classpath,
        properties: args.property,
    };
    let code = run_entry(&request, Arc::new(EntryPointRegistry::with_builtins()))?;
    Ok(code)
}

/// Simple dry-run output: print jobs and how they would run.
fn print_dry_run(cfg: &ConfigFile) {
    println!("execwatch dry-run");
    println!();

    println!("jobs ({}):", cfg.job.len());
    for (name, job) in cfg.job.iter() {
        println!("  - {name}");
        if let Some(ref entry) = job.entry_point {
            println!("      entry_point: {entry}");
        }
        if let Some(ref artifact) = job.artifact {
            println!("      artifact: {}", artifact.display());
        }
        if !job.args.is_empty() {
            println!("      args: {:?}", job.args);
        }
        println!("      fork: {}", job.effective_fork(&cfg.default));
        if let Some(timeout) = job.effective_timeout(&cfg.default) {
            println!("      timeout: {timeout}");
        }
        if let Some(ref dir) = job.dir {
            println!("      dir: {}", dir.display());
        }
        if !job.env.is_empty() {
            println!("      env: {:?}", job.env);
        }
        println!(
            "      fail_on_error: {}",
            job.effective_fail_on_error(&cfg.default)
        );
        if let Some(ref prop) = job.result_property {
            println!("      result_property: {prop}");
        }
    }

    debug!("dry-run complete (no execution)");
}
