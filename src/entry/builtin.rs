// src/entry/builtin.rs

//! Entry points shipped with execwatch.
//!
//! Small, predictable programs: enough to drive every feature of the
//! launcher (exit codes, streams, environment, properties, timeouts) from
//! configuration files and tests without external tooling.

use std::io;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};

use crate::exec::in_process::{EntryPointRegistry, InvocationContext};
use crate::exec::result::InvocationOutcome;

pub fn register_all(registry: &mut EntryPointRegistry) {
    registry.register("Echo", echo);
    registry.register("EchoErr", echo_err);
    registry.register("Cat", cat);
    registry.register("Exit", exit);
    registry.register("Sleep", sleep);
    registry.register("Pwd", pwd);
    registry.register("PrintEnv", print_env);
    registry.register("PrintProperty", print_property);
    registry.register("Fail", fail);
}

/// Arguments joined by spaces, newline-terminated, on stdout.
pub fn echo(ctx: &mut InvocationContext<'_>) -> Result<InvocationOutcome> {
    let line = ctx.args().join(" ");
    writeln!(ctx.stdout, "{line}")?;
    Ok(InvocationOutcome::Completed)
}

/// Like [`echo`] but on stderr.
pub fn echo_err(ctx: &mut InvocationContext<'_>) -> Result<InvocationOutcome> {
    let line = ctx.args().join(" ");
    writeln!(ctx.stderr, "{line}")?;
    Ok(InvocationOutcome::Completed)
}

/// Copy stdin to stdout.
pub fn cat(ctx: &mut InvocationContext<'_>) -> Result<InvocationOutcome> {
    io::copy(&mut *ctx.stdin, &mut *ctx.stdout).context("copying stdin to stdout")?;
    Ok(InvocationOutcome::Completed)
}

/// Request exit with the code in the first argument (default 0).
pub fn exit(ctx: &mut InvocationContext<'_>) -> Result<InvocationOutcome> {
    let code = match ctx.arg(0) {
        None => 0,
        Some(raw) => raw
            .parse::<i32>()
            .with_context(|| format!("invalid exit code '{raw}'"))?,
    };
    Ok(InvocationOutcome::RequestedExit(code))
}

/// Sleep for the number of milliseconds in the first argument.
pub fn sleep(ctx: &mut InvocationContext<'_>) -> Result<InvocationOutcome> {
    let raw = ctx.arg(0).ok_or_else(|| anyhow!("Sleep needs a duration in ms"))?;
    let ms: u64 = raw
        .parse()
        .with_context(|| format!("invalid sleep duration '{raw}'"))?;
    std::thread::sleep(Duration::from_millis(ms));
    Ok(InvocationOutcome::Completed)
}

/// Current directory on stdout.
pub fn pwd(ctx: &mut InvocationContext<'_>) -> Result<InvocationOutcome> {
    let dir = std::env::current_dir().context("reading current directory")?;
    writeln!(ctx.stdout, "{}", dir.display())?;
    Ok(InvocationOutcome::Completed)
}

/// Value of the environment variable named by the first argument, or an
/// empty line.
pub fn print_env(ctx: &mut InvocationContext<'_>) -> Result<InvocationOutcome> {
    let name = ctx.arg(0).ok_or_else(|| anyhow!("PrintEnv needs a variable name"))?;
    let value = std::env::var(name).unwrap_or_default();
    writeln!(ctx.stdout, "{value}")?;
    Ok(InvocationOutcome::Completed)
}

/// Value of the system property named by the first argument, or an empty
/// line.
pub fn print_property(ctx: &mut InvocationContext<'_>) -> Result<InvocationOutcome> {
    let name = ctx
        .arg(0)
        .ok_or_else(|| anyhow!("PrintProperty needs a property name"))?
        .to_string();
    let value = ctx.property(&name).unwrap_or_default();
    writeln!(ctx.stdout, "{value}")?;
    Ok(InvocationOutcome::Completed)
}

/// Always fails, with the arguments as the message.
pub fn fail(ctx: &mut InvocationContext<'_>) -> Result<InvocationOutcome> {
    if ctx.args().is_empty() {
        bail!("Fail was invoked");
    }
    bail!("{}", ctx.args().join(" "))
}
