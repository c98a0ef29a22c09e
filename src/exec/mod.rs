// src/exec/mod.rs

//! Execution layer.
//!
//! - [`launcher`] spawns forked processes with `tokio::process::Command` and
//!   supervises them until exit and full stream drain.
//! - [`watchdog`] races a forked child against its timeout and kills the
//!   process group on expiry.
//! - [`redirector`] binds the standard streams to files, literal input,
//!   captured variables or the console, in both modes.
//! - [`in_process`] runs named entry points on the calling thread.
//! - [`properties`] holds the process-wide system properties that
//!   same-runtime calls overlay.
//! - [`result`] defines the normalized completion values.

pub mod in_process;
pub mod launcher;
pub mod properties;
pub mod redirector;
pub mod result;
pub mod watchdog;

pub use in_process::{EntryPoint, EntryPointRegistry, InvocationContext, SameRuntimeInvoker};
pub use launcher::{ProcessHandle, ProcessLauncher};
pub use redirector::{CapturedOutput, Redirector};
pub use result::{ExecutionResult, InvocationOutcome};
pub use watchdog::{Watchdog, WatchdogState};
