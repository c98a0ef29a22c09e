// src/exec/result.rs

//! Normalized completion values.

use std::process::ExitStatus;

/// Exit code reported when the OS gives none (the child died from a signal,
/// usually our own kill).
pub const KILLED_EXIT_CODE: i32 = -1;

/// Outcome of one invocation. Produced once, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub timed_out: bool,
    pub killed: bool,
}

impl ExecutionResult {
    pub fn exited(exit_code: i32) -> Self {
        Self {
            exit_code,
            timed_out: false,
            killed: false,
        }
    }

    /// Result of a watchdog kill; `exit_code` is whatever the OS reported.
    pub fn timed_out(exit_code: i32) -> Self {
        Self {
            exit_code,
            timed_out: true,
            killed: true,
        }
    }

    pub fn from_status(status: ExitStatus, timed_out: bool) -> Self {
        let code = status.code().unwrap_or(KILLED_EXIT_CODE);
        if timed_out {
            Self::timed_out(code)
        } else {
            Self::exited(code)
        }
    }

    pub fn is_failure(&self) -> bool {
        is_failure(self.exit_code)
    }
}

/// What an in-process entry point hands back instead of terminating the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// Returned normally; exit code 0.
    Completed,
    /// Asked for the process to exit with this status.
    RequestedExit(i32),
}

impl InvocationOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            InvocationOutcome::Completed => 0,
            InvocationOutcome::RequestedExit(code) => *code,
        }
    }

    pub fn is_failure(&self) -> bool {
        match self {
            InvocationOutcome::Completed => false,
            InvocationOutcome::RequestedExit(code) => *code != 0,
        }
    }
}

impl From<InvocationOutcome> for ExecutionResult {
    fn from(outcome: InvocationOutcome) -> Self {
        ExecutionResult::exited(outcome.exit_code())
    }
}

/// OS convention: anything but zero is a failure, including the
/// [`KILLED_EXIT_CODE`] sentinel.
pub fn is_failure(exit_code: i32) -> bool {
    exit_code != 0
}
