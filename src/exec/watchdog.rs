// src/exec/watchdog.rs

//! Per-process timeout enforcement.
//!
//! A [`Watchdog`] is armed once a child process exists and then races the
//! child's exit against its deadline:
//!
//! ```text
//! Armed --child exits first--> Disarmed   (timer dropped, no kill)
//! Armed --deadline first-----> Expired    (process group killed, child reaped)
//! ```
//!
//! The loser of the race is a future inside `tokio::select!` and is dropped
//! as soon as the winner completes.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tokio::time::Instant;
use tracing::{debug, warn};

const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    Armed,
    Disarmed,
    Expired,
}

/// Timer owned by exactly one process handle.
#[derive(Debug)]
pub struct Watchdog {
    timeout: Duration,
    deadline: Instant,
    state: WatchdogState,
}

impl Watchdog {
    /// Arm with `timeout`, counting from now.
    pub fn arm(timeout: Duration) -> Self {
        let now = Instant::now();
        // Deadlines past what `Instant` can hold are as good as never.
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        Self {
            timeout,
            deadline,
            state: WatchdogState::Armed,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn state(&self) -> WatchdogState {
        self.state
    }

    pub fn expired(&self) -> bool {
        self.state == WatchdogState::Expired
    }

    /// Wait for `child` to exit, killing it if the deadline passes first.
    ///
    /// Returns the child's final status; after an expiry this is the status
    /// of the killed (and reaped) process.
    pub async fn supervise(&mut self, child: &mut Child) -> io::Result<ExitStatus> {
        let deadline = self.deadline;

        tokio::select! {
            // A child exiting right at the deadline counts as a normal exit.
            biased;

            status = child.wait() => {
                self.disarm();
                status
            }
            () = tokio::time::sleep_until(deadline) => {
                self.state = WatchdogState::Expired;
                warn!(
                    pid = child.id(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "watchdog expired; killing process"
                );
                kill_tree(child);
                child.wait().await
            }
        }
    }

    fn disarm(&mut self) {
        if self.state == WatchdogState::Armed {
            debug!("process finished before watchdog deadline; disarming");
            self.state = WatchdogState::Disarmed;
        }
    }
}

/// Best-effort kill of `child` and, on Unix, its whole process group.
///
/// Children are spawned as process-group leaders, so the group id equals
/// the child's pid.
pub fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: plain syscall; a stale pgid just yields ESRCH.
            let rc = unsafe { libc::kill(-(pid as libc::pid_t), libc::SIGKILL) };
            if rc != 0 {
                debug!(pid, error = %io::Error::last_os_error(), "process group kill failed");
            }
        }
    }

    if let Err(e) = child.start_kill() {
        // InvalidInput means the child was already reaped.
        if e.kind() != io::ErrorKind::InvalidInput {
            warn!(error = %e, "failed to kill child process");
        }
    }
}
