use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Where a unit of work runs.
///
/// - `Forked`: a separate OS process; timeout, working directory and
///   environment settings all apply.
/// - `SameRuntime`: the named entry point is called on the current thread;
///   only system properties and stream redirection apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    Forked,
    #[default]
    SameRuntime,
}

impl ExecMode {
    pub fn from_fork(fork: bool) -> Self {
        if fork {
            ExecMode::Forked
        } else {
            ExecMode::SameRuntime
        }
    }

    pub fn is_forked(self) -> bool {
        matches!(self, ExecMode::Forked)
    }
}

/// Severity of a message handed to a [`crate::report::Reporter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warn,
    Info,
    Verbose,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Error => "error",
            Severity::Warn => "warn",
            Severity::Info => "info",
            Severity::Verbose => "verbose",
        };
        f.write_str(s)
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(Severity::Error),
            "warn" | "warning" => Ok(Severity::Warn),
            "info" => Ok(Severity::Info),
            "verbose" | "debug" => Ok(Severity::Verbose),
            other => Err(format!(
                "invalid severity: {other} (expected error, warn, info or verbose)"
            )),
        }
    }
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
///
/// A bare number is read as milliseconds, which is the granularity the
/// timeout setting is documented in.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .unwrap_or(s.len());

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "" | "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration too large: '{s}'"))
}
