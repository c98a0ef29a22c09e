// src/command/redirect.rs

//! Stream redirection description.
//!
//! This is pure data; the runtime side lives in
//! [`crate::exec::redirector`].

use std::path::{Path, PathBuf};

use crate::errors::{ExecError, Result};

/// Source for the child's standard input.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InputSource {
    /// Forked children get an empty input; in-process callees read the
    /// host's stdin.
    #[default]
    None,
    File(PathBuf),
    Literal(String),
}

/// Destination for standard output or standard error.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputSink {
    /// Pass through to the host's own stream.
    #[default]
    Console,
    /// Write to a file, appending or truncating at open time.
    File { path: PathBuf, append: bool },
    /// Accumulate into a named output variable, published after completion.
    Capture(String),
}

impl OutputSink {
    fn resolved(&self, base_dir: &Path) -> OutputSink {
        match self {
            OutputSink::File { path, append } => OutputSink::File {
                path: resolve_path(base_dir, path),
                append: *append,
            },
            other => other.clone(),
        }
    }
}

/// Full redirection setup for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RedirectionSpec {
    input: InputSource,
    output: OutputSink,
    error: OutputSink,
    log_error: bool,
}

impl RedirectionSpec {
    /// Everything passes through to the console.
    pub fn inherit() -> Self {
        Self::default()
    }

    pub fn builder() -> RedirectionSpecBuilder {
        RedirectionSpecBuilder::default()
    }

    pub fn input(&self) -> &InputSource {
        &self.input
    }

    pub fn output(&self) -> &OutputSink {
        &self.output
    }

    /// Error sink as configured, before any merging with output.
    pub fn error(&self) -> &OutputSink {
        &self.error
    }

    /// Whether console-bound stderr is reported to the host log instead.
    pub fn log_error(&self) -> bool {
        self.log_error
    }

    /// Error sink actually used.
    ///
    /// When only stdout is redirected to a file and `log_error` is off,
    /// stderr follows it into the same file.
    pub fn effective_error(&self) -> OutputSink {
        match (&self.error, &self.output) {
            (OutputSink::Console, OutputSink::File { .. }) if !self.log_error => {
                self.output.clone()
            }
            _ => self.error.clone(),
        }
    }

    /// Copy with every relative file path anchored at `base_dir`.
    pub fn resolve_against(&self, base_dir: &Path) -> RedirectionSpec {
        let input = match &self.input {
            InputSource::File(path) => InputSource::File(resolve_path(base_dir, path)),
            other => other.clone(),
        };
        RedirectionSpec {
            input,
            output: self.output.resolved(base_dir),
            error: self.error.resolved(base_dir),
            log_error: self.log_error,
        }
    }
}

/// Builder mirroring the flat `{input|input_string, output|output_property,
/// error|error_property, append, log_error}` configuration surface.
#[derive(Debug, Clone, Default)]
pub struct RedirectionSpecBuilder {
    input: Option<PathBuf>,
    input_string: Option<String>,
    output: Option<PathBuf>,
    output_property: Option<String>,
    error: Option<PathBuf>,
    error_property: Option<String>,
    append: bool,
    log_error: bool,
}

impl RedirectionSpecBuilder {
    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.input = Some(path.into());
        self
    }

    pub fn input_string(mut self, s: impl Into<String>) -> Self {
        self.input_string = Some(s.into());
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn output_property(mut self, name: impl Into<String>) -> Self {
        self.output_property = Some(name.into());
        self
    }

    pub fn error(mut self, path: impl Into<PathBuf>) -> Self {
        self.error = Some(path.into());
        self
    }

    pub fn error_property(mut self, name: impl Into<String>) -> Self {
        self.error_property = Some(name.into());
        self
    }

    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    pub fn log_error(mut self, log_error: bool) -> Self {
        self.log_error = log_error;
        self
    }

    pub fn build(self) -> Result<RedirectionSpec> {
        let input = match (self.input, self.input_string) {
            (Some(_), Some(_)) => {
                return Err(ExecError::config(
                    "the input file and input string settings are mutually exclusive",
                ));
            }
            (Some(path), None) => InputSource::File(path),
            (None, Some(s)) => InputSource::Literal(s),
            (None, None) => InputSource::None,
        };

        let output = sink("output", self.output, self.output_property, self.append)?;
        let error = sink("error", self.error, self.error_property, self.append)?;

        Ok(RedirectionSpec {
            input,
            output,
            error,
            log_error: self.log_error,
        })
    }
}

fn sink(
    stream: &str,
    file: Option<PathBuf>,
    property: Option<String>,
    append: bool,
) -> Result<OutputSink> {
    match (file, property) {
        (Some(_), Some(_)) => Err(ExecError::config(format!(
            "{stream} cannot go to both a file and a property"
        ))),
        (Some(path), None) => Ok(OutputSink::File { path, append }),
        (None, Some(name)) if name.is_empty() => Err(ExecError::config(format!(
            "{stream} property name must not be empty"
        ))),
        (None, Some(name)) => Ok(OutputSink::Capture(name)),
        (None, None) => Ok(OutputSink::Console),
    }
}

pub(crate) fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
