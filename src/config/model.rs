// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [default]
/// fork = true
/// fail_on_error = true
/// timeout = "30s"
///
/// [job.greet]
/// entry_point = "Echo"
/// args = ["hi"]
/// output = "greet.txt"
///
/// [job.tool]
/// artifact = "bin/tool"
/// env = { MODE = "ci" }
/// result_property = "tool.rc"
/// fail_on_error = false
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    /// Defaults from `[default]`.
    #[serde(default)]
    pub default: DefaultSection,

    /// All jobs from `[job.<name>]`, keyed by name.
    #[serde(default)]
    pub job: BTreeMap<String, JobConfig>,
}

/// Validated configuration; see [`super::validate`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub default: DefaultSection,
    pub job: BTreeMap<String, JobConfig>,
}

impl ConfigFile {
    /// Skip validation; only for callers that already validated.
    pub fn new_unchecked(default: DefaultSection, job: BTreeMap<String, JobConfig>) -> Self {
        Self { default, job }
    }
}

/// `[default]` section. Every field can be overridden per job.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct DefaultSection {
    #[serde(default)]
    pub fork: Option<bool>,

    #[serde(default)]
    pub fail_on_error: Option<bool>,

    /// Duration string such as `"250ms"` or `"3s"`.
    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default)]
    pub launcher: Option<Vec<String>>,
}

/// `[job.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    /// Program (plus leading arguments) used to start artifacts and forked
    /// entry points.
    #[serde(default)]
    pub launcher: Option<Vec<String>>,

    /// Artifact to execute. Excludes `entry_point`; needs `fork = true`.
    #[serde(default)]
    pub artifact: Option<PathBuf>,

    /// Named entry point to run.
    #[serde(default)]
    pub entry_point: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for forked runs; relative to the config file.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    #[serde(default)]
    pub fork: Option<bool>,

    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// If true the child sees only `env`.
    #[serde(default)]
    pub new_environment: bool,

    #[serde(default)]
    pub classpath: Vec<PathBuf>,

    /// System properties.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,

    #[serde(default)]
    pub input: Option<PathBuf>,

    #[serde(default)]
    pub input_string: Option<String>,

    #[serde(default)]
    pub output: Option<PathBuf>,

    #[serde(default)]
    pub output_property: Option<String>,

    #[serde(default)]
    pub error: Option<PathBuf>,

    #[serde(default)]
    pub error_property: Option<String>,

    #[serde(default)]
    pub append: bool,

    #[serde(default)]
    pub log_error: bool,

    #[serde(default)]
    pub fail_on_error: Option<bool>,

    #[serde(default)]
    pub result_property: Option<String>,
}

impl JobConfig {
    /// `fork`, falling back to `[default]`, then `false`.
    pub fn effective_fork(&self, defaults: &DefaultSection) -> bool {
        self.fork.or(defaults.fork).unwrap_or(false)
    }

    /// `fail_on_error`, falling back to `[default]`, then `false`.
    pub fn effective_fail_on_error(&self, defaults: &DefaultSection) -> bool {
        self.fail_on_error.or(defaults.fail_on_error).unwrap_or(false)
    }

    pub fn effective_timeout<'a>(&'a self, defaults: &'a DefaultSection) -> Option<&'a str> {
        self.timeout.as_deref().or(defaults.timeout.as_deref())
    }

    pub fn effective_launcher<'a>(&'a self, defaults: &'a DefaultSection) -> Option<&'a [String]> {
        self.launcher.as_deref().or(defaults.launcher.as_deref())
    }
}
