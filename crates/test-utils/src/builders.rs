#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use execwatch::config::{ConfigFile, DefaultSection, JobConfig, RawConfigFile};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                default: DefaultSection::default(),
                job: BTreeMap::new(),
            },
        }
    }

    pub fn with_job(mut self, name: &str, job: JobConfig) -> Self {
        self.config.job.insert(name.to_string(), job);
        self
    }

    pub fn default_fork(mut self, fork: bool) -> Self {
        self.config.default.fork = Some(fork);
        self
    }

    pub fn default_fail_on_error(mut self, fail: bool) -> Self {
        self.config.default.fail_on_error = Some(fail);
        self
    }

    pub fn default_timeout(mut self, timeout: &str) -> Self {
        self.config.default.timeout = Some(timeout.to_string());
        self
    }

    pub fn default_launcher(mut self, launcher: &[&str]) -> Self {
        self.config.default.launcher = Some(launcher.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `JobConfig`.
pub struct JobConfigBuilder {
    job: JobConfig,
}

impl JobConfigBuilder {
    pub fn entry_point(name: &str) -> Self {
        Self {
            job: JobConfig {
                entry_point: Some(name.to_string()),
                ..JobConfig::default()
            },
        }
    }

    pub fn artifact(path: &str) -> Self {
        Self {
            job: JobConfig {
                artifact: Some(PathBuf::from(path)),
                fork: Some(true),
                ..JobConfig::default()
            },
        }
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.job.args.push(arg.to_string());
        self
    }

    pub fn fork(mut self, fork: bool) -> Self {
        self.job.fork = Some(fork);
        self
    }

    pub fn launcher(mut self, launcher: &[&str]) -> Self {
        self.job.launcher = Some(launcher.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn timeout(mut self, timeout: &str) -> Self {
        self.job.timeout = Some(timeout.to_string());
        self
    }

    pub fn env(mut self, name: &str, value: &str) -> Self {
        self.job.env.insert(name.to_string(), value.to_string());
        self
    }

    pub fn output(mut self, path: &str) -> Self {
        self.job.output = Some(PathBuf::from(path));
        self
    }

    pub fn output_property(mut self, name: &str) -> Self {
        self.job.output_property = Some(name.to_string());
        self
    }

    pub fn input_string(mut self, s: &str) -> Self {
        self.job.input_string = Some(s.to_string());
        self
    }

    pub fn append(mut self, append: bool) -> Self {
        self.job.append = append;
        self
    }

    pub fn fail_on_error(mut self, fail: bool) -> Self {
        self.job.fail_on_error = Some(fail);
        self
    }

    pub fn result_property(mut self, name: &str) -> Self {
        self.job.result_property = Some(name.to_string());
        self
    }

    pub fn build(self) -> JobConfig {
        self.job
    }
}
