// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! The split between [`ExecError::Configuration`] and the rest matters: a
//! configuration error means nothing was launched and is always fatal, while
//! execution errors go through the failure policy in [`crate::task`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    /// Invalid or contradictory invocation description.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Spawn failure, redirection I/O failure or a failing in-process callee.
    #[error("Execution error: {0}")]
    Execution(String),

    /// A failing exit code raised as fatal by the failure policy.
    #[error("process returned: {code}")]
    Failed { code: i32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExecError {
    pub fn config(msg: impl Into<String>) -> Self {
        ExecError::Configuration(msg.into())
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        ExecError::Execution(msg.into())
    }

    /// Configuration errors bypass the failure policy.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ExecError::Configuration(_))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ExecError>;
