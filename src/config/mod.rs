// src/config/mod.rs

//! Job configuration for execwatch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate it and turn each job into an [`crate::task::ExecTask`]
//!   (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_root_dir, default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigFile, DefaultSection, JobConfig, RawConfigFile};
pub use validate::TaskContext;
