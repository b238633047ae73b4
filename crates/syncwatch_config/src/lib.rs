//! Parsing and validation of `syncwatch.toml` run configuration files.
//!
//! This crate reads the run configuration and produces a strongly-typed
//! [`SyncwatchConfig`], then resolves it into the [`VerifyConfig`] the
//! verifier consumes: a video mode, a clock period, ports and run limits.
//!
//! [`VerifyConfig`]: syncwatch_verify::VerifyConfig

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_file, load_config_from_str, CONFIG_FILE_NAME};
pub use resolve::{resolve_clock_period, resolve_mode, resolve_run, ResolvedRun};
pub use types::*;
