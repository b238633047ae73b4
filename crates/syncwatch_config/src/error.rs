//! Configuration errors.
//!
//! All of these are setup problems: they stop a run before the kernel
//! starts and never count as a timing failure.

/// Why a `syncwatch.toml` (plus command-line overrides) could not become a run.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// Not valid TOML, or a value of the wrong type.
    #[error("invalid configuration: {0}")]
    ParseError(String),

    /// `mode = "..."` names no built-in mode.
    #[error("unknown video mode '{0}'")]
    UnknownMode(String),

    /// A setting needed for this run was never given. Holds its dotted key.
    #[error("missing setting '{0}'")]
    MissingField(String),

    /// A setting is present but unusable (zero frames, clashing ports, ...).
    #[error("invalid setting: {0}")]
    ValidationError(String),
}
