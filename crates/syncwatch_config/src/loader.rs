//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::SyncwatchConfig;
use std::path::Path;

/// File name looked up in a run directory.
pub const CONFIG_FILE_NAME: &str = "syncwatch.toml";

/// Loads and validates `syncwatch.toml` from a directory.
pub fn load_config(dir: &Path) -> Result<SyncwatchConfig, ConfigError> {
    load_config_file(&dir.join(CONFIG_FILE_NAME))
}

/// Loads and validates a configuration file at an explicit path.
pub fn load_config_file(path: &Path) -> Result<SyncwatchConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `syncwatch.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<SyncwatchConfig, ConfigError> {
    let config: SyncwatchConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks the values that do not depend on the video mode.
///
/// Mode-dependent checks happen during resolution, after command-line
/// overrides have been applied.
pub(crate) fn validate_config(config: &SyncwatchConfig) -> Result<(), ConfigError> {
    if config.clock.port.is_empty() {
        return Err(ConfigError::MissingField("clock.port".to_string()));
    }
    if config.clock.period.is_some() && config.clock.frequency.is_some() {
        return Err(ConfigError::ValidationError(
            "clock.period and clock.frequency are mutually exclusive".to_string(),
        ));
    }
    if config.probes.hsync.is_empty() {
        return Err(ConfigError::MissingField("probes.hsync".to_string()));
    }
    if config.probes.vsync.is_empty() {
        return Err(ConfigError::MissingField("probes.vsync".to_string()));
    }
    if config.probes.hsync == config.probes.vsync {
        return Err(ConfigError::ValidationError(format!(
            "hsync and vsync are both probed on '{}'",
            config.probes.hsync
        )));
    }
    if config.reset.enabled && config.reset.port.is_empty() {
        return Err(ConfigError::MissingField("reset.port".to_string()));
    }
    if config.run.frames == 0 {
        return Err(ConfigError::ValidationError(
            "run.frames must be at least 1".to_string(),
        ));
    }

    let mut ports = vec![
        config.clock.port.as_str(),
        config.probes.hsync.as_str(),
        config.probes.vsync.as_str(),
    ];
    if config.reset.enabled {
        ports.push(config.reset.port.as_str());
    }
    for name in config.inputs.keys() {
        if ports.contains(&name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "input '{name}' is already used as a clock, reset, or probe port"
            )));
        }
    }
    Ok(())
}
