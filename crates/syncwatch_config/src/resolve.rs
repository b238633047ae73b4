//! Resolution of a parsed configuration into a verifier run.

use crate::error::ConfigError;
use crate::loader::validate_config;
use crate::types::{ClockConfig, ModeSpec, SyncwatchConfig};
use std::path::PathBuf;
use syncwatch_common::{parse_duration, Frequency};
use syncwatch_sim::TimeUnit;
use syncwatch_verify::{ResetSpec, VerifyConfig, VideoMode};

/// A fully resolved run: the verifier configuration plus output settings.
#[derive(Debug, Clone)]
pub struct ResolvedRun {
    /// What to verify and how.
    pub verify: VerifyConfig,
    /// Where to dump the waveform, if anywhere.
    pub waveform: Option<PathBuf>,
    /// Timescale of the waveform dump.
    pub timescale: TimeUnit,
}

/// Looks up a built-in mode or builds and validates an inline one.
pub fn resolve_mode(spec: &ModeSpec) -> Result<VideoMode, ConfigError> {
    let mode = match spec {
        ModeSpec::Named(name) => {
            VideoMode::builtin(name).ok_or_else(|| ConfigError::UnknownMode(name.clone()))?
        }
        ModeSpec::Inline(inline) => {
            let pixel_clock = match &inline.pixel_clock {
                Some(text) => Some(
                    text.parse::<Frequency>()
                        .map_err(|e| ConfigError::ValidationError(format!("mode.pixel_clock: {e}")))?,
                ),
                None => None,
            };
            VideoMode {
                name: inline.name.clone(),
                pixel_clock,
                horizontal: inline.horizontal,
                vertical: inline.vertical,
            }
        }
    };
    mode.validate()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
    Ok(mode)
}

/// Picks the clock period: `period`, else `frequency`, else the mode's pixel clock.
pub fn resolve_clock_period(clock: &ClockConfig, mode: &VideoMode) -> Result<u64, ConfigError> {
    let period_fs = if let Some(text) = &clock.period {
        parse_duration(text).map_err(|e| ConfigError::ValidationError(format!("clock.period: {e}")))?
    } else if let Some(text) = &clock.frequency {
        let freq: Frequency = text
            .parse()
            .map_err(|e| ConfigError::ValidationError(format!("clock.frequency: {e}")))?;
        freq.period_fs().ok_or_else(|| {
            ConfigError::ValidationError(format!("clock.frequency: {freq} has no usable period"))
        })?
    } else {
        mode.pixel_clock
            .and_then(|f| f.period_fs())
            .ok_or_else(|| ConfigError::MissingField("clock.period".to_string()))?
    };

    // Both clock phases need at least one femtosecond.
    if period_fs < 2 {
        return Err(ConfigError::ValidationError(format!(
            "clock period of {period_fs} fs is too short"
        )));
    }
    Ok(period_fs)
}

/// Resolves the whole configuration into a [`ResolvedRun`].
///
/// Values are re-validated here since command-line overrides may have
/// changed them after loading.
pub fn resolve_run(config: &SyncwatchConfig) -> Result<ResolvedRun, ConfigError> {
    validate_config(config)?;
    let spec = config
        .mode
        .as_ref()
        .ok_or_else(|| ConfigError::MissingField("mode".to_string()))?;
    let mode = resolve_mode(spec)?;
    let clock_period_fs = resolve_clock_period(&config.clock, &mode)?;

    let watchdog_fs = match &config.run.watchdog {
        Some(text) => Some(
            parse_duration(text)
                .map_err(|e| ConfigError::ValidationError(format!("run.watchdog: {e}")))?,
        ),
        None => None,
    };

    let reset = ResetSpec {
        port: config.reset.enabled.then(|| config.reset.port.clone()),
        polarity: config.reset.active,
        cycles: config.reset.cycles,
    };

    let mut verify = VerifyConfig::new(mode, clock_period_fs);
    verify.clock_port = config.clock.port.clone();
    verify.reset = reset;
    verify.hsync = config.probes.hsync.clone();
    verify.vsync = config.probes.vsync.clone();
    verify.inputs = config
        .inputs
        .iter()
        .map(|(name, level)| (name.clone(), level.0))
        .collect();
    verify.frames = config.run.frames;
    verify.periodicity_frames = config.run.periodicity_frames;
    verify.bound_waits = config.run.bound_waits;
    verify.watchdog_fs = watchdog_fs;

    Ok(ResolvedRun {
        verify,
        waveform: config.waveform.path.clone(),
        timescale: config.waveform.timescale.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;
    use syncwatch_common::Logic;
    use syncwatch_verify::ResetPolarity;

    #[test]
    fn builtin_mode_uses_pixel_clock() {
        let config = load_config_from_str(r#"mode = "vga_640x480_60""#).unwrap();
        let run = resolve_run(&config).unwrap();
        // 1 / 25.175 MHz rounded to the nearest femtosecond.
        assert_eq!(run.verify.clock_period_fs, 39_721_946);
        assert_eq!(run.verify.mode.name, "vga_640x480_60");
        assert_eq!(run.verify.reset.port.as_deref(), Some("rst_n"));
        assert!(run.waveform.is_none());
    }

    #[test]
    fn explicit_period_wins() {
        let toml = "mode = \"vga_640x480_60\"\n[clock]\nperiod = \"39.722ns\"";
        let run = resolve_run(&load_config_from_str(toml).unwrap()).unwrap();
        assert_eq!(run.verify.clock_period_fs, 39_722_000);
    }

    #[test]
    fn frequency_converted_to_period() {
        let toml = "mode = \"svga_800x600_60\"\n[clock]\nfrequency = \"50MHz\"";
        let run = resolve_run(&load_config_from_str(toml).unwrap()).unwrap();
        assert_eq!(run.verify.clock_period_fs, 20_000_000);
    }

    #[test]
    fn too_short_period_rejected() {
        let toml = "mode = \"vga_640x480_60\"\n[clock]\nperiod = \"1fs\"";
        let err = resolve_run(&load_config_from_str(toml).unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn missing_mode() {
        let config = load_config_from_str("[clock]\nperiod = \"10ns\"").unwrap();
        let err = resolve_run(&config).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "mode"));
    }

    #[test]
    fn unknown_mode() {
        let config = load_config_from_str(r#"mode = "ntsc""#).unwrap();
        let err = resolve_run(&config).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownMode(ref m) if m == "ntsc"));
    }

    #[test]
    fn inline_mode_without_clock_needs_period() {
        let toml = r#"
[mode]
horizontal = { active = 8, front_porch = 2, sync = 3, back_porch = 3 }
vertical = { active = 6, front_porch = 1, sync = 2, back_porch = 2 }
"#;
        let err = resolve_run(&load_config_from_str(toml).unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "clock.period"));
    }

    #[test]
    fn invalid_inline_mode() {
        let toml = r#"
[clock]
period = "1ns"

[mode]
horizontal = { active = 8, front_porch = 2, sync = 0, back_porch = 3 }
vertical = { active = 6, front_porch = 1, sync = 2, back_porch = 2 }
"#;
        let err = resolve_run(&load_config_from_str(toml).unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn full_resolution() {
        let toml = r#"
[clock]
port = "clock"
period = "1ns"

[mode]
name = "tiny"
horizontal = { active = 8, front_porch = 2, sync = 3, back_porch = 3 }
vertical = { active = 6, front_porch = 1, sync = 2, back_porch = 2 }

[reset]
port = "rst"
active = "high"
cycles = 4

[inputs]
ena = 1

[run]
frames = 2
periodicity_frames = 0
watchdog = "2us"

[waveform]
path = "tiny.vcd"
timescale = "ps"
"#;
        let run = resolve_run(&load_config_from_str(toml).unwrap()).unwrap();
        let v = &run.verify;
        assert_eq!(v.clock_port, "clock");
        assert_eq!(v.clock_period_fs, 1_000_000);
        assert_eq!(v.mode.frame_cycles(), 176);
        assert_eq!(v.reset.port.as_deref(), Some("rst"));
        assert_eq!(v.reset.polarity, ResetPolarity::ActiveHigh);
        assert_eq!(v.reset.cycles, 4);
        assert_eq!(v.inputs, vec![("ena".to_string(), Logic::One)]);
        assert_eq!(v.frames, 2);
        assert_eq!(v.periodicity_frames, 0);
        assert_eq!(v.watchdog_fs, Some(2_000_000_000));
        assert_eq!(run.waveform, Some(PathBuf::from("tiny.vcd")));
        assert_eq!(run.timescale, TimeUnit::Ps);
    }

    #[test]
    fn disabled_reset_has_no_port() {
        let toml = "mode = \"vga_640x480_60\"\n[reset]\nenabled = false";
        let run = resolve_run(&load_config_from_str(toml).unwrap()).unwrap();
        assert_eq!(run.verify.reset.port, None);
        assert_eq!(run.verify.reset.cycles, 10);
    }

    #[test]
    fn bad_watchdog() {
        let toml = "mode = \"vga_640x480_60\"\n[run]\nwatchdog = \"soon\"";
        let err = resolve_run(&load_config_from_str(toml).unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }
}
