//! Shared helpers for the `run` and `replay` commands.
//!
//! Covers configuration discovery, applying command-line overrides,
//! opening the waveform dump, and printing the outcome of a run.

use std::error::Error;
use std::path::Path;

use syncwatch_config::{ConfigError, ModeSpec, ResolvedRun, SyncwatchConfig, CONFIG_FILE_NAME};
use syncwatch_sim::WaveformRecorder;
use syncwatch_verify::{RunReport, VerifyConfig, VerifyError};
use tracing::{info, warn};

use crate::{GlobalArgs, ReportFormat, RunOverrides};

/// Loads the run configuration.
///
/// Uses `--config` if given, else `syncwatch.toml` in the working
/// directory if present, else defaults (the mode must then come from
/// `--mode`).
pub fn load_run_config(global: &GlobalArgs) -> Result<SyncwatchConfig, ConfigError> {
    if let Some(path) = &global.config {
        info!(path = %path.display(), "Loading configuration");
        return syncwatch_config::load_config_file(path);
    }
    let cwd = std::env::current_dir()?;
    if cwd.join(CONFIG_FILE_NAME).is_file() {
        info!(path = %cwd.join(CONFIG_FILE_NAME).display(), "Loading configuration");
        return syncwatch_config::load_config(&cwd);
    }
    Ok(SyncwatchConfig::default())
}

impl RunOverrides {
    /// Writes every flag that was given over the file configuration.
    pub fn apply(&self, config: &mut SyncwatchConfig) {
        if let Some(mode) = &self.mode {
            config.mode = Some(ModeSpec::Named(mode.clone()));
        }
        if let Some(period) = &self.period {
            config.clock.period = Some(period.clone());
            config.clock.frequency = None;
        }
        if let Some(frequency) = &self.frequency {
            config.clock.frequency = Some(frequency.clone());
            config.clock.period = None;
        }
        if let Some(hsync) = &self.hsync {
            config.probes.hsync = hsync.clone();
        }
        if let Some(vsync) = &self.vsync {
            config.probes.vsync = vsync.clone();
        }
        if let Some(frames) = self.frames {
            config.run.frames = frames;
        }
        if let Some(periods) = self.periodicity_frames {
            config.run.periodicity_frames = periods;
        }
        if self.bound_waits {
            config.run.bound_waits = true;
        }
        if let Some(watchdog) = &self.watchdog {
            config.run.watchdog = Some(watchdog.clone());
        }
    }
}

/// Opens the waveform dump for `run`, creating parent directories.
pub fn waveform_recorder(
    run: &ResolvedRun,
) -> Result<Option<Box<dyn WaveformRecorder>>, Box<dyn Error>> {
    let Some(path) = &run.waveform else {
        return Ok(None);
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    info!(path = %path.display(), timescale = %run.timescale, "Recording waveform");
    Ok(Some(syncwatch_sim::vcd_file_recorder(path, run.timescale)?))
}

/// Prints the outcome of a run and returns the process exit code.
///
/// A timing failure is a normal outcome (exit code 1). Setup errors such
/// as an unknown port are returned as errors. `quiet` drops the text report
/// of a passing run; JSON is always printed.
pub fn report_outcome(
    config: &VerifyConfig,
    result: Result<RunReport, VerifyError>,
    format: ReportFormat,
    quiet: bool,
) -> Result<i32, Box<dyn Error>> {
    match result {
        Ok(report) => {
            match format {
                ReportFormat::Text if quiet => {}
                ReportFormat::Text => println!("{report}"),
                ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
            Ok(0)
        }
        Err(err) if err.is_timing_failure() => {
            warn!(mode = %config.mode.name, "Timing check failed");
            match format {
                ReportFormat::Text => println!("{}: FAIL\n  {err}", config.mode.name),
                ReportFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&failure_json(config, &err))?
                ),
            }
            Ok(1)
        }
        Err(err) => Err(err.into()),
    }
}

fn failure_json(config: &VerifyConfig, err: &VerifyError) -> serde_json::Value {
    serde_json::json!({
        "mode": config.mode.name,
        "clock_period_fs": config.clock_period_fs,
        "passed": false,
        "interval": err.interval(),
        "signal": err.signal(),
        "expected": err.expected(),
        "observed": err.observed(),
        "error": err.to_string(),
    })
}

/// Display form of a path for log fields and design names.
pub fn path_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use syncwatch_config::resolve_run;
    use syncwatch_sim::{Edge, SimError, SimTime};
    use syncwatch_verify::{Interval, VideoMode};

    fn vga_config() -> VerifyConfig {
        VerifyConfig::new(VideoMode::builtin("vga_640x480_60").unwrap(), 39_722_000)
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config =
            syncwatch_config::load_config_from_str("mode = \"vga_640x480_60\"\n[clock]\nfrequency = \"25MHz\"")
                .unwrap();
        let overrides = RunOverrides {
            mode: Some("svga_800x600_60".into()),
            period: Some("25ns".into()),
            frames: Some(3),
            bound_waits: true,
            ..RunOverrides::default()
        };
        overrides.apply(&mut config);

        let run = resolve_run(&config).unwrap();
        assert_eq!(run.verify.mode.name, "svga_800x600_60");
        assert_eq!(run.verify.clock_period_fs, 25_000_000);
        assert_eq!(run.verify.frames, 3);
        assert!(run.verify.bound_waits);
    }

    #[test]
    fn no_overrides_keep_file_values() {
        let mut config = syncwatch_config::load_config_from_str("[run]\nframes = 4").unwrap();
        RunOverrides::default().apply(&mut config);
        assert_eq!(config.run.frames, 4);
        assert!(config.mode.is_none());
    }

    #[test]
    fn explicit_config_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ci.toml");
        std::fs::write(&path, "mode = \"xga_1024x768_60\"\n").unwrap();
        let global = GlobalArgs {
            quiet: true,
            config: Some(path),
        };
        let config = load_run_config(&global).unwrap();
        assert!(matches!(config.mode, Some(ModeSpec::Named(ref n)) if n == "xga_1024x768_60"));
    }

    #[test]
    fn missing_config_path_errors() {
        let global = GlobalArgs {
            quiet: true,
            config: Some(PathBuf::from("/nonexistent/syncwatch.toml")),
        };
        assert!(matches!(load_run_config(&global), Err(ConfigError::IoError(_))));
    }

    #[test]
    fn timing_failure_exits_one() {
        let err = VerifyError::TimingMismatch {
            interval: Interval::HsyncPulse,
            signal: "hsync".into(),
            edge: Edge::Rising,
            expected: 96,
            observed: 95.0,
            value: syncwatch_common::Logic::One,
            time: SimTime::zero(),
        };
        let code = report_outcome(&vga_config(), Err(err), ReportFormat::Text, true).unwrap();
        assert_eq!(code, 1);
    }

    #[test]
    fn setup_error_is_an_error() {
        let err = VerifyError::Sim(SimError::UnknownSignal { name: "vs".into() });
        assert!(report_outcome(&vga_config(), Err(err), ReportFormat::Json, false).is_err());
    }

    #[test]
    fn failure_json_names_interval() {
        let err = VerifyError::EdgeMissing {
            interval: Interval::VsyncPulse,
            signal: "vsync".into(),
            edge: Edge::Rising,
            expected: 1600,
            time: SimTime::zero(),
        };
        let json = failure_json(&vga_config(), &err);
        assert_eq!(json["passed"], false);
        assert_eq!(json["interval"], "vsync_pulse");
        assert_eq!(json["mode"], "vga_640x480_60");
        assert_eq!(json["signal"], "vsync");
        assert_eq!(json["expected"], 1600);
        assert!(json["observed"].is_null());
    }

    #[test]
    fn failure_json_carries_measured_cycles() {
        let err = VerifyError::TimingMismatch {
            interval: Interval::HsyncPulse,
            signal: "hsync".into(),
            edge: Edge::Rising,
            expected: 96,
            observed: 95.0,
            value: syncwatch_common::Logic::One,
            time: SimTime::from_fs(0),
        };
        let json = failure_json(&vga_config(), &err);
        assert_eq!(json["interval"], "hsync_pulse");
        assert_eq!(json["signal"], "hsync");
        assert_eq!(json["expected"], 96);
        assert_eq!(json["observed"], 95.0);

        let setup = VerifyError::Sim(SimError::UnknownSignal { name: "vs".into() });
        let json = failure_json(&vga_config(), &setup);
        assert!(json["signal"].is_null());
        assert!(json["expected"].is_null());
    }

    #[test]
    fn waveform_parent_directories_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/nested/run.vcd");
        let config = syncwatch_config::load_config_from_str(&format!(
            "mode = \"vga_640x480_60\"\n[waveform]\npath = {:?}",
            path.display().to_string()
        ))
        .unwrap();
        let run = resolve_run(&config).unwrap();
        assert!(waveform_recorder(&run).unwrap().is_some());
        assert!(path.exists());
    }

    #[test]
    fn path_labels() {
        assert_eq!(path_label(Path::new("/tmp/dumps/tb.vcd")), "tb.vcd");
    }
}
