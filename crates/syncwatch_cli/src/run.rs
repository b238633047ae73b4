//! `syncwatch run`: verify the reference sync generator.
//!
//! The generator produces the expected mode unless `--dut-*` flags change
//! it, which is how a known-bad design is simulated.

use std::error::Error;

use syncwatch_config::{resolve_mode, resolve_run, ConfigError, ModeSpec};
use syncwatch_verify::{verify, SyncGenerator, VideoMode};
use tracing::info;

use crate::pipeline::{load_run_config, report_outcome, waveform_recorder};
use crate::{DutArgs, GlobalArgs, RunArgs};

/// Runs the `syncwatch run` command.
///
/// Returns exit code 0 if every checkpoint passed, 1 on a timing failure.
pub fn run(args: &RunArgs, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let mut config = load_run_config(global)?;
    args.overrides.apply(&mut config);
    if let Some(path) = &args.waveform {
        config.waveform.path = Some(path.clone());
    }
    let run = resolve_run(&config)?;

    let dut_mode = dut_mode(&run.verify.mode, &args.dut)?;
    if dut_mode != run.verify.mode {
        info!(expected = %run.verify.mode.name, generated = %dut_mode.name, "Injecting timing fault");
    }
    let reset = run
        .verify
        .reset
        .port
        .clone()
        .map(|port| (port, run.verify.reset.polarity));
    let generator = SyncGenerator::new(dut_mode)
        .with_ports(&run.verify.hsync, &run.verify.vsync)
        .with_reset(reset);

    let recorder = waveform_recorder(&run)?;
    let result = verify(&run.verify, Box::new(generator), recorder);
    report_outcome(&run.verify, result, args.overrides.format, global.quiet)
}

/// The mode the generator produces: `--dut-mode` or the expected mode,
/// with any single-interval overrides applied.
pub fn dut_mode(expected: &VideoMode, dut: &DutArgs) -> Result<VideoMode, ConfigError> {
    let mut mode = match &dut.dut_mode {
        Some(name) => resolve_mode(&ModeSpec::Named(name.clone()))?,
        None => expected.clone(),
    };

    let overrides = [
        (dut.dut_h_front, &mut mode.horizontal.front_porch),
        (dut.dut_h_sync, &mut mode.horizontal.sync),
        (dut.dut_h_back, &mut mode.horizontal.back_porch),
        (dut.dut_v_front, &mut mode.vertical.front_porch),
        (dut.dut_v_sync, &mut mode.vertical.sync),
        (dut.dut_v_back, &mut mode.vertical.back_porch),
    ];
    let mut changed = false;
    for (value, field) in overrides {
        if let Some(value) = value {
            *field = value;
            changed = true;
        }
    }
    if changed {
        mode.name = format!("{} (modified)", mode.name);
    }

    // The generator divides by the frame length, so it must be sound too.
    mode.validate()
        .map_err(|e| ConfigError::ValidationError(format!("generated mode: {e}")))?;
    Ok(mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ReportFormat, RunOverrides};
    use std::path::PathBuf;

    fn vga() -> VideoMode {
        VideoMode::builtin("vga_640x480_60").unwrap()
    }

    #[test]
    fn no_fault_keeps_expected_mode() {
        assert_eq!(dut_mode(&vga(), &DutArgs::default()).unwrap(), vga());
    }

    #[test]
    fn single_interval_override() {
        let dut = DutArgs {
            dut_h_sync: Some(95),
            ..DutArgs::default()
        };
        let mode = dut_mode(&vga(), &dut).unwrap();
        assert_eq!(mode.horizontal.sync, 95);
        assert_eq!(mode.horizontal.back_porch, 48);
        assert_eq!(mode.name, "vga_640x480_60 (modified)");
    }

    #[test]
    fn other_builtin_as_dut() {
        let dut = DutArgs {
            dut_mode: Some("svga_800x600_60".into()),
            ..DutArgs::default()
        };
        assert_eq!(dut_mode(&vga(), &dut).unwrap().name, "svga_800x600_60");
    }

    #[test]
    fn unsound_dut_rejected() {
        let dut = DutArgs {
            dut_v_sync: Some(0),
            ..DutArgs::default()
        };
        assert!(matches!(
            dut_mode(&vga(), &dut),
            Err(ConfigError::ValidationError(_))
        ));
    }

    fn tiny_config(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("syncwatch.toml");
        std::fs::write(
            &path,
            r#"
[clock]
period = "1ns"

[mode]
name = "tiny"
horizontal = { active = 8, front_porch = 2, sync = 3, back_porch = 3 }
vertical = { active = 6, front_porch = 1, sync = 2, back_porch = 2 }
"#,
        )
        .unwrap();
        path
    }

    fn run_args(dut: DutArgs, waveform: Option<PathBuf>) -> RunArgs {
        RunArgs {
            overrides: RunOverrides {
                format: ReportFormat::Json,
                ..RunOverrides::default()
            },
            waveform,
            dut,
        }
    }

    #[test]
    fn passing_run_exits_zero() {
        let dir = tempfile::tempdir().unwrap();
        let global = GlobalArgs {
            quiet: true,
            config: Some(tiny_config(dir.path())),
        };
        let waveform = dir.path().join("tiny.vcd");
        let code = run(&run_args(DutArgs::default(), Some(waveform.clone())), &global).unwrap();
        assert_eq!(code, 0);
        let dump = std::fs::read_to_string(&waveform).unwrap();
        assert!(dump.contains("$var wire 1"));
    }

    #[test]
    fn injected_fault_exits_one() {
        let dir = tempfile::tempdir().unwrap();
        let global = GlobalArgs {
            quiet: true,
            config: Some(tiny_config(dir.path())),
        };
        let dut = DutArgs {
            dut_h_front: Some(3),
            dut_h_back: Some(2),
            ..DutArgs::default()
        };
        assert_eq!(run(&run_args(dut, None), &global).unwrap(), 1);
    }
}
