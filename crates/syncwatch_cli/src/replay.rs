//! `syncwatch replay`: verify sync signals recorded by another simulator.
//!
//! The probes name VCD signals (`tb.uo_out[7]`, or a unique suffix such as
//! `hsync`). Their recorded changes are replayed into the kernel against a
//! fresh reference clock. The recording already contains its own reset, so
//! replay drives no reset port and only waits the configured reset cycles
//! before aligning.

use std::error::Error;

use syncwatch_config::resolve_run;
use syncwatch_sim::{load_vcd_file, SignalSelector, SimTime, Trace, TraceDesign};
use syncwatch_verify::verify;
use tracing::info;

use crate::pipeline::{load_run_config, path_label, report_outcome};
use crate::{GlobalArgs, ReplayArgs};

const HSYNC_PORT: &str = "hsync";
const VSYNC_PORT: &str = "vsync";

/// Runs the `syncwatch replay` command.
///
/// Returns exit code 0 if every checkpoint passed, 1 on a timing failure
/// (including a recording that ends before the checks are done).
pub fn run(args: &ReplayArgs, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let mut config = load_run_config(global)?;
    args.overrides.apply(&mut config);
    config.reset.enabled = false;
    config.inputs.clear();
    config.waveform.path = None;
    let mut run = resolve_run(&config)?;

    let wave = load_vcd_file(&args.vcd)?;
    let hsync: SignalSelector = run.verify.hsync.parse()?;
    let vsync: SignalSelector = run.verify.vsync.parse()?;
    let traces = vec![
        Trace::from_vcd(HSYNC_PORT, &wave, &hsync)?,
        Trace::from_vcd(VSYNC_PORT, &wave, &vsync)?,
    ];
    let design = TraceDesign::new(path_label(&args.vcd), traces);
    info!(
        file = %args.vcd.display(),
        %hsync,
        %vsync,
        last_change = %SimTime::from_fs(design.end_fs()),
        end = %SimTime::from_fs(wave.end_fs),
        "Replaying recorded sync signals"
    );

    run.verify.hsync = HSYNC_PORT.to_string();
    run.verify.vsync = VSYNC_PORT.to_string();
    run.verify.watchdog_fs = Some(replay_limit_fs(
        run.verify.watchdog_limit_fs(),
        wave.end_fs.max(design.end_fs()),
        run.verify.mode.frame_cycles(),
        run.verify.clock_period_fs,
    ));

    let result = verify(&run.verify, Box::new(design), None);
    report_outcome(&run.verify, result, args.overrides.format, global.quiet)
}

/// Time limit for a replay.
///
/// Nothing changes after the recording ends, so waiting longer than one
/// more frame past its end cannot produce an edge.
pub fn replay_limit_fs(watchdog_fs: u64, recording_end_fs: u64, frame_cycles: u64, period_fs: u64) -> u64 {
    let horizon = recording_end_fs.saturating_add(frame_cycles.saturating_mul(period_fs));
    watchdog_fs.min(horizon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ReportFormat, RunOverrides};
    use std::fmt::Write as _;
    use std::path::{Path, PathBuf};
    use syncwatch_verify::{AxisTiming, SyncPolarity, VideoMode};

    fn tiny() -> VideoMode {
        VideoMode::new(
            "tiny",
            AxisTiming::new(8, 2, 3, 3, SyncPolarity::Negative),
            AxisTiming::new(6, 1, 2, 2, SyncPolarity::Negative),
        )
    }

    const TINY_CONFIG: &str = r#"
[clock]
period = "1ns"

[mode]
name = "tiny"
horizontal = { active = 8, front_porch = 2, sync = 3, back_porch = 3 }
vertical = { active = 6, front_porch = 1, sync = 2, back_porch = 2 }

[probes]
hsync = "tb.uo_out[7]"
vsync = "tb.uo_out[3]"
"#;

    /// Writes a ns-timescale VCD with both syncs packed into an 8-bit
    /// `uo_out` vector, following `mode` from cycle `origin`. With no reset
    /// port the sequencer aligns after ten edges, at cycle 9.
    fn write_vcd(path: &Path, mode: &VideoMode, origin: u64, cycles: u64) {
        let mut out = String::from(
            "$timescale 1ns $end\n$scope module tb $end\n\
             $var wire 8 ! uo_out [7:0] $end\n$upscope $end\n$enddefinitions $end\n",
        );
        let mut last = None;
        for c in 0..cycles {
            let levels = mode.sync_levels(c.saturating_sub(origin));
            let bits = (levels.hsync.vcd_char(), levels.vsync.vcd_char());
            if last != Some(bits) {
                // Bit 7 is hsync and bit 3 is vsync; the rest stay low.
                writeln!(out, "#{c}\nb{}000{}000 !", bits.0, bits.1).unwrap();
                last = Some(bits);
            }
        }
        writeln!(out, "#{cycles}").unwrap();
        std::fs::write(path, out).unwrap();
    }

    fn replay_args(vcd: PathBuf, frames: Option<u32>) -> ReplayArgs {
        ReplayArgs {
            vcd,
            overrides: RunOverrides {
                frames,
                format: ReportFormat::Json,
                ..RunOverrides::default()
            },
        }
    }

    fn global(dir: &Path) -> GlobalArgs {
        let path = dir.join("syncwatch.toml");
        std::fs::write(&path, TINY_CONFIG).unwrap();
        GlobalArgs {
            quiet: true,
            config: Some(path),
        }
    }

    #[test]
    fn limit_is_the_earlier_of_watchdog_and_recording() {
        assert_eq!(replay_limit_fs(1_000, 100, 10, 5), 150);
        assert_eq!(replay_limit_fs(120, 100, 10, 5), 120);
    }

    #[test]
    fn recorded_generator_passes() {
        let dir = tempfile::tempdir().unwrap();
        let vcd = dir.path().join("tb.vcd");
        write_vcd(&vcd, &tiny(), 9, 9 + 5 * 176);
        let code = run(&replay_args(vcd, Some(2)), &global(dir.path())).unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn truncated_recording_fails() {
        let dir = tempfile::tempdir().unwrap();
        let vcd = dir.path().join("tb.vcd");
        // Ends part way through the first frame.
        write_vcd(&vcd, &tiny(), 9, 9 + 100);
        let code = run(&replay_args(vcd, None), &global(dir.path())).unwrap();
        assert_eq!(code, 1);
    }

    #[test]
    fn missing_signal_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let vcd = dir.path().join("tb.vcd");
        write_vcd(&vcd, &tiny(), 9, 400);
        let mut args = replay_args(vcd, None);
        args.overrides.vsync = Some("tb.uio_out[0]".into());
        assert!(run(&args, &global(dir.path())).is_err());
    }
}
