//! Cycle-accurate verification of video sync timing.
//!
//! Given a design that drives hsync and vsync from one reference clock, this
//! crate checks that every front porch, sync pulse and frame period lasts
//! exactly the number of clock cycles a [`VideoMode`] prescribes. The run is
//! a single [`FrameSequencer`] task on a [`SimKernel`]; the first interval
//! that is off by even one cycle ends it with [`VerifyError::TimingMismatch`].
//!
//! # Usage
//!
//! ```ignore
//! use syncwatch_verify::{verify, SyncGenerator, VerifyConfig, VideoMode};
//!
//! let mode = VideoMode::builtin("vga_640x480_60").unwrap();
//! let config = VerifyConfig::new(mode.clone(), 39_722_000);
//! let report = verify(&config, Box::new(SyncGenerator::new(mode)), None)?;
//! println!("{report}");
//! ```

#![warn(missing_docs)]

pub mod checkpoint;
pub mod error;
pub mod generator;
pub mod mode;
pub mod report;
pub mod sequencer;

use serde::{Deserialize, Serialize};
use syncwatch_common::Logic;
use syncwatch_sim::{Clock, Design, SimKernel, WaveformRecorder};
use tracing::{info, warn};

pub use checkpoint::{Advance, EdgeWait, Interval, Measurement};
pub use error::VerifyError;
pub use generator::SyncGenerator;
pub use mode::{AxisTiming, SyncLevels, SyncPolarity, VideoMode};
pub use report::RunReport;
pub use sequencer::{FrameSequencer, SequenceOutcome, SequencerState};

/// Which level of the reset port holds the design in reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetPolarity {
    /// Reset while the port is `0`.
    #[default]
    #[serde(rename = "low")]
    ActiveLow,
    /// Reset while the port is `1`.
    #[serde(rename = "high")]
    ActiveHigh,
}

impl ResetPolarity {
    /// Level that asserts reset.
    pub fn asserted_level(self) -> Logic {
        match self {
            ResetPolarity::ActiveLow => Logic::Zero,
            ResetPolarity::ActiveHigh => Logic::One,
        }
    }

    /// Level that releases reset.
    pub fn released_level(self) -> Logic {
        !self.asserted_level()
    }
}

/// The reset phase at the start of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResetSpec {
    /// Reset port, or `None` to only wait `cycles`.
    pub port: Option<String>,
    /// Which level asserts reset.
    pub polarity: ResetPolarity,
    /// Rising clock edges to hold reset for.
    pub cycles: u64,
}

impl Default for ResetSpec {
    fn default() -> Self {
        Self {
            port: Some("rst_n".to_string()),
            polarity: ResetPolarity::ActiveLow,
            cycles: 10,
        }
    }
}

/// Everything a verification run needs besides the design itself.
#[derive(Clone, Debug, PartialEq)]
pub struct VerifyConfig {
    /// The expected timing.
    pub mode: VideoMode,
    /// Clock port name.
    pub clock_port: String,
    /// Clock period in femtoseconds.
    pub clock_period_fs: u64,
    /// Reset phase.
    pub reset: ResetSpec,
    /// Horizontal sync port.
    pub hsync: String,
    /// Vertical sync port.
    pub vsync: String,
    /// Constant values driven onto other inputs at the start of the run.
    pub inputs: Vec<(String, Logic)>,
    /// Frames to validate checkpoint by checkpoint. Must be at least one.
    pub frames: u32,
    /// Frame periods to confirm afterwards.
    pub periodicity_frames: u32,
    /// Give up on an edge that is more than one cycle late.
    pub bound_waits: bool,
    /// Absolute time limit; `None` uses [`VerifyConfig::default_watchdog_fs`].
    pub watchdog_fs: Option<u64>,
}

impl VerifyConfig {
    /// A one-frame check of `mode` with default ports (`clk`, `rst_n`, `hsync`, `vsync`).
    pub fn new(mode: VideoMode, clock_period_fs: u64) -> Self {
        Self {
            mode,
            clock_port: "clk".to_string(),
            clock_period_fs,
            reset: ResetSpec::default(),
            hsync: "hsync".to_string(),
            vsync: "vsync".to_string(),
            inputs: Vec::new(),
            frames: 1,
            periodicity_frames: 1,
            bound_waits: false,
            watchdog_fs: None,
        }
    }

    /// The reset cycles plus `frames + periodicity_frames + 3` frames.
    pub fn default_watchdog_fs(&self) -> u64 {
        let frames = u64::from(self.frames) + u64::from(self.periodicity_frames) + 3;
        frames
            .saturating_mul(self.mode.frame_cycles())
            .saturating_add(self.reset.cycles)
            .saturating_mul(self.clock_period_fs)
    }

    /// The watchdog limit this run will use.
    pub fn watchdog_limit_fs(&self) -> u64 {
        self.watchdog_fs.unwrap_or_else(|| self.default_watchdog_fs())
    }
}

/// Runs the frame sequencer against `dut`.
///
/// Ports the design does not declare (the reset port, extra inputs) are
/// created as plain signals. If `recorder` is given every signal is dumped
/// to it, and the dump is finalized whether the run passes or fails.
pub fn verify(
    config: &VerifyConfig,
    dut: Box<dyn Design>,
    recorder: Option<Box<dyn WaveformRecorder>>,
) -> Result<RunReport, VerifyError> {
    config.mode.validate()?;

    let mut kernel = SimKernel::new();
    kernel.start_clock(&config.clock_port, Clock::new(config.clock_period_fs)?)?;
    kernel.attach_design(dut)?;
    let extra_ports = config
        .reset
        .port
        .iter()
        .chain(config.inputs.iter().map(|(name, _)| name));
    for name in extra_ports {
        if kernel.find_signal(name).is_none() {
            kernel.add_signal(name, Logic::X)?;
        }
    }

    let mut sequencer = FrameSequencer::new(&kernel, config)?;
    if let Some(recorder) = recorder {
        kernel.set_recorder(recorder)?;
    }
    kernel.set_time_limit(config.watchdog_limit_fs());

    info!(
        mode = %config.mode.name,
        period = %syncwatch_sim::SimTime::from_fs(config.clock_period_fs),
        frames = config.frames,
        "Starting verification"
    );
    let result = kernel.run_task(&mut sequencer);
    let summary = kernel.finish()?;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(state = ?sequencer.state(), "Verification failed");
            return Err(err);
        }
    };

    info!(
        frames = outcome.frames_validated,
        periods = outcome.periodicity_frames,
        "All checkpoints passed"
    );
    Ok(RunReport {
        mode: config.mode.name.clone(),
        clock_period_fs: config.clock_period_fs,
        frames_validated: outcome.frames_validated,
        periodicity_frames: outcome.periodicity_frames,
        aligned_at: outcome.aligned_at,
        measurements: outcome.measurements,
        final_time: summary.final_time,
        clock_cycles: summary.clock_cycles,
    })
}
