//! Discrete-event simulation kernel for syncwatch.
//!
//! This crate provides the time base that timing checks run on: a
//! femtosecond clock with delta cycles, four-state signals, a free-running
//! reference clock, and a cooperative scheduler that suspends a [`Task`] on
//! a [`Trigger`] and resumes it in the exact delta cycle the trigger fires.
//!
//! # Architecture
//!
//! [`SimKernel`] owns every signal and an event queue ordered by
//! `(time, insertion)`. The clock is a pair of self-rescheduling events.
//! A [`Design`] is called on each rising clock edge and its outputs land
//! one delta later, so a task woken by that edge still sees the old values.
//! Recorded waveforms can be replayed through [`TraceDesign`].
//!
//! # Usage
//!
//! ```ignore
//! use syncwatch_sim::{Clock, SimKernel, Trigger};
//!
//! let mut kernel = SimKernel::new();
//! let clk = kernel.start_clock("clk", Clock::new(39_722_000)?)?;
//! let fired = kernel.wait_on(&Trigger::cycles(clk, 10))?;
//! println!("ten cycles done at {}", fired.time);
//! ```

#![warn(missing_docs)]

pub mod clock;
pub mod design;
pub mod error;
pub mod kernel;
pub mod signal;
pub mod task;
pub mod time;
pub mod trace;
pub mod trigger;
pub mod vcd_loader;
pub mod waveform;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

pub use clock::{Clock, CycleConverter};
pub use design::{Design, DesignIo, PortDecl, PortDirection, PortMap};
pub use error::SimError;
pub use kernel::{RunSummary, SimKernel, StepResult};
pub use signal::{Change, Edge, SignalId, SignalState};
pub use task::{Step, Task, TaskContext};
pub use time::{SimTime, TimeUnit};
pub use trace::{Trace, TraceDesign};
pub use trigger::{Fired, Trigger};
pub use vcd_loader::{load_vcd, load_vcd_file, LoadedWaveform, SignalSelector, VcdLoadError};
pub use waveform::{VcdRecorder, WaveformRecorder};

/// Opens `path` for writing and wraps it in a buffered VCD recorder.
pub fn vcd_file_recorder(
    path: &Path,
    timescale: TimeUnit,
) -> Result<Box<dyn WaveformRecorder>, SimError> {
    let file = File::create(path)?;
    Ok(Box::new(VcdRecorder::with_timescale(
        BufWriter::new(file),
        timescale,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncwatch_common::Logic;

    #[test]
    fn dump_clocked_run_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.vcd");

        let mut kernel = SimKernel::new();
        kernel.start_clock("clk", Clock::new(10_000).unwrap()).unwrap();
        let flag = kernel.add_signal("flag", Logic::Zero).unwrap();
        kernel.schedule(flag, Logic::One, 25_000);
        kernel
            .set_recorder(vcd_file_recorder(&path, TimeUnit::Ps).unwrap())
            .unwrap();
        kernel.run_for(40_000).unwrap();
        let summary = kernel.finish().unwrap();
        assert_eq!(summary.clock_cycles, 5);

        let wave = load_vcd_file(&path).unwrap();
        assert_eq!(wave.timescale.fs_per_unit, 1_000);
        let flag_history = wave.extract(&"flag".parse().unwrap()).unwrap();
        assert_eq!(flag_history, vec![(0, Logic::Zero), (25_000, Logic::One)]);
        let clk_history = wave.extract(&"syncwatch.clk".parse().unwrap()).unwrap();
        // 0 initial, then rises at 0 ... falls at 5ns, rises at 10ns ...
        assert_eq!(clk_history[0], (0, Logic::One));
        assert_eq!(clk_history[1], (5_000, Logic::Zero));
    }

    #[test]
    fn recorder_on_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("run.vcd");
        assert!(matches!(
            vcd_file_recorder(&path, TimeUnit::Ps),
            Err(SimError::WaveformIo(_))
        ));
    }
}
