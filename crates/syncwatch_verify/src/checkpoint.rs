//! Edge-wait checkpoints and fixed advances.
//!
//! An [`EdgeWait`] is one `wait_for(edge, expected)` step: it remembers when
//! the wait began, builds the trigger to suspend on and, once resumed, turns
//! the elapsed time into clock cycles and asserts exact equality. An
//! [`Advance`] is a fixed number of rising clock edges with nothing measured.

use std::fmt;

use serde::{Deserialize, Serialize};
use syncwatch_sim::{CycleConverter, Edge, Fired, SignalId, SimTime, TaskContext, Trigger};

use crate::error::VerifyError;

/// Named intervals of the frame sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    /// Line start to hsync pulse start.
    HsyncFrontPorch,
    /// Hsync pulse width.
    HsyncPulse,
    /// Hsync pulse end to next line start.
    HsyncBackPorch,
    /// Second line start to vsync pulse start.
    VsyncFrontPorch,
    /// Vsync pulse width.
    VsyncPulse,
    /// Vsync pulse end to the next frame origin.
    VsyncBackPorch,
    /// Vsync pulse start to the next one.
    FramePeriod,
    /// Settle time after the last periodicity check.
    TrailingBackPorch,
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Interval::HsyncFrontPorch => "hsync front porch",
            Interval::HsyncPulse => "hsync pulse",
            Interval::HsyncBackPorch => "hsync back porch",
            Interval::VsyncFrontPorch => "vsync front porch",
            Interval::VsyncPulse => "vsync pulse",
            Interval::VsyncBackPorch => "vsync back porch",
            Interval::FramePeriod => "frame period",
            Interval::TrailingBackPorch => "trailing back porch",
        };
        f.write_str(name)
    }
}

/// A passed checkpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Which interval was measured.
    pub interval: Interval,
    /// Name of the observed signal.
    pub signal: String,
    /// The edge that ended the interval.
    pub edge: Edge,
    /// Expected clock cycles.
    pub expected: u64,
    /// Observed clock cycles.
    pub observed: f64,
    /// Simulated time of the edge.
    pub time: SimTime,
}

/// A measured wait for one edge.
#[derive(Clone, Debug)]
pub struct EdgeWait {
    /// The interval this wait closes.
    pub interval: Interval,
    /// Observed signal.
    pub signal: SignalId,
    /// Awaited edge.
    pub edge: Edge,
    /// Expected clock cycles from the start of the wait.
    pub expected: u64,
    started: SimTime,
}

impl EdgeWait {
    /// Starts a wait at the current time.
    pub fn begin(
        cx: &TaskContext<'_>,
        interval: Interval,
        signal: SignalId,
        edge: Edge,
        expected: u64,
    ) -> Self {
        Self {
            interval,
            signal,
            edge,
            expected,
            started: cx.now(),
        }
    }

    /// When the wait began.
    pub fn started(&self) -> SimTime {
        self.started
    }

    /// The trigger to suspend on.
    ///
    /// A bounded wait races the edge against `expected + 2` rising edges of
    /// `clock`; branch 0 is always the edge. A registered output lands one
    /// delta after the clock edge that produced it, so an edge that is one
    /// cycle late only shows up after the `expected + 1` counter has fired.
    pub fn trigger(&self, clock: SignalId, bounded: bool) -> Trigger {
        let edge = Trigger::Edge {
            signal: self.signal,
            edge: self.edge,
        };
        if bounded {
            Trigger::first(vec![edge, Trigger::cycles(clock, self.expected + 2)])
        } else {
            edge
        }
    }

    /// Measures the elapsed cycles and asserts them against `expected`.
    pub fn complete(
        &self,
        cx: &TaskContext<'_>,
        converter: &CycleConverter,
        fired: Option<Fired>,
    ) -> Result<Measurement, VerifyError> {
        let now = cx.now();
        let signal = cx.signal_name(self.signal).to_string();
        if fired.is_some_and(|f| f.index != 0) {
            return Err(VerifyError::EdgeMissing {
                interval: self.interval,
                signal,
                edge: self.edge,
                expected: self.expected,
                time: now,
            });
        }

        let observed = converter.elapsed_cycles(self.started, now);
        if observed != self.expected as f64 {
            return Err(VerifyError::TimingMismatch {
                interval: self.interval,
                signal,
                edge: self.edge,
                expected: self.expected,
                observed,
                value: cx.value(self.signal),
                time: now,
            });
        }

        Ok(Measurement {
            interval: self.interval,
            signal,
            edge: self.edge,
            expected: self.expected,
            observed,
            time: now,
        })
    }
}

/// A fixed delay of rising clock edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Advance {
    /// The interval being skipped.
    pub interval: Interval,
    /// Rising clock edges to wait for; zero resumes immediately.
    pub cycles: u64,
}

impl Advance {
    /// The trigger to suspend on.
    pub fn trigger(&self, clock: SignalId) -> Trigger {
        Trigger::cycles(clock, self.cycles)
    }
}
