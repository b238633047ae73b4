//! Error types for timing verification.

use syncwatch_common::Logic;
use syncwatch_sim::{Edge, SimError, SimTime};

use crate::checkpoint::Interval;

/// Errors that end a verification run.
///
/// Every variant is fatal: the run stops at the first failure.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// A measured interval differs from the expected cycle count.
    #[error(
        "{interval}: expected {expected} cycles until the {edge} of {signal}, \
         observed {observed} ({signal} = {value} at {time})"
    )]
    TimingMismatch {
        /// The checkpoint that failed.
        interval: Interval,
        /// Name of the observed signal.
        signal: String,
        /// The awaited edge.
        edge: Edge,
        /// Expected clock cycles.
        expected: u64,
        /// Observed clock cycles.
        observed: f64,
        /// Value of the signal when the edge was seen.
        value: Logic,
        /// Simulated time of the edge.
        time: SimTime,
    },

    /// In bounded-wait mode, the edge was more than one cycle late.
    #[error("{interval}: no {edge} of {signal} within {expected} cycles (gave up at {time})")]
    EdgeMissing {
        /// The checkpoint that failed.
        interval: Interval,
        /// Name of the observed signal.
        signal: String,
        /// The awaited edge.
        edge: Edge,
        /// Expected clock cycles.
        expected: u64,
        /// Simulated time when the wait was abandoned.
        time: SimTime,
    },

    /// The timing specification is internally inconsistent.
    #[error("invalid video mode '{mode}': {reason}")]
    InvalidMode {
        /// Mode name.
        mode: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The run settings cannot produce a verdict.
    #[error("invalid run: {0}")]
    InvalidRun(String),

    /// The simulation kernel failed (stall, watchdog, unknown signal, ...).
    #[error("simulation error: {0}")]
    Sim(#[from] SimError),
}

impl VerifyError {
    /// True when the design was observed and its timing was wrong, as
    /// opposed to the run being set up incorrectly.
    ///
    /// A stall or watchdog expiry means an expected edge never came.
    pub fn is_timing_failure(&self) -> bool {
        matches!(
            self,
            VerifyError::TimingMismatch { .. }
                | VerifyError::EdgeMissing { .. }
                | VerifyError::Sim(SimError::Stalled { .. })
                | VerifyError::Sim(SimError::WatchdogExpired { .. })
        )
    }

    /// The checkpoint that failed, if the failure belongs to one.
    pub fn interval(&self) -> Option<Interval> {
        match self {
            VerifyError::TimingMismatch { interval, .. }
            | VerifyError::EdgeMissing { interval, .. } => Some(*interval),
            _ => None,
        }
    }

    /// Name of the signal whose edge was awaited.
    pub fn signal(&self) -> Option<&str> {
        match self {
            VerifyError::TimingMismatch { signal, .. }
            | VerifyError::EdgeMissing { signal, .. } => Some(signal),
            _ => None,
        }
    }

    /// Expected clock cycles of the failed checkpoint.
    pub fn expected(&self) -> Option<u64> {
        match self {
            VerifyError::TimingMismatch { expected, .. }
            | VerifyError::EdgeMissing { expected, .. } => Some(*expected),
            _ => None,
        }
    }

    /// Observed clock cycles. A missing edge was never observed.
    pub fn observed(&self) -> Option<f64> {
        match self {
            VerifyError::TimingMismatch { observed, .. } => Some(*observed),
            _ => None,
        }
    }
}
