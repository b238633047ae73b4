//! Simulation error types for the discrete-event kernel.
//!
//! All errors that can occur while building or running a simulation are
//! represented as variants of [`SimError`].

use std::io;

/// Errors that can occur during simulation setup or execution.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A signal name could not be resolved.
    #[error("unknown signal '{name}'")]
    UnknownSignal {
        /// The name that was looked up.
        name: String,
    },

    /// A signal with this name already exists.
    #[error("signal '{name}' is already declared")]
    DuplicateSignal {
        /// The conflicting name.
        name: String,
    },

    /// The clock could not be constructed or started.
    #[error("invalid clock: {reason}")]
    InvalidClock {
        /// Description of why the clock is invalid.
        reason: String,
    },

    /// A design is already attached to the kernel.
    #[error("a design is already attached")]
    DesignAlreadyAttached,

    /// The event queue ran dry while a task was still waiting.
    #[error("simulation stalled at {time_fs} fs waiting for {waiting_on}")]
    Stalled {
        /// Time in femtoseconds when the queue emptied.
        time_fs: u64,
        /// Description of the trigger that never fired.
        waiting_on: String,
    },

    /// The watchdog limit passed while a task was still waiting.
    #[error("watchdog expired at {limit_fs} fs waiting for {waiting_on}")]
    WatchdogExpired {
        /// The limit in femtoseconds.
        limit_fs: u64,
        /// Description of the trigger that never fired.
        waiting_on: String,
    },

    /// Too many delta cycles at a single time step, indicating a feedback loop.
    #[error("delta cycle limit exceeded at {fs} fs (max {max_deltas} deltas)")]
    DeltaCycleLimit {
        /// The time in femtoseconds where the limit was hit.
        fs: u64,
        /// The maximum number of delta cycles allowed.
        max_deltas: u32,
    },

    /// A waveform recorder was handed a signal it never registered.
    #[error("signal #{id} is not registered with the waveform recorder")]
    UnregisteredSignal {
        /// Raw signal index.
        id: u32,
    },

    /// An I/O error occurred while writing waveform data.
    #[error("waveform I/O error: {0}")]
    WaveformIo(#[from] io::Error),
}
