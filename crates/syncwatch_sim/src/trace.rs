//! Replaying recorded levels as a design under test.
//!
//! A [`Trace`] is the level history of one output. [`TraceDesign`] owns one
//! trace per port and schedules every transition up front, so a captured VCD
//! (or a synthesized waveform) can be checked exactly like a live model.

use syncwatch_common::Logic;

use crate::design::{Design, DesignIo, PortDecl, PortMap};
use crate::error::SimError;
use crate::signal::SignalId;
use crate::vcd_loader::{LoadedWaveform, SignalSelector, VcdLoadError};

/// Level history of a single signal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trace {
    port: String,
    initial: Logic,
    changes: Vec<(u64, Logic)>,
}

impl Trace {
    /// Starts a trace for `port` at `initial` level.
    pub fn new(port: impl Into<String>, initial: Logic) -> Self {
        Self {
            port: port.into(),
            initial,
            changes: Vec::new(),
        }
    }

    /// Builds a trace from `(time_fs, level)` samples.
    ///
    /// A sample at time zero sets the initial level; without one the port
    /// starts at `X`.
    pub fn from_samples(port: impl Into<String>, samples: &[(u64, Logic)]) -> Self {
        let mut sorted = samples.to_vec();
        sorted.sort_by_key(|(t, _)| *t);
        let mut trace = Self::new(port, Logic::X);
        for (time, level) in sorted {
            trace.push(time, level);
        }
        trace
    }

    /// Extracts `selector` from a loaded VCD and names the result `port`.
    pub fn from_vcd(
        port: impl Into<String>,
        wave: &LoadedWaveform,
        selector: &SignalSelector,
    ) -> Result<Self, VcdLoadError> {
        Ok(Self::from_samples(port, &wave.extract(selector)?))
    }

    /// Appends a sample; repeats of the current level are dropped.
    ///
    /// Samples must come in time order. One at the time of the previous
    /// change replaces it.
    pub fn push(&mut self, time_fs: u64, level: Logic) {
        if time_fs == 0 && self.changes.is_empty() {
            self.initial = level;
            return;
        }
        if let Some(last) = self.changes.last_mut() {
            if last.0 == time_fs {
                last.1 = level;
                let before = self.changes.len().checked_sub(2).map(|i| self.changes[i].1);
                if before.unwrap_or(self.initial) == level {
                    self.changes.pop();
                }
                return;
            }
        }
        if self.value_at(time_fs) != level {
            self.changes.push((time_fs, level));
        }
    }

    /// The port this trace drives.
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Level at time zero.
    pub fn initial(&self) -> Logic {
        self.initial
    }

    /// Transitions after time zero.
    pub fn changes(&self) -> &[(u64, Logic)] {
        &self.changes
    }

    /// Time of the last transition, or zero.
    pub fn end_fs(&self) -> u64 {
        self.changes.last().map_or(0, |(t, _)| *t)
    }

    /// Level at `time_fs`, with changes taking effect at their own time.
    pub fn value_at(&self, time_fs: u64) -> Logic {
        let idx = self.changes.partition_point(|(t, _)| *t <= time_fs);
        match idx {
            0 => self.initial,
            n => self.changes[n - 1].1,
        }
    }
}

/// A design whose outputs replay recorded traces.
///
/// It ignores its inputs, so a reset phase cannot hold it back. Traces are
/// expected to come from a capture that already starts with the reset
/// sequence.
#[derive(Debug, Default)]
pub struct TraceDesign {
    name: String,
    traces: Vec<Trace>,
    bound: Vec<SignalId>,
}

impl TraceDesign {
    /// Creates a replay design called `name`.
    pub fn new(name: impl Into<String>, traces: Vec<Trace>) -> Self {
        Self {
            name: name.into(),
            traces,
            bound: Vec::new(),
        }
    }

    /// Time of the last transition across all traces.
    pub fn end_fs(&self) -> u64 {
        self.traces.iter().map(Trace::end_fs).max().unwrap_or(0)
    }
}

impl Design for TraceDesign {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> Vec<PortDecl> {
        self.traces
            .iter()
            .map(|t| PortDecl::output(t.port(), t.initial()))
            .collect()
    }

    fn bind(&mut self, ports: &PortMap) -> Result<(), SimError> {
        self.bound = self
            .traces
            .iter()
            .map(|t| ports.get(t.port()))
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    fn initialize(&mut self, io: &mut DesignIo<'_>) -> Result<(), SimError> {
        for (trace, &signal) in self.traces.iter().zip(&self.bound) {
            for &(time, level) in trace.changes() {
                io.drive_at(signal, level, time);
            }
        }
        Ok(())
    }

    fn on_clock(&mut self, _io: &mut DesignIo<'_>) {}
}
