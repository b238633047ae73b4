//! Simulation kernel with event queue, delta-cycle loop, and task scheduler.
//!
//! [`SimKernel`] owns the shared notion of simulated time. It holds every
//! signal, the free-running clock, an optional design under test and an
//! optional waveform recorder. Time only moves forward through
//! [`step_delta`](SimKernel::step_delta): all events due at the next time
//! point are applied, the design sees rising clock edges, and the resulting
//! changes are what suspended tasks are polled against.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use syncwatch_common::Logic;
use tracing::debug;

use crate::clock::Clock;
use crate::design::{Design, DesignIo, PendingDrive, PortMap};
use crate::error::SimError;
use crate::signal::{Change, SignalId, SignalState};
use crate::task::{Step, Task, TaskContext};
use crate::time::SimTime;
use crate::trigger::{Armed, Fired, Trigger};
use crate::waveform::WaveformRecorder;

/// What a scheduled event does when its time comes.
#[derive(Debug, Clone, Copy)]
enum EventKind {
    /// Set a signal to a value.
    Set { signal: SignalId, value: Logic },
    /// Drive the clock to `value` and schedule the opposite phase.
    ClockEdge { value: Logic },
    /// No-op that makes the kernel stop at this time (timer deadlines).
    Wake,
}

/// An event scheduled in the simulation event queue.
#[derive(Debug, Clone)]
struct SimEvent {
    time: SimTime,
    /// Insertion order, so same-time events apply first-in first-out.
    seq: u64,
    kind: EventKind,
}

impl PartialEq for SimEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for SimEvent {}

impl PartialOrd for SimEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.time.cmp(&other.time).then(self.seq.cmp(&other.seq))
    }
}

#[derive(Debug, Clone, Copy)]
struct ClockState {
    signal: SignalId,
    clock: Clock,
}

/// Totals reported when a run is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Simulation time when the run ended.
    pub final_time: SimTime,
    /// Delta cycles executed.
    pub total_deltas: u64,
    /// Rising clock edges produced.
    pub clock_cycles: u64,
}

/// The result of a single delta-cycle step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// A delta cycle was executed.
    Continued,
    /// The event queue is empty; time cannot advance.
    Idle,
    /// The next event lies beyond the time limit.
    LimitReached,
}

/// The simulation kernel: signals, clock, event queue, and scheduler.
pub struct SimKernel {
    current_time: SimTime,
    event_queue: BinaryHeap<Reverse<SimEvent>>,
    next_seq: u64,
    signals: Vec<SignalState>,
    names: HashMap<String, SignalId>,
    clock: Option<ClockState>,
    design: Option<Box<dyn Design>>,
    recorder: Option<Box<dyn WaveformRecorder>>,
    /// Watchdog: no event after this time (fs) is processed.
    time_limit: Option<u64>,
    max_delta_per_step: u32,
    deltas_at_current_time: u32,
    total_deltas: u64,
    clock_cycles: u64,
    /// Changes applied in the most recent delta cycle.
    changes: Vec<Change>,
    /// `previous` and `last_change` each entry of `changes` overwrote.
    overwritten: Vec<(Logic, SimTime)>,
    pending: Vec<PendingDrive>,
}

impl Default for SimKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl SimKernel {
    /// Creates an empty kernel at time zero.
    pub fn new() -> Self {
        Self {
            current_time: SimTime::zero(),
            event_queue: BinaryHeap::new(),
            next_seq: 0,
            signals: Vec::new(),
            names: HashMap::new(),
            clock: None,
            design: None,
            recorder: None,
            time_limit: None,
            max_delta_per_step: 10_000,
            deltas_at_current_time: 0,
            total_deltas: 0,
            clock_cycles: 0,
            changes: Vec::new(),
            overwritten: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Declares a new signal.
    pub fn add_signal(&mut self, name: &str, init: Logic) -> Result<SignalId, SimError> {
        if self.names.contains_key(name) {
            return Err(SimError::DuplicateSignal {
                name: name.to_string(),
            });
        }
        let id = SignalId::from_raw(self.signals.len() as u32);
        self.signals.push(SignalState::new(name, init));
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Finds a signal by name.
    pub fn find_signal(&self, name: &str) -> Option<SignalId> {
        self.names.get(name).copied()
    }

    /// Finds a signal by name, failing with [`SimError::UnknownSignal`].
    pub fn signal(&self, name: &str) -> Result<SignalId, SimError> {
        self.find_signal(name).ok_or_else(|| SimError::UnknownSignal {
            name: name.to_string(),
        })
    }

    /// Current value of a signal.
    pub fn signal_value(&self, id: SignalId) -> Logic {
        self.signals[id.index()].value
    }

    /// Name of a signal.
    pub fn signal_name(&self, id: SignalId) -> &str {
        &self.signals[id.index()].name
    }

    /// Full state of a signal.
    pub fn signal_state(&self, id: SignalId) -> &SignalState {
        &self.signals[id.index()]
    }

    /// Number of declared signals.
    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    /// Returns the current simulation time.
    pub fn current_time(&self) -> SimTime {
        self.current_time
    }

    /// Sets the watchdog limit in absolute femtoseconds.
    pub fn set_time_limit(&mut self, limit_fs: u64) {
        self.time_limit = Some(limit_fs);
    }

    /// The watchdog limit, if set.
    pub fn time_limit(&self) -> Option<u64> {
        self.time_limit
    }

    /// Sets the maximum number of delta cycles per time step.
    pub fn set_max_delta(&mut self, max: u32) {
        self.max_delta_per_step = max;
    }

    /// The running clock, if started.
    pub fn clock(&self) -> Option<&Clock> {
        self.clock.as_ref().map(|c| &c.clock)
    }

    /// The clock signal, if started.
    pub fn clock_signal(&self) -> Option<SignalId> {
        self.clock.map(|c| c.signal)
    }

    /// Changes applied in the most recent delta cycle.
    pub fn last_changes(&self) -> &[Change] {
        &self.changes
    }

    /// Starts the free-running clock on signal `name`.
    ///
    /// The signal is created (initially `0`) unless a design already declared
    /// it. The first rising edge happens in the earliest delta still pending,
    /// `t = 0` for a fresh kernel, and the clock then runs until the kernel is
    /// dropped.
    pub fn start_clock(&mut self, name: &str, clock: Clock) -> Result<SignalId, SimError> {
        if self.clock.is_some() {
            return Err(SimError::InvalidClock {
                reason: "a clock is already running".to_string(),
            });
        }
        let signal = match self.find_signal(name) {
            Some(id) => id,
            None => self.add_signal(name, Logic::Zero)?,
        };
        self.clock = Some(ClockState { signal, clock });
        let at = self.next_slot();
        self.push_event(at, EventKind::ClockEdge { value: Logic::One });
        debug!(
            clock = name,
            period_fs = clock.period_fs(),
            "clock started"
        );
        Ok(signal)
    }

    /// Attaches the design under test, allocating and binding its ports.
    pub fn attach_design(&mut self, mut design: Box<dyn Design>) -> Result<(), SimError> {
        if self.design.is_some() {
            return Err(SimError::DesignAlreadyAttached);
        }

        let mut ports = PortMap::default();
        for decl in design.ports() {
            let id = match self.find_signal(&decl.name) {
                Some(id) => id,
                None => self.add_signal(&decl.name, decl.init)?,
            };
            ports.insert(&decl.name, id);
        }
        design.bind(&ports)?;

        let mut io = DesignIo {
            signals: &self.signals,
            pending: &mut self.pending,
            now: self.current_time,
        };
        design.initialize(&mut io)?;
        self.flush_pending();

        debug!(
            design = design.name(),
            signals = self.signals.len(),
            "design attached"
        );
        self.design = Some(design);
        Ok(())
    }

    /// Attaches a waveform recorder and dumps the current value of every signal.
    ///
    /// Signals declared afterwards are not recorded, so attach the clock and
    /// the design first.
    pub fn set_recorder(&mut self, mut recorder: Box<dyn WaveformRecorder>) -> Result<(), SimError> {
        recorder.begin_scope("syncwatch")?;
        for (index, state) in self.signals.iter().enumerate() {
            recorder.register_signal(SignalId::from_raw(index as u32), &state.name)?;
        }
        recorder.end_scope()?;
        for (index, state) in self.signals.iter().enumerate() {
            recorder.record_change(
                self.current_time.fs,
                SignalId::from_raw(index as u32),
                state.value,
            )?;
        }
        self.recorder = Some(recorder);
        Ok(())
    }

    /// Drives `signal` to `value` in the next delta cycle.
    pub fn drive(&mut self, signal: SignalId, value: Logic) {
        let at = self.next_slot();
        self.push_event(at, EventKind::Set { signal, value });
    }

    /// Schedules `signal` to take `value` at absolute time `at_fs`.
    pub fn schedule(&mut self, signal: SignalId, value: Logic, at_fs: u64) {
        let at = if at_fs <= self.current_time.fs {
            self.next_slot()
        } else {
            SimTime::from_fs(at_fs)
        };
        self.push_event(at, EventKind::Set { signal, value });
    }

    /// Executes a single delta cycle.
    pub fn step_delta(&mut self) -> Result<StepResult, SimError> {
        let next_time = match self.event_queue.peek() {
            Some(Reverse(evt)) => evt.time,
            None => return Ok(StepResult::Idle),
        };
        if let Some(limit) = self.time_limit {
            if next_time.fs > limit {
                return Ok(StepResult::LimitReached);
            }
        }

        if next_time.fs != self.current_time.fs {
            self.deltas_at_current_time = 0;
        }
        self.current_time = next_time;
        self.changes.clear();
        self.overwritten.clear();
        self.total_deltas += 1;
        self.deltas_at_current_time += 1;

        let mut clock_rose = false;
        while let Some(Reverse(evt)) = self.event_queue.peek() {
            if evt.time != self.current_time {
                break;
            }
            let Some(Reverse(evt)) = self.event_queue.pop() else {
                break;
            };
            match evt.kind {
                EventKind::Set { signal, value } => self.apply(signal, value),
                EventKind::ClockEdge { value } => {
                    let Some(state) = self.clock else { continue };
                    self.apply(state.signal, value);
                    let (next_value, after) = if value == Logic::One {
                        clock_rose = true;
                        self.clock_cycles += 1;
                        (Logic::Zero, state.clock.high_fs())
                    } else {
                        (Logic::One, state.clock.low_fs())
                    };
                    let at = SimTime::from_fs(self.current_time.fs + after);
                    self.push_event(at, EventKind::ClockEdge { value: next_value });
                }
                EventKind::Wake => {}
            }
        }

        if let Some(rec) = &mut self.recorder {
            for change in &self.changes {
                rec.record_change(self.current_time.fs, change.signal, change.value)?;
            }
        }

        if clock_rose {
            if let Some(design) = self.design.as_mut() {
                let mut io = DesignIo {
                    signals: &self.signals,
                    pending: &mut self.pending,
                    now: self.current_time,
                };
                design.on_clock(&mut io);
            }
            self.flush_pending();
        }

        if self.deltas_at_current_time >= self.max_delta_per_step {
            return Err(SimError::DeltaCycleLimit {
                fs: self.current_time.fs,
                max_deltas: self.max_delta_per_step,
            });
        }

        Ok(StepResult::Continued)
    }

    /// Runs for `duration_fs` of simulated time with no task attached.
    pub fn run_for(&mut self, duration_fs: u64) -> Result<RunSummary, SimError> {
        let end = self.current_time.fs.saturating_add(duration_fs);
        while let Some(Reverse(evt)) = self.event_queue.peek() {
            if evt.time.fs > end {
                break;
            }
            if self.step_delta()? != StepResult::Continued {
                break;
            }
        }
        if self.current_time.fs < end && self.time_limit.map_or(true, |limit| end <= limit) {
            self.current_time = SimTime::from_fs(end);
        }
        Ok(self.summary())
    }

    /// Runs `task` to completion, resuming it whenever its trigger fires.
    ///
    /// Kernel failures (stall, watchdog, delta limit) abort the task and are
    /// converted into the task's error type.
    pub fn run_task<T: Task>(&mut self, task: &mut T) -> Result<T::Output, T::Error> {
        let mut fired = None;
        loop {
            let step = {
                let mut cx = TaskContext {
                    kernel: self,
                    fired: fired.take(),
                };
                task.resume(&mut cx)?
            };
            match step {
                Step::Done(output) => return Ok(output),
                Step::Wait(trigger) => fired = Some(self.wait_on(&trigger)?),
            }
        }
    }

    /// Advances time until `trigger` fires.
    pub fn wait_on(&mut self, trigger: &Trigger) -> Result<Fired, SimError> {
        let mut armed = Armed::arm(trigger, self.current_time.fs);
        if let Some(index) = armed.ready(self.current_time.fs) {
            return Ok(Fired {
                index,
                time: self.current_time,
            });
        }

        let mut deadlines = Vec::new();
        armed.deadlines(&mut deadlines);
        let timed = !deadlines.is_empty();
        for deadline in deadlines {
            self.push_event(SimTime::from_fs(deadline), EventKind::Wake);
        }

        let result = self.poll_until_fired(&mut armed, trigger);
        if timed {
            // Deadlines of a race another branch won must not hold time open.
            self.event_queue
                .retain(|Reverse(evt)| !matches!(evt.kind, EventKind::Wake));
        }
        result
    }

    fn poll_until_fired(&mut self, armed: &mut Armed, trigger: &Trigger) -> Result<Fired, SimError> {
        loop {
            match self.step_delta()? {
                StepResult::Continued => {}
                StepResult::Idle => {
                    return Err(SimError::Stalled {
                        time_fs: self.current_time.fs,
                        waiting_on: self.describe(trigger),
                    })
                }
                StepResult::LimitReached => {
                    return Err(SimError::WatchdogExpired {
                        limit_fs: self.time_limit.unwrap_or(self.current_time.fs),
                        waiting_on: self.describe(trigger),
                    })
                }
            }
            if let Some(index) = armed.poll(self.current_time.fs, &self.changes) {
                return Ok(Fired {
                    index,
                    time: self.current_time,
                });
            }
        }
    }

    /// Human-readable description of a trigger, using signal names.
    pub fn describe(&self, trigger: &Trigger) -> String {
        match trigger {
            Trigger::Edge { signal, edge } => format!("{edge} of {}", self.signal_name(*signal)),
            Trigger::ClockCycles { signal, count } => {
                format!("{count} cycles of {}", self.signal_name(*signal))
            }
            Trigger::Timer { fs } => format!("{fs} fs timer"),
            Trigger::First(branches) => {
                let parts: Vec<String> = branches.iter().map(|b| self.describe(b)).collect();
                format!("first of [{}]", parts.join(", "))
            }
        }
    }

    /// Flushes the waveform recorder and returns run totals.
    pub fn finish(&mut self) -> Result<RunSummary, SimError> {
        if let Some(rec) = &mut self.recorder {
            rec.finalize()?;
        }
        Ok(self.summary())
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            final_time: self.current_time,
            total_deltas: self.total_deltas,
            clock_cycles: self.clock_cycles,
        }
    }

    /// The earliest delta that has not been executed yet.
    fn next_slot(&self) -> SimTime {
        if self.total_deltas == 0 {
            self.current_time
        } else {
            self.current_time.next_delta()
        }
    }

    fn push_event(&mut self, time: SimTime, kind: EventKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.event_queue.push(Reverse(SimEvent { time, seq, kind }));
    }

    fn flush_pending(&mut self) {
        let mut pending = std::mem::take(&mut self.pending);
        for drive in pending.drain(..) {
            match drive.at_fs {
                Some(at_fs) => self.schedule(drive.signal, drive.value, at_fs),
                None => self.drive(drive.signal, drive.value),
            }
        }
        self.pending = pending;
    }

    /// Applies a value within the current delta, merging repeated writes.
    fn apply(&mut self, signal: SignalId, value: Logic) {
        let now = self.current_time;
        let state = &mut self.signals[signal.index()];
        if let Some(pos) = self.changes.iter().position(|c| c.signal == signal) {
            state.value = value;
            if value == self.changes[pos].previous {
                let (previous, last_change) = self.overwritten.remove(pos);
                state.previous = previous;
                state.last_change = last_change;
                self.changes.remove(pos);
            } else {
                self.changes[pos].value = value;
            }
            return;
        }
        if state.value == value {
            return;
        }
        self.changes.push(Change {
            signal,
            previous: state.value,
            value,
        });
        self.overwritten.push((state.previous, state.last_change));
        state.previous = state.value;
        state.value = value;
        state.last_change = now;
    }
}
