//! The frame timing sequencer.
//!
//! [`FrameSequencer`] is a [`Task`] that walks a fixed list of states:
//! reset, phase alignment, the line and frame checkpoints for each frame,
//! then the periodicity confirmation. Each state either suspends on a
//! trigger or moves on immediately; the kernel resumes the task in the delta
//! cycle where the trigger fired and the state's wait is completed there.

use serde::Serialize;
use syncwatch_common::Logic;
use syncwatch_sim::{
    CycleConverter, Edge, SignalId, SimError, SimKernel, SimTime, Step, Task, TaskContext,
    TimeUnit, Trigger,
};
use tracing::{debug, info, warn};

use crate::checkpoint::{Advance, EdgeWait, Interval, Measurement};
use crate::error::VerifyError;
use crate::mode::VideoMode;
use crate::{ResetSpec, VerifyConfig};

/// Where the sequencer is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SequencerState {
    /// Hold the design in reset, then release it.
    Reset,
    /// Wait out a vsync pulse in progress.
    AlignVsync,
    /// Wait out an hsync pulse in progress.
    AlignHsync,
    /// Unmeasured wait for the end of the next vsync pulse.
    AlignFrameStart,
    /// Fixed advance from a vsync pulse end to the frame origin.
    AlignBackPorch,
    /// Line start to hsync pulse start.
    HsyncFrontPorch,
    /// Hsync pulse width.
    HsyncPulse,
    /// Fixed advance to the next line start.
    HsyncBackPorch,
    /// Second line start to vsync pulse start.
    VsyncFrontPorch,
    /// Vsync pulse width.
    VsyncPulse,
    /// Fixed advance back to the frame origin.
    VsyncBackPorch,
    /// One frame passed every checkpoint.
    FrameValidated,
    /// Unmeasured wait for the next hsync pulse start.
    PeriodicAlignHsync,
    /// Unmeasured wait for the next vsync pulse start.
    PeriodicAlignVsync,
    /// Vsync start to vsync start, once per periodicity frame.
    Periodicity,
    /// Unmeasured wait for the end of the last vsync pulse.
    TrailingVsyncEnd,
    /// Fixed settle after the last vsync pulse.
    TrailingBackPorch,
    /// All checks passed.
    Done,
}

/// What a finished sequence produced.
#[derive(Clone, Debug, PartialEq)]
pub struct SequenceOutcome {
    /// Every passed checkpoint, in order.
    pub measurements: Vec<Measurement>,
    /// Frames validated checkpoint by checkpoint.
    pub frames_validated: u32,
    /// Frame periods confirmed afterwards.
    pub periodicity_frames: u32,
    /// When phase alignment finished and measuring began.
    pub aligned_at: SimTime,
}

#[derive(Debug)]
enum Pending {
    Reset,
    Unmeasured,
    Measure(EdgeWait),
    Advance(Advance),
}

/// Signals the sequencer observes and drives.
#[derive(Clone, Debug)]
struct Ports {
    clock: SignalId,
    hsync: SignalId,
    vsync: SignalId,
    reset: Option<SignalId>,
    inputs: Vec<(SignalId, Logic)>,
}

/// The frame timing state machine.
pub struct FrameSequencer {
    mode: VideoMode,
    ports: Ports,
    reset: ResetSpec,
    frames: u32,
    periodicity_frames: u32,
    bounded: bool,
    state: SequencerState,
    pending: Option<Pending>,
    frame: u32,
    periods: u32,
    aligned_at: SimTime,
    line_origin: SimTime,
    frame_origin: SimTime,
    measurements: Vec<Measurement>,
}

impl FrameSequencer {
    /// Builds a sequencer for `config`, resolving its ports in `kernel`.
    ///
    /// The clock must already be running and every named port must exist.
    pub fn new(kernel: &SimKernel, config: &VerifyConfig) -> Result<Self, VerifyError> {
        config.mode.validate()?;
        if config.frames == 0 {
            return Err(VerifyError::InvalidRun(
                "at least one frame must be validated".to_string(),
            ));
        }
        let clock = kernel.clock_signal().ok_or_else(|| SimError::InvalidClock {
            reason: "no clock is running".to_string(),
        })?;
        let reset = match &config.reset.port {
            Some(name) => Some(kernel.signal(name)?),
            None => None,
        };
        let inputs = config
            .inputs
            .iter()
            .map(|(name, value)| Ok((kernel.signal(name)?, *value)))
            .collect::<Result<Vec<_>, SimError>>()?;

        Ok(Self {
            mode: config.mode.clone(),
            ports: Ports {
                clock,
                hsync: kernel.signal(&config.hsync)?,
                vsync: kernel.signal(&config.vsync)?,
                reset,
                inputs,
            },
            reset: config.reset.clone(),
            frames: config.frames,
            periodicity_frames: config.periodicity_frames,
            bounded: config.bound_waits,
            state: SequencerState::Reset,
            pending: None,
            frame: 0,
            periods: 0,
            aligned_at: SimTime::zero(),
            line_origin: SimTime::zero(),
            frame_origin: SimTime::zero(),
            measurements: Vec::new(),
        })
    }

    /// The current state.
    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// Checkpoints passed so far.
    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    fn wait(&mut self, pending: Pending, trigger: Trigger) -> Option<Trigger> {
        self.pending = Some(pending);
        Some(trigger)
    }

    fn measure(
        &mut self,
        cx: &TaskContext<'_>,
        interval: Interval,
        signal: SignalId,
        edge: Edge,
        expected: u64,
    ) -> Option<Trigger> {
        let wait = EdgeWait::begin(cx, interval, signal, edge, expected);
        let trigger = wait.trigger(self.ports.clock, self.bounded);
        debug!(%interval, expected, "Waiting for {edge} of {}", cx.signal_name(signal));
        self.wait(Pending::Measure(wait), trigger)
    }

    fn advance(&mut self, interval: Interval, cycles: u64) -> Option<Trigger> {
        let advance = Advance { interval, cycles };
        let trigger = advance.trigger(self.ports.clock);
        self.wait(Pending::Advance(advance), trigger)
    }

    /// Waits for the end of a pulse in progress, if any.
    ///
    /// A pulse end is not yet the frame origin; the caller finishes the
    /// alignment from there.
    fn align(&mut self, cx: &TaskContext<'_>, signal: SignalId, vertical: bool) -> Option<Trigger> {
        let polarity = if vertical {
            self.mode.vertical.polarity
        } else {
            self.mode.horizontal.polarity
        };
        let value = cx.value(signal);
        if value == polarity.idle_level() {
            return None;
        }
        debug!(
            signal = cx.signal_name(signal),
            %value,
            "Signal not idle, waiting for pulse end"
        );
        self.wait(
            Pending::Unmeasured,
            Trigger::Edge {
                signal,
                edge: polarity.pulse_end(),
            },
        )
    }

    /// Runs the entry action of the current state.
    ///
    /// Returns the trigger to suspend on, or `None` after moving to the
    /// next state without waiting.
    fn enter(&mut self, cx: &mut TaskContext<'_>) -> Option<Trigger> {
        let h = self.mode.horizontal;
        let v = self.mode.vertical;
        let (hsync, vsync) = (self.ports.hsync, self.ports.vsync);
        match self.state {
            SequencerState::Reset => {
                for &(signal, value) in &self.ports.inputs {
                    cx.drive(signal, value);
                }
                if let Some(rst) = self.ports.reset {
                    cx.drive(rst, self.reset.polarity.asserted_level());
                }
                debug!(cycles = self.reset.cycles, "Reset");
                let trigger = Trigger::cycles(self.ports.clock, self.reset.cycles);
                self.wait(Pending::Reset, trigger)
            }
            SequencerState::AlignVsync => {
                let trigger = self.align(cx, vsync, true);
                if trigger.is_none() {
                    self.state = SequencerState::AlignHsync;
                }
                trigger
            }
            SequencerState::AlignHsync => {
                let trigger = self.align(cx, hsync, false);
                if trigger.is_none() {
                    self.aligned(cx.now());
                }
                trigger
            }
            // The line is known after an hsync pulse but the frame is not.
            SequencerState::AlignFrameStart => {
                self.wait(Pending::Unmeasured, Trigger::Edge {
                    signal: vsync,
                    edge: v.polarity.pulse_end(),
                })
            }
            SequencerState::AlignBackPorch => {
                self.advance(Interval::VsyncBackPorch, self.mode.vsync_back_porch_cycles())
            }
            SequencerState::HsyncFrontPorch => {
                self.line_origin = cx.now();
                self.frame_origin = cx.now();
                let expected = self.mode.hsync_front_porch_cycles();
                self.measure(cx, Interval::HsyncFrontPorch, hsync, h.polarity.pulse_start(), expected)
            }
            SequencerState::HsyncPulse => {
                let expected = self.mode.hsync_pulse_cycles();
                self.measure(cx, Interval::HsyncPulse, hsync, h.polarity.pulse_end(), expected)
            }
            SequencerState::HsyncBackPorch => {
                self.advance(Interval::HsyncBackPorch, self.mode.hsync_back_porch_cycles())
            }
            SequencerState::VsyncFrontPorch => {
                let expected = self.mode.vsync_front_porch_cycles();
                self.measure(cx, Interval::VsyncFrontPorch, vsync, v.polarity.pulse_start(), expected)
            }
            SequencerState::VsyncPulse => {
                let expected = self.mode.vsync_pulse_cycles();
                self.measure(cx, Interval::VsyncPulse, vsync, v.polarity.pulse_end(), expected)
            }
            SequencerState::VsyncBackPorch => {
                self.advance(Interval::VsyncBackPorch, self.mode.vsync_back_porch_cycles())
            }
            SequencerState::FrameValidated => {
                self.frame += 1;
                info!(
                    frame = self.frame,
                    elapsed_ms = TimeUnit::Ms.convert(cx.now().fs - self.frame_origin.fs),
                    "Frame validated"
                );
                self.state = if self.frame < self.frames {
                    SequencerState::HsyncFrontPorch
                } else if self.periodicity_frames > 0 {
                    SequencerState::PeriodicAlignHsync
                } else {
                    SequencerState::Done
                };
                None
            }
            SequencerState::PeriodicAlignHsync => {
                self.wait(Pending::Unmeasured, Trigger::Edge {
                    signal: hsync,
                    edge: h.polarity.pulse_start(),
                })
            }
            SequencerState::PeriodicAlignVsync => {
                self.wait(Pending::Unmeasured, Trigger::Edge {
                    signal: vsync,
                    edge: v.polarity.pulse_start(),
                })
            }
            SequencerState::Periodicity => {
                let expected = self.mode.frame_cycles();
                self.measure(cx, Interval::FramePeriod, vsync, v.polarity.pulse_start(), expected)
            }
            SequencerState::TrailingVsyncEnd => {
                self.wait(Pending::Unmeasured, Trigger::Edge {
                    signal: vsync,
                    edge: v.polarity.pulse_end(),
                })
            }
            SequencerState::TrailingBackPorch => {
                self.advance(Interval::TrailingBackPorch, self.mode.trailing_back_porch_cycles())
            }
            SequencerState::Done => None,
        }
    }

    fn aligned(&mut self, now: SimTime) {
        self.aligned_at = now;
        self.state = SequencerState::HsyncFrontPorch;
        debug!(time = %now, "Phase aligned");
    }

    /// Completes the wait the task was suspended on and picks the next state.
    fn complete(
        &mut self,
        cx: &mut TaskContext<'_>,
        converter: &CycleConverter,
        pending: Pending,
    ) -> Result<(), VerifyError> {
        match pending {
            Pending::Reset => {
                if let Some(rst) = self.ports.reset {
                    cx.drive(rst, self.reset.polarity.released_level());
                }
                debug!(time = %cx.now(), "Reset released");
                self.state = SequencerState::AlignVsync;
            }
            Pending::Unmeasured => {
                self.state = match self.state {
                    SequencerState::AlignVsync | SequencerState::AlignFrameStart => {
                        SequencerState::AlignBackPorch
                    }
                    SequencerState::AlignHsync => SequencerState::AlignFrameStart,
                    SequencerState::PeriodicAlignHsync => SequencerState::PeriodicAlignVsync,
                    SequencerState::PeriodicAlignVsync => SequencerState::Periodicity,
                    _ => SequencerState::TrailingBackPorch,
                };
            }
            Pending::Measure(wait) => {
                let m = match wait.complete(cx, converter, cx.fired()) {
                    Ok(m) => m,
                    Err(err) => {
                        warn!(interval = %wait.interval, frame = self.frame + 1, "{err}");
                        return Err(err);
                    }
                };
                self.log_measurement(&m);
                self.measurements.push(m);
                self.state = match self.state {
                    SequencerState::HsyncFrontPorch => SequencerState::HsyncPulse,
                    SequencerState::HsyncPulse => SequencerState::HsyncBackPorch,
                    SequencerState::VsyncFrontPorch => SequencerState::VsyncPulse,
                    SequencerState::VsyncPulse => SequencerState::VsyncBackPorch,
                    _ => {
                        self.periods += 1;
                        if self.periods < self.periodicity_frames {
                            SequencerState::Periodicity
                        } else {
                            SequencerState::TrailingVsyncEnd
                        }
                    }
                };
            }
            Pending::Advance(advance) => {
                debug!(interval = %advance.interval, cycles = advance.cycles, "Advanced");
                if self.state == SequencerState::HsyncBackPorch {
                    info!(
                        line_us = TimeUnit::Us.convert(cx.now().fs - self.line_origin.fs),
                        "Line"
                    );
                }
                self.state = match self.state {
                    SequencerState::AlignBackPorch => SequencerState::AlignHsync,
                    SequencerState::HsyncBackPorch => SequencerState::VsyncFrontPorch,
                    SequencerState::VsyncBackPorch => SequencerState::FrameValidated,
                    _ => SequencerState::Done,
                };
            }
        }
        Ok(())
    }

    fn log_measurement(&self, m: &Measurement) {
        match m.interval {
            Interval::HsyncFrontPorch | Interval::HsyncPulse => info!(
                interval = %m.interval,
                cycles = m.observed,
                since_line_us = TimeUnit::Us.convert(m.time.fs - self.line_origin.fs),
                "Checkpoint passed"
            ),
            _ => info!(
                interval = %m.interval,
                cycles = m.observed,
                since_frame_ms = TimeUnit::Ms.convert(m.time.fs - self.frame_origin.fs),
                "Checkpoint passed"
            ),
        }
    }
}

impl Task for FrameSequencer {
    type Output = SequenceOutcome;
    type Error = VerifyError;

    fn resume(&mut self, cx: &mut TaskContext<'_>) -> Result<Step<SequenceOutcome>, VerifyError> {
        let converter = cx.converter().ok_or_else(|| SimError::InvalidClock {
            reason: "no clock is running".to_string(),
        })?;
        if let Some(pending) = self.pending.take() {
            self.complete(cx, &converter, pending)?;
        }
        loop {
            if self.state == SequencerState::Done {
                return Ok(Step::Done(SequenceOutcome {
                    measurements: std::mem::take(&mut self.measurements),
                    frames_validated: self.frame,
                    periodicity_frames: self.periods,
                    aligned_at: self.aligned_at,
                }));
            }
            if let Some(trigger) = self.enter(cx) {
                return Ok(Step::Wait(trigger));
            }
        }
    }
}
