//! Cooperative tasks driven by the kernel scheduler.
//!
//! A [`Task`] is an explicit state machine. Each call to [`Task::resume`]
//! runs until the task needs to wait, then returns [`Step::Wait`] with the
//! trigger to suspend on. The kernel advances simulated time and calls
//! `resume` again in the delta cycle where that trigger fires; the task never
//! polls. Only one task runs at a time.

use syncwatch_common::Logic;

use crate::clock::CycleConverter;
use crate::error::SimError;
use crate::kernel::SimKernel;
use crate::signal::SignalId;
use crate::time::SimTime;
use crate::trigger::{Fired, Trigger};

/// What a task wants after a resume.
#[derive(Debug)]
pub enum Step<T> {
    /// Suspend until the trigger fires.
    Wait(Trigger),
    /// The task finished with this output.
    Done(T),
}

/// A cooperative task run by [`SimKernel::run_task`].
pub trait Task {
    /// Value produced on completion.
    type Output;
    /// Error type; kernel errors (stalls, watchdog) convert into it.
    type Error: From<SimError>;

    /// Advances the task until it must wait or is done.
    fn resume(&mut self, cx: &mut TaskContext<'_>) -> Result<Step<Self::Output>, Self::Error>;
}

/// The view of the kernel a task gets while it runs.
pub struct TaskContext<'k> {
    pub(crate) kernel: &'k mut SimKernel,
    pub(crate) fired: Option<Fired>,
}

impl TaskContext<'_> {
    /// The current simulation time.
    pub fn now(&self) -> SimTime {
        self.kernel.current_time()
    }

    /// Current value of `signal`.
    pub fn value(&self, signal: SignalId) -> Logic {
        self.kernel.signal_value(signal)
    }

    /// Name of `signal`.
    pub fn signal_name(&self, signal: SignalId) -> &str {
        self.kernel.signal_name(signal)
    }

    /// Drives `signal` to `value` in the next delta cycle.
    pub fn drive(&mut self, signal: SignalId, value: Logic) {
        self.kernel.drive(signal, value);
    }

    /// The trigger that woke this resume, or `None` on the first call.
    pub fn fired(&self) -> Option<Fired> {
        self.fired
    }

    /// Converter for the running clock, if one is started.
    pub fn converter(&self) -> Option<CycleConverter> {
        self.kernel.clock().map(|c| c.converter())
    }

    /// Resolves a signal by name.
    pub fn signal(&self, name: &str) -> Result<SignalId, SimError> {
        self.kernel.signal(name)
    }
}
