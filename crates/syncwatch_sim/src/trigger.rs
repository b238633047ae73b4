//! Wake-up conditions a task can suspend on.
//!
//! A [`Trigger`] is a description; the kernel arms it into a stateful
//! predicate at the instant the task suspends and polls it after every delta
//! cycle until it fires. [`Trigger::First`] races several triggers and reports
//! the index of the winner; the losing branches are dropped with it.

use crate::signal::{Change, Edge, SignalId};
use crate::time::SimTime;

/// A condition that resumes a suspended task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// An edge on a signal.
    Edge {
        /// The observed signal.
        signal: SignalId,
        /// The edge kind.
        edge: Edge,
    },
    /// `count` rising edges of a clock signal. Zero fires immediately.
    ClockCycles {
        /// The clock signal.
        signal: SignalId,
        /// Number of rising edges to wait for.
        count: u64,
    },
    /// A fixed amount of simulated time. Zero fires immediately.
    Timer {
        /// Duration in femtoseconds.
        fs: u64,
    },
    /// Whichever branch fires first.
    First(Vec<Trigger>),
}

impl Trigger {
    /// Rising edge of `signal`.
    pub fn rising(signal: SignalId) -> Self {
        Trigger::Edge {
            signal,
            edge: Edge::Rising,
        }
    }

    /// Falling edge of `signal`.
    pub fn falling(signal: SignalId) -> Self {
        Trigger::Edge {
            signal,
            edge: Edge::Falling,
        }
    }

    /// `count` rising edges of `clock`.
    pub fn cycles(clock: SignalId, count: u64) -> Self {
        Trigger::ClockCycles {
            signal: clock,
            count,
        }
    }

    /// Race of `branches`.
    pub fn first(branches: Vec<Trigger>) -> Self {
        Trigger::First(branches)
    }
}

/// Which trigger fired, and when.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fired {
    /// Branch index for [`Trigger::First`]; 0 for every other trigger.
    pub index: usize,
    /// Simulated time at which the trigger fired.
    pub time: SimTime,
}

/// An armed trigger with its running state.
#[derive(Debug)]
pub(crate) enum Armed {
    Edge { signal: SignalId, edge: Edge },
    Cycles { signal: SignalId, remaining: u64 },
    Timer { deadline_fs: u64 },
    First(Vec<Armed>),
}

impl Armed {
    /// Arms `trigger` at simulated time `now_fs`.
    pub(crate) fn arm(trigger: &Trigger, now_fs: u64) -> Self {
        match trigger {
            Trigger::Edge { signal, edge } => Armed::Edge {
                signal: *signal,
                edge: *edge,
            },
            Trigger::ClockCycles { signal, count } => Armed::Cycles {
                signal: *signal,
                remaining: *count,
            },
            Trigger::Timer { fs } => Armed::Timer {
                deadline_fs: now_fs.saturating_add(*fs),
            },
            Trigger::First(branches) => {
                Armed::First(branches.iter().map(|b| Armed::arm(b, now_fs)).collect())
            }
        }
    }

    /// Branch index that is satisfied without advancing time, if any.
    pub(crate) fn ready(&self, now_fs: u64) -> Option<usize> {
        match self {
            Armed::Edge { .. } => None,
            Armed::Cycles { remaining, .. } => (*remaining == 0).then_some(0),
            Armed::Timer { deadline_fs } => (*deadline_fs <= now_fs).then_some(0),
            Armed::First(branches) => branches.iter().position(|b| b.ready(now_fs).is_some()),
        }
    }

    /// Timer deadlines the kernel must wake up for.
    pub(crate) fn deadlines(&self, out: &mut Vec<u64>) {
        match self {
            Armed::Timer { deadline_fs } => out.push(*deadline_fs),
            Armed::First(branches) => branches.iter().for_each(|b| b.deadlines(out)),
            Armed::Edge { .. } | Armed::Cycles { .. } => {}
        }
    }

    /// Feeds one delta cycle's changes; returns the firing branch index.
    ///
    /// Every branch of a race sees every delta, so a cycle counter keeps
    /// counting while another branch is still pending.
    pub(crate) fn poll(&mut self, now_fs: u64, changes: &[Change]) -> Option<usize> {
        match self {
            Armed::Edge { signal, edge } => changes
                .iter()
                .any(|c| c.is(*signal, *edge))
                .then_some(0),
            Armed::Cycles { signal, remaining } => {
                if changes.iter().any(|c| c.is(*signal, Edge::Rising)) {
                    *remaining = remaining.saturating_sub(1);
                }
                (*remaining == 0).then_some(0)
            }
            Armed::Timer { deadline_fs } => (now_fs >= *deadline_fs).then_some(0),
            Armed::First(branches) => {
                let mut winner = None;
                for (i, branch) in branches.iter_mut().enumerate() {
                    if branch.poll(now_fs, changes).is_some() && winner.is_none() {
                        winner = Some(i);
                    }
                }
                winner
            }
        }
    }
}
