//! Signal identifiers, per-signal state, and edge classification.
//!
//! Every pin the kernel knows about (the clock, DUT inputs and outputs) is a
//! single-bit [`SignalState`] addressed by a flat [`SignalId`]. A value change
//! applied in a delta cycle is reported as a [`Change`], from which rising and
//! falling [`Edge`]s are derived.

use std::fmt;

use serde::{Deserialize, Serialize};
use syncwatch_common::Logic;

use crate::time::SimTime;

/// Opaque ID for a kernel signal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct SignalId(u32);

impl SignalId {
    /// Creates a `SignalId` from a raw index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A transition kind observed on a single-bit signal.
///
/// A rising edge is any transition *into* `1` and a falling edge is any
/// transition *into* `0`, so `X -> 1` counts as rising. This matches how a
/// testbench sees the first driven value after an unknown start-up state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    /// Transition into `1`.
    Rising,
    /// Transition into `0`.
    Falling,
    /// Any value change.
    Any,
}

impl Edge {
    /// Returns `true` if the transition `previous -> value` is this edge.
    pub fn matches(self, previous: Logic, value: Logic) -> bool {
        if previous == value {
            return false;
        }
        match self {
            Edge::Rising => value == Logic::One,
            Edge::Falling => value == Logic::Zero,
            Edge::Any => true,
        }
    }

    /// The edge that leads into the opposite level.
    pub fn complement(self) -> Self {
        match self {
            Edge::Rising => Edge::Falling,
            Edge::Falling => Edge::Rising,
            Edge::Any => Edge::Any,
        }
    }

    /// The level a signal holds right after this edge, if determined.
    pub fn target_level(self) -> Option<Logic> {
        match self {
            Edge::Rising => Some(Logic::One),
            Edge::Falling => Some(Logic::Zero),
            Edge::Any => None,
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Rising => f.write_str("rising edge"),
            Edge::Falling => f.write_str("falling edge"),
            Edge::Any => f.write_str("any edge"),
        }
    }
}

/// Runtime state of one kernel signal.
#[derive(Clone, Debug)]
pub struct SignalState {
    /// Flat name, also used in waveform output.
    pub name: String,
    /// Current value.
    pub value: Logic,
    /// Value before the most recent change.
    pub previous: Logic,
    /// When the most recent change was applied.
    pub last_change: SimTime,
}

impl SignalState {
    /// Creates a signal holding `init` since time zero.
    pub fn new(name: impl Into<String>, init: Logic) -> Self {
        Self {
            name: name.into(),
            value: init,
            previous: init,
            last_change: SimTime::zero(),
        }
    }
}

/// A value change applied in one delta cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Change {
    /// The signal that changed.
    pub signal: SignalId,
    /// Its value before the delta.
    pub previous: Logic,
    /// Its value after the delta.
    pub value: Logic,
}

impl Change {
    /// Returns `true` if this change is `edge` on `signal`.
    pub fn is(&self, signal: SignalId, edge: Edge) -> bool {
        self.signal == signal && edge.matches(self.previous, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncwatch_common::Logic::*;

    #[test]
    fn signal_id_roundtrip() {
        let id = SignalId::from_raw(7);
        assert_eq!(id.as_raw(), 7);
        assert_eq!(id.index(), 7);
    }

    #[test]
    fn rising_edges() {
        assert!(Edge::Rising.matches(Zero, One));
        assert!(Edge::Rising.matches(X, One));
        assert!(Edge::Rising.matches(Z, One));
        assert!(!Edge::Rising.matches(One, One));
        assert!(!Edge::Rising.matches(Zero, X));
        assert!(!Edge::Rising.matches(One, Zero));
    }

    #[test]
    fn falling_edges() {
        assert!(Edge::Falling.matches(One, Zero));
        assert!(Edge::Falling.matches(X, Zero));
        assert!(!Edge::Falling.matches(Zero, Zero));
        assert!(!Edge::Falling.matches(One, X));
    }

    #[test]
    fn any_edge_requires_change() {
        assert!(Edge::Any.matches(Zero, X));
        assert!(!Edge::Any.matches(Z, Z));
    }

    #[test]
    fn complement_and_target() {
        assert_eq!(Edge::Rising.complement(), Edge::Falling);
        assert_eq!(Edge::Falling.complement(), Edge::Rising);
        assert_eq!(Edge::Rising.target_level(), Some(One));
        assert_eq!(Edge::Falling.target_level(), Some(Zero));
        assert_eq!(Edge::Any.target_level(), None);
    }

    #[test]
    fn change_matches_signal_and_edge() {
        let hsync = SignalId::from_raw(2);
        let vsync = SignalId::from_raw(3);
        let c = Change {
            signal: hsync,
            previous: One,
            value: Zero,
        };
        assert!(c.is(hsync, Edge::Falling));
        assert!(!c.is(hsync, Edge::Rising));
        assert!(!c.is(vsync, Edge::Falling));
    }

    #[test]
    fn new_signal_state() {
        let s = SignalState::new("vsync", One);
        assert_eq!(s.value, One);
        assert_eq!(s.previous, One);
        assert_eq!(s.last_change, SimTime::zero());
    }

    #[test]
    fn edge_display() {
        assert_eq!(Edge::Falling.to_string(), "falling edge");
    }
}
