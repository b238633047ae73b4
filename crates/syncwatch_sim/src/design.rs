//! The boundary between the kernel and a design under test.
//!
//! A [`Design`] declares its ports, binds them to kernel signals once, and is
//! then called on every rising edge of the kernel clock. Values it drives
//! through [`DesignIo`] land in the next delta cycle, giving registered
//! (non-blocking) output semantics.

use std::collections::HashMap;

use syncwatch_common::Logic;

use crate::error::SimError;
use crate::signal::{SignalId, SignalState};
use crate::time::SimTime;

/// Direction of a design port as seen from the design.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortDirection {
    /// Driven by the testbench (reset, enables).
    Input,
    /// Driven by the design (hsync, vsync).
    Output,
}

/// A port declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortDecl {
    /// Port name, shared with the kernel signal namespace.
    pub name: String,
    /// Port direction.
    pub direction: PortDirection,
    /// Value before anything drives it.
    pub init: Logic,
}

impl PortDecl {
    /// Declares an input port.
    pub fn input(name: impl Into<String>, init: Logic) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Input,
            init,
        }
    }

    /// Declares an output port.
    pub fn output(name: impl Into<String>, init: Logic) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Output,
            init,
        }
    }
}

/// Port name to kernel signal mapping handed to [`Design::bind`].
#[derive(Debug, Default)]
pub struct PortMap {
    ports: HashMap<String, SignalId>,
}

impl PortMap {
    pub(crate) fn insert(&mut self, name: &str, id: SignalId) {
        self.ports.insert(name.to_string(), id);
    }

    /// Resolves a declared port to its signal.
    pub fn get(&self, name: &str) -> Result<SignalId, SimError> {
        self.ports
            .get(name)
            .copied()
            .ok_or_else(|| SimError::UnknownSignal {
                name: name.to_string(),
            })
    }
}

/// A value a design asked the kernel to apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PendingDrive {
    pub(crate) signal: SignalId,
    pub(crate) value: Logic,
    /// Absolute time, or `None` for the next delta cycle.
    pub(crate) at_fs: Option<u64>,
}

/// Read and drive access to signals during a design callback.
pub struct DesignIo<'a> {
    pub(crate) signals: &'a [SignalState],
    pub(crate) pending: &'a mut Vec<PendingDrive>,
    pub(crate) now: SimTime,
}

impl DesignIo<'_> {
    /// Current value of `signal`.
    pub fn read(&self, signal: SignalId) -> Logic {
        self.signals[signal.index()].value
    }

    /// Drives `signal` to `value` in the next delta cycle.
    pub fn drive(&mut self, signal: SignalId, value: Logic) {
        self.pending.push(PendingDrive {
            signal,
            value,
            at_fs: None,
        });
    }

    /// Drives `signal` to `value` at absolute time `at_fs`.
    ///
    /// Times at or before now collapse to the next delta cycle.
    pub fn drive_at(&mut self, signal: SignalId, value: Logic, at_fs: u64) {
        self.pending.push(PendingDrive {
            signal,
            value,
            at_fs: Some(at_fs),
        });
    }

    /// The current simulation time.
    pub fn now(&self) -> SimTime {
        self.now
    }
}

/// A design under test, observed only through its ports.
pub trait Design {
    /// Instance name used in logs and waveforms.
    fn name(&self) -> &str;

    /// Ports to allocate in the kernel. Names already present (such as the
    /// clock) are shared rather than duplicated.
    fn ports(&self) -> Vec<PortDecl>;

    /// Stores the signal IDs for the declared ports.
    fn bind(&mut self, ports: &PortMap) -> Result<(), SimError>;

    /// Called once after binding; may pre-schedule stimulus with
    /// [`DesignIo::drive_at`].
    fn initialize(&mut self, _io: &mut DesignIo<'_>) -> Result<(), SimError> {
        Ok(())
    }

    /// Called on every rising edge of the kernel clock, before any task
    /// waiting on that edge is resumed.
    fn on_clock(&mut self, io: &mut DesignIo<'_>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_decls() {
        let rst = PortDecl::input("rst_n", Logic::X);
        assert_eq!(rst.direction, PortDirection::Input);
        let hs = PortDecl::output("hsync", Logic::One);
        assert_eq!(hs.direction, PortDirection::Output);
        assert_eq!(hs.init, Logic::One);
    }

    #[test]
    fn port_map_lookup() {
        let mut map = PortMap::default();
        map.insert("hsync", SignalId::from_raw(4));
        assert_eq!(map.get("hsync").unwrap(), SignalId::from_raw(4));
        assert!(matches!(
            map.get("vsync"),
            Err(SimError::UnknownSignal { .. })
        ));
    }

    #[test]
    fn io_reads_and_queues_drives() {
        let signals = vec![SignalState::new("a", Logic::One)];
        let mut pending = Vec::new();
        let mut io = DesignIo {
            signals: &signals,
            pending: &mut pending,
            now: SimTime::from_fs(10),
        };
        let a = SignalId::from_raw(0);
        assert_eq!(io.read(a), Logic::One);
        assert_eq!(io.now().fs, 10);
        io.drive(a, Logic::Zero);
        io.drive_at(a, Logic::One, 50);
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].at_fs, None);
        assert_eq!(pending[1].at_fs, Some(50));
    }
}
