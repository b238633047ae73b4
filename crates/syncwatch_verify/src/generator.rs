//! Behavioural reference model of a sync generator.
//!
//! [`SyncGenerator`] is what a video timing core looks like from its pins:
//! one frame counter that clears while reset is asserted and otherwise
//! advances on every rising clock edge, with both sync outputs decoded from
//! it. The mode it generates may differ from the mode being verified, which
//! is how timing faults are injected.

use syncwatch_common::Logic;
use syncwatch_sim::{Design, DesignIo, PortDecl, PortMap, SignalId, SimError};

use crate::mode::{SyncLevels, VideoMode};
use crate::ResetPolarity;

#[derive(Clone, Copy, Debug)]
struct Bound {
    hsync: SignalId,
    vsync: SignalId,
    reset: Option<SignalId>,
}

/// A sync generator driven by a [`VideoMode`].
#[derive(Debug)]
pub struct SyncGenerator {
    mode: VideoMode,
    hsync_port: String,
    vsync_port: String,
    reset: Option<(String, ResetPolarity)>,
    bound: Option<Bound>,
    position: u64,
    primed: bool,
    driven: Option<SyncLevels>,
}

impl SyncGenerator {
    /// A generator for `mode` on ports `hsync`/`vsync`, reset by active-low `rst_n`.
    pub fn new(mode: VideoMode) -> Self {
        Self {
            mode,
            hsync_port: "hsync".to_string(),
            vsync_port: "vsync".to_string(),
            reset: Some(("rst_n".to_string(), ResetPolarity::ActiveLow)),
            bound: None,
            position: 0,
            primed: false,
            driven: None,
        }
    }

    /// Renames the sync output ports.
    pub fn with_ports(mut self, hsync: impl Into<String>, vsync: impl Into<String>) -> Self {
        self.hsync_port = hsync.into();
        self.vsync_port = vsync.into();
        self
    }

    /// Sets the reset input, or removes it so the counter runs from the first edge.
    pub fn with_reset(mut self, reset: Option<(String, ResetPolarity)>) -> Self {
        self.reset = reset;
        self
    }

    /// The generated mode.
    pub fn mode(&self) -> &VideoMode {
        &self.mode
    }

    /// Counter position after the most recent clock edge.
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl Design for SyncGenerator {
    fn name(&self) -> &str {
        "sync_generator"
    }

    fn ports(&self) -> Vec<PortDecl> {
        let mut ports = vec![
            PortDecl::output(&self.hsync_port, Logic::X),
            PortDecl::output(&self.vsync_port, Logic::X),
        ];
        if let Some((name, _)) = &self.reset {
            ports.push(PortDecl::input(name, Logic::X));
        }
        ports
    }

    fn bind(&mut self, ports: &PortMap) -> Result<(), SimError> {
        let reset = match &self.reset {
            Some((name, _)) => Some(ports.get(name)?),
            None => None,
        };
        self.bound = Some(Bound {
            hsync: ports.get(&self.hsync_port)?,
            vsync: ports.get(&self.vsync_port)?,
            reset,
        });
        Ok(())
    }

    fn on_clock(&mut self, io: &mut DesignIo<'_>) {
        let Some(bound) = self.bound else { return };

        // Anything but the released level, X included, holds the counter.
        let in_reset = match (bound.reset, &self.reset) {
            (Some(rst), Some((_, polarity))) => io.read(rst) != polarity.released_level(),
            _ => false,
        };

        if in_reset || !self.primed {
            self.position = 0;
            self.primed = true;
        } else {
            self.position = (self.position + 1) % self.mode.frame_cycles();
        }

        let levels = self.mode.sync_levels(self.position);
        let previous = self.driven.replace(levels);
        if previous.map(|p| p.hsync) != Some(levels.hsync) {
            io.drive(bound.hsync, levels.hsync);
        }
        if previous.map(|p| p.vsync) != Some(levels.vsync) {
            io.drive(bound.vsync, levels.vsync);
        }
    }
}
