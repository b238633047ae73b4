//! Video timing specifications.
//!
//! A [`VideoMode`] lists, per axis, the active, front porch, sync and back
//! porch intervals in that order. Horizontal intervals count clock cycles,
//! vertical intervals count lines. The checkpoint derivations turn a mode
//! into the exact cycle counts the frame sequencer asserts.

use serde::{Deserialize, Serialize};
use syncwatch_common::{Frequency, Logic};
use syncwatch_sim::Edge;

use crate::error::VerifyError;

/// Level of a sync pulse relative to its idle level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPolarity {
    /// Idle high, pulse low.
    #[default]
    Negative,
    /// Idle low, pulse high.
    Positive,
}

impl SyncPolarity {
    /// Level outside the pulse.
    pub fn idle_level(self) -> Logic {
        match self {
            SyncPolarity::Negative => Logic::One,
            SyncPolarity::Positive => Logic::Zero,
        }
    }

    /// Level during the pulse.
    pub fn active_level(self) -> Logic {
        !self.idle_level()
    }

    /// The edge that starts a pulse.
    pub fn pulse_start(self) -> Edge {
        match self {
            SyncPolarity::Negative => Edge::Falling,
            SyncPolarity::Positive => Edge::Rising,
        }
    }

    /// The edge that ends a pulse.
    pub fn pulse_end(self) -> Edge {
        self.pulse_start().complement()
    }

    /// The level for "inside the pulse" or not.
    pub fn level(self, active: bool) -> Logic {
        if active {
            self.active_level()
        } else {
            self.idle_level()
        }
    }

    /// `-` or `+`, as mode tables write it.
    pub fn sign(self) -> char {
        match self {
            SyncPolarity::Negative => '-',
            SyncPolarity::Positive => '+',
        }
    }
}

/// Intervals of one axis in scan order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisTiming {
    /// Visible interval.
    pub active: u64,
    /// Blanking before the sync pulse.
    pub front_porch: u64,
    /// Sync pulse width.
    pub sync: u64,
    /// Blanking after the sync pulse.
    pub back_porch: u64,
    /// Sync pulse polarity.
    #[serde(default)]
    pub polarity: SyncPolarity,
}

impl AxisTiming {
    /// Builds an axis from its four intervals.
    pub const fn new(
        active: u64,
        front_porch: u64,
        sync: u64,
        back_porch: u64,
        polarity: SyncPolarity,
    ) -> Self {
        Self {
            active,
            front_porch,
            sync,
            back_porch,
            polarity,
        }
    }

    /// Sum of all four intervals, or `None` on overflow.
    pub fn checked_total(&self) -> Option<u64> {
        self.active
            .checked_add(self.front_porch)?
            .checked_add(self.sync)?
            .checked_add(self.back_porch)
    }

    /// Sum of all four intervals. Saturates on overflow; run
    /// [`VideoMode::validate`] first.
    pub fn total(&self) -> u64 {
        self.checked_total().unwrap_or(u64::MAX)
    }

    /// Offset of the sync pulse from the start of the axis.
    pub fn sync_start(&self) -> u64 {
        self.active.saturating_add(self.front_porch)
    }

    /// `(name, length)` for each interval in scan order.
    pub fn intervals(&self) -> [(&'static str, u64); 4] {
        [
            ("active", self.active),
            ("front porch", self.front_porch),
            ("sync", self.sync),
            ("back porch", self.back_porch),
        ]
    }
}

/// Levels of both sync outputs at one counter position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncLevels {
    /// Horizontal sync level.
    pub hsync: Logic,
    /// Vertical sync level.
    pub vsync: Logic,
}

/// A complete video timing specification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoMode {
    /// Mode name used in logs and reports.
    pub name: String,
    /// Nominal pixel clock, used when no clock period is configured.
    #[serde(default)]
    pub pixel_clock: Option<Frequency>,
    /// Horizontal intervals in clock cycles.
    pub horizontal: AxisTiming,
    /// Vertical intervals in lines.
    pub vertical: AxisTiming,
}

const BUILTIN_NAMES: [&str; 3] = ["vga_640x480_60", "svga_800x600_60", "xga_1024x768_60"];

impl VideoMode {
    /// Creates a mode without a nominal pixel clock.
    pub fn new(name: impl Into<String>, horizontal: AxisTiming, vertical: AxisTiming) -> Self {
        Self {
            name: name.into(),
            pixel_clock: None,
            horizontal,
            vertical,
        }
    }

    /// Names accepted by [`VideoMode::builtin`].
    pub fn builtin_names() -> &'static [&'static str] {
        &BUILTIN_NAMES
    }

    /// All built-in modes.
    pub fn builtins() -> Vec<VideoMode> {
        BUILTIN_NAMES
            .iter()
            .filter_map(|name| Self::builtin(name))
            .collect()
    }

    /// Looks up a built-in mode by name.
    pub fn builtin(name: &str) -> Option<VideoMode> {
        use SyncPolarity::{Negative, Positive};
        let (clock_hz, h, v) = match name {
            "vga_640x480_60" => (
                25_175_000.0,
                AxisTiming::new(640, 16, 96, 48, Negative),
                AxisTiming::new(480, 10, 2, 33, Negative),
            ),
            "svga_800x600_60" => (
                40_000_000.0,
                AxisTiming::new(800, 40, 128, 88, Positive),
                AxisTiming::new(600, 1, 4, 23, Positive),
            ),
            "xga_1024x768_60" => (
                65_000_000.0,
                AxisTiming::new(1024, 24, 136, 160, Negative),
                AxisTiming::new(768, 3, 6, 29, Negative),
            ),
            _ => return None,
        };
        Some(Self {
            name: name.to_string(),
            pixel_clock: Some(Frequency::new(clock_hz)),
            horizontal: h,
            vertical: v,
        })
    }

    /// Checks that the mode can be generated and measured.
    ///
    /// Both sync pulses must be at least one unit wide, the horizontal pulse
    /// must not start at offset zero, and the vertical pulse must start late
    /// enough that the first frame checkpoint is a positive interval.
    pub fn validate(&self) -> Result<(), VerifyError> {
        let invalid = |reason: String| VerifyError::InvalidMode {
            mode: self.name.clone(),
            reason,
        };
        let h = &self.horizontal;
        let v = &self.vertical;

        let line = h
            .checked_total()
            .ok_or_else(|| invalid("horizontal total overflows".into()))?;
        let lines = v
            .checked_total()
            .ok_or_else(|| invalid("vertical total overflows".into()))?;
        line.checked_mul(lines)
            .ok_or_else(|| invalid("frame length overflows".into()))?;

        if h.sync == 0 {
            return Err(invalid("horizontal sync width is zero".into()));
        }
        if v.sync == 0 {
            return Err(invalid("vertical sync width is zero".into()));
        }
        if h.sync_start() == 0 {
            return Err(invalid(
                "horizontal sync starts at offset zero (active + front porch must be at least 1)"
                    .into(),
            ));
        }
        let lead = (v.sync_start().saturating_sub(1)) * line;
        if lead <= h.sync + h.back_porch {
            return Err(invalid(format!(
                "vertical sync starts too early: {} lines of active + front porch leave no \
                 interval before the pulse",
                v.sync_start()
            )));
        }
        Ok(())
    }

    /// Line length `L` in clock cycles.
    pub fn line_cycles(&self) -> u64 {
        self.horizontal.total()
    }

    /// Frame length in lines.
    pub fn frame_lines(&self) -> u64 {
        self.vertical.total()
    }

    /// Frame length in clock cycles.
    pub fn frame_cycles(&self) -> u64 {
        self.line_cycles().saturating_mul(self.frame_lines())
    }

    /// Cycles from the start of a line to the hsync pulse start (`HS`).
    pub fn hsync_front_porch_cycles(&self) -> u64 {
        self.horizontal.sync_start()
    }

    /// Width of the hsync pulse.
    pub fn hsync_pulse_cycles(&self) -> u64 {
        self.horizontal.sync
    }

    /// Cycles from hsync pulse end to the next line start.
    pub fn hsync_back_porch_cycles(&self) -> u64 {
        self.horizontal.back_porch
    }

    /// Cycles from the second line start to the vsync pulse start:
    /// `(VS - 1) * L - h.sync - h.back_porch`.
    pub fn vsync_front_porch_cycles(&self) -> u64 {
        let h = &self.horizontal;
        (self.vertical.sync_start().saturating_sub(1) * self.line_cycles())
            .saturating_sub(h.sync + h.back_porch)
    }

    /// Width of the vsync pulse in cycles.
    pub fn vsync_pulse_cycles(&self) -> u64 {
        self.vertical.sync * self.line_cycles()
    }

    /// Cycles from vsync pulse end back to the frame origin:
    /// `v.back_porch * L + h.sync + h.back_porch`.
    pub fn vsync_back_porch_cycles(&self) -> u64 {
        let h = &self.horizontal;
        self.vertical.back_porch * self.line_cycles() + h.sync + h.back_porch
    }

    /// Trailing settle after the last periodicity check.
    pub fn trailing_back_porch_cycles(&self) -> u64 {
        self.vertical.back_porch * self.line_cycles()
    }

    /// Sync levels at counter position `p`, where `p = 0` is the first
    /// cycle of the first active line.
    ///
    /// The vertical position ticks over at the leading edge of hsync, so
    /// vsync changes on the same cycle as an hsync pulse start.
    pub fn sync_levels(&self, p: u64) -> SyncLevels {
        let h = &self.horizontal;
        let v = &self.vertical;
        let line = self.line_cycles();
        let lines = self.frame_lines();
        let p = p % self.frame_cycles();
        let x = p % line;
        let y = p / line;

        let hs = h.sync_start();
        let hsync_active = x >= hs && x < hs + h.sync;

        let vpos = if x >= hs { (y + 1) % lines } else { y };
        let vs = v.sync_start();
        let vsync_active = vpos >= vs && vpos < vs + v.sync;

        SyncLevels {
            hsync: h.polarity.level(hsync_active),
            vsync: v.polarity.level(vsync_active),
        }
    }
}
