//! Simulated instants.
//!
//! A [`SimTime`] is a femtosecond timestamp plus a delta index. Deltas order
//! the cascade of changes that happen at one instant: a clock edge at delta 0,
//! the flops it triggers at delta 1, a checker reacting to them at delta 2.
//! Elapsed time only ever looks at `fs`.

use serde::{Deserialize, Serialize};
use std::fmt;

pub use syncwatch_common::{FS_PER_MS, FS_PER_NS, FS_PER_PS, FS_PER_S, FS_PER_US};

/// An instant in the simulation.
///
/// The derived ordering compares `fs` first, then `delta`, which is the
/// order the kernel processes events in.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SimTime {
    /// Femtoseconds since the start of the run.
    pub fs: u64,
    /// Position in the cascade of changes at this instant.
    pub delta: u32,
}

impl SimTime {
    /// Start of the run.
    pub fn zero() -> Self {
        Self::default()
    }

    /// `fs` femtoseconds in, at delta 0.
    pub fn from_fs(fs: u64) -> Self {
        Self { fs, delta: 0 }
    }

    /// `ns` nanoseconds in, at delta 0.
    pub fn from_ns(ns: u64) -> Self {
        Self::from_fs(ns * FS_PER_NS)
    }

    /// The following delta at the same instant.
    pub fn next_delta(&self) -> Self {
        Self {
            delta: self.delta + 1,
            ..*self
        }
    }

    /// Femtoseconds from `earlier` to `self`, saturating at zero.
    pub fn fs_since(&self, earlier: SimTime) -> u64 {
        self.fs.saturating_sub(earlier.fs)
    }

    /// This instant expressed in `unit`, fraction kept.
    pub fn in_unit(&self, unit: TimeUnit) -> f64 {
        unit.convert(self.fs)
    }
}

impl fmt::Display for SimTime {
    /// Prints in the largest unit that divides the timestamp evenly, so
    /// `39722 ps` rather than `39.722 ns`, followed by `+dN` past delta 0.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = TimeUnit::LARGEST_FIRST
            .into_iter()
            .find(|u| self.fs >= u.fs_per_unit() && self.fs % u.fs_per_unit() == 0)
            .unwrap_or(TimeUnit::Fs);
        write!(f, "{} {unit}", self.fs / unit.fs_per_unit())?;
        if self.delta != 0 {
            write!(f, "+d{}", self.delta)?;
        }
        Ok(())
    }
}

/// Units for diagnostics and waveform timescales. Checks never use them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// 1 fs, the kernel resolution.
    Fs,
    /// 10^3 fs.
    Ps,
    /// 10^6 fs.
    Ns,
    /// 10^9 fs.
    Us,
    /// 10^12 fs.
    Ms,
    /// 10^15 fs.
    S,
}

impl TimeUnit {
    /// Units tried when displaying a [`SimTime`], largest first.
    const LARGEST_FIRST: [TimeUnit; 4] = [TimeUnit::Ms, TimeUnit::Us, TimeUnit::Ns, TimeUnit::Ps];

    /// Size of one unit in femtoseconds.
    pub fn fs_per_unit(self) -> u64 {
        match self {
            Self::Fs => 1,
            Self::Ps => FS_PER_PS,
            Self::Ns => FS_PER_NS,
            Self::Us => FS_PER_US,
            Self::Ms => FS_PER_MS,
            Self::S => FS_PER_S,
        }
    }

    /// A femtosecond count in this unit.
    pub fn convert(self, fs: u64) -> f64 {
        fs as f64 / self.fs_per_unit() as f64
    }

    /// Suffix as written in VCD `$timescale` and log fields.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Fs => "fs",
            Self::Ps => "ps",
            Self::Ns => "ns",
            Self::Us => "us",
            Self::Ms => "ms",
            Self::S => "s",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_order_within_an_instant() {
        let edge = SimTime::from_ns(5);
        let flop = edge.next_delta();
        assert_eq!(flop.fs, edge.fs);
        assert_eq!(flop.next_delta().delta, 2);
        assert!(edge < flop);
        assert!(SimTime { fs: 200, delta: 0 } > SimTime { fs: 100, delta: 99 });
        assert_eq!(SimTime::default(), SimTime::zero());
    }

    #[test]
    fn elapsed_ignores_delta() {
        let start = SimTime { fs: 1_000, delta: 3 };
        let end = SimTime { fs: 4_000, delta: 0 };
        assert_eq!(end.fs_since(start), 3_000);
        assert_eq!(start.fs_since(end), 0);
    }

    #[test]
    fn display_picks_exact_unit() {
        assert_eq!(SimTime::zero().to_string(), "0 fs");
        assert_eq!(SimTime::from_ns(10).to_string(), "10 ns");
        assert_eq!(SimTime::from_fs(5 * FS_PER_US).to_string(), "5 us");
        assert_eq!(SimTime::from_fs(2 * FS_PER_MS).to_string(), "2 ms");
        // One VGA pixel clock period.
        assert_eq!(SimTime::from_fs(39_722_000).to_string(), "39722 ps");
        assert_eq!(SimTime::from_fs(1500).to_string(), "1500 fs");
        assert_eq!(SimTime { fs: FS_PER_NS, delta: 3 }.to_string(), "1 ns+d3");
    }

    #[test]
    fn line_and_frame_in_diagnostic_units() {
        // 800 cycles at 39.722 ns, and 420000 cycles at 39.722 ns.
        let line = SimTime::from_fs(31_777_600_000);
        assert!((line.in_unit(TimeUnit::Us) - 31.7776).abs() < 1e-9);
        assert!((TimeUnit::Ms.convert(16_683_240_000_000) - 16.68324).abs() < 1e-9);
        assert_eq!(TimeUnit::Ns.to_string(), "ns");
    }

    #[test]
    fn serializes_both_fields() {
        let t = SimTime { fs: 12345, delta: 7 };
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, r#"{"fs":12345,"delta":7}"#);
        assert_eq!(serde_json::from_str::<SimTime>(&json).unwrap(), t);
    }
}
