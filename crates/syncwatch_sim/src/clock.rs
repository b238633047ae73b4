//! The free-running reference clock and time/cycle conversion.
//!
//! A [`Clock`] fixes the period for the whole run. Once started by the kernel
//! it rises at `t = 0` and then every `period_fs`, staying high for
//! [`Clock::high_fs`] of each period. [`CycleConverter`] turns absolute or
//! elapsed simulated time into clock periods for measurements.

use syncwatch_common::Frequency;

use crate::error::SimError;
use crate::time::{SimTime, TimeUnit};

/// A periodic reference clock with a fixed period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Clock {
    period_fs: u64,
    high_fs: u64,
}

impl Clock {
    /// Creates a clock with the given period and a 50% duty cycle.
    ///
    /// Odd periods spend the extra femtosecond in the low phase.
    pub fn new(period_fs: u64) -> Result<Self, SimError> {
        if period_fs < 2 {
            return Err(SimError::InvalidClock {
                reason: format!("period of {period_fs} fs is too short to toggle"),
            });
        }
        Ok(Self {
            period_fs,
            high_fs: period_fs / 2,
        })
    }

    /// Creates a clock from a frequency, rounding the period to whole femtoseconds.
    pub fn from_frequency(frequency: Frequency) -> Result<Self, SimError> {
        let period = frequency.period_fs().ok_or_else(|| SimError::InvalidClock {
            reason: format!("frequency {frequency} has no representable period"),
        })?;
        Self::new(period)
    }

    /// The clock period in femtoseconds.
    pub fn period_fs(&self) -> u64 {
        self.period_fs
    }

    /// Duration of the high phase.
    pub fn high_fs(&self) -> u64 {
        self.high_fs
    }

    /// Duration of the low phase.
    pub fn low_fs(&self) -> u64 {
        self.period_fs - self.high_fs
    }

    /// The clock frequency.
    pub fn frequency(&self) -> Frequency {
        Frequency::from_period_fs(self.period_fs)
    }

    /// A converter bound to this clock's period.
    pub fn converter(&self) -> CycleConverter {
        CycleConverter {
            period_fs: self.period_fs,
        }
    }
}

/// Converts simulated time into clock periods and human-scale units.
///
/// All conversions are pure functions of the instant and the period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleConverter {
    period_fs: u64,
}

impl CycleConverter {
    /// The period this converter divides by.
    pub fn period_fs(&self) -> u64 {
        self.period_fs
    }

    /// The instant `time` expressed as elapsed clock periods since zero.
    pub fn cycles_at(&self, time: SimTime) -> f64 {
        time.fs as f64 / self.period_fs as f64
    }

    /// Clock periods elapsed between two instants.
    ///
    /// Computed from the integer femtosecond difference, so clock-aligned
    /// instants always give an exact whole number.
    pub fn elapsed_cycles(&self, from: SimTime, to: SimTime) -> f64 {
        let delta = to.fs.saturating_sub(from.fs);
        let whole = delta / self.period_fs;
        let rest = delta % self.period_fs;
        whole as f64 + rest as f64 / self.period_fs as f64
    }

    /// Whole clock periods between two instants, or `None` if they are not
    /// an exact multiple of the period apart.
    pub fn whole_cycles(&self, from: SimTime, to: SimTime) -> Option<u64> {
        let delta = to.fs.checked_sub(from.fs)?;
        (delta % self.period_fs == 0).then_some(delta / self.period_fs)
    }

    /// Duration of `cycles` clock periods in femtoseconds.
    pub fn cycles_to_fs(&self, cycles: u64) -> u64 {
        cycles.saturating_mul(self.period_fs)
    }

    /// The instant `time` in a coarser unit, for diagnostics only.
    pub fn to_unit(&self, time: SimTime, unit: TimeUnit) -> f64 {
        unit.convert(time.fs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VGA_PERIOD_FS: u64 = 39_722_000;

    #[test]
    fn duty_cycle() {
        let clk = Clock::new(VGA_PERIOD_FS).unwrap();
        assert_eq!(clk.high_fs(), 19_861_000);
        assert_eq!(clk.low_fs(), 19_861_000);

        let odd = Clock::new(5).unwrap();
        assert_eq!(odd.high_fs(), 2);
        assert_eq!(odd.low_fs(), 3);
    }

    #[test]
    fn too_short_period() {
        assert!(matches!(
            Clock::new(1),
            Err(SimError::InvalidClock { .. })
        ));
    }

    #[test]
    fn from_frequency() {
        let clk = Clock::from_frequency("40MHz".parse().unwrap()).unwrap();
        assert_eq!(clk.period_fs(), 25_000_000);
        assert_eq!(clk.frequency().hz(), 40_000_000.0);
    }

    #[test]
    fn cycles_at_aligned_instants() {
        let conv = Clock::new(VGA_PERIOD_FS).unwrap().converter();
        assert_eq!(conv.cycles_at(SimTime::from_fs(656 * VGA_PERIOD_FS)), 656.0);
        assert_eq!(conv.cycles_at(SimTime::zero()), 0.0);
    }

    #[test]
    fn elapsed_cycles_exact_for_large_counts() {
        let conv = Clock::new(VGA_PERIOD_FS).unwrap().converter();
        let from = SimTime::from_fs(809 * VGA_PERIOD_FS);
        let to = SimTime::from_fs((809 + 391_056) * VGA_PERIOD_FS);
        assert_eq!(conv.elapsed_cycles(from, to), 391_056.0);
        assert_eq!(conv.whole_cycles(from, to), Some(391_056));
    }

    #[test]
    fn elapsed_cycles_fractional() {
        let conv = Clock::new(1000).unwrap().converter();
        let from = SimTime::from_fs(0);
        let to = SimTime::from_fs(2500);
        assert_eq!(conv.elapsed_cycles(from, to), 2.5);
        assert_eq!(conv.whole_cycles(from, to), None);
        assert_eq!(conv.whole_cycles(to, from), None);
    }

    #[test]
    fn diagnostic_units() {
        let conv = Clock::new(VGA_PERIOD_FS).unwrap().converter();
        let line = SimTime::from_fs(conv.cycles_to_fs(800));
        assert!((conv.to_unit(line, TimeUnit::Us) - 31.7776).abs() < 1e-9);
    }
}
