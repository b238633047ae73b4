//! Pixel clock frequencies.
//!
//! Video modes are published by pixel clock ("25.175 MHz") while the kernel
//! runs on an integer period in femtoseconds. [`Frequency`] converts between
//! the two.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::duration::FS_PER_S;

/// Suffixes and their scale in Hz, largest first. Parsing is
/// case-insensitive, so `kHz` and `KHz` both work.
const UNITS: [(&str, f64); 4] = [
    ("GHz", 1e9),
    ("MHz", 1e6),
    ("KHz", 1e3),
    ("Hz", 1.0),
];

/// A frequency in Hertz.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frequency(f64);

impl Frequency {
    /// Wraps a value in Hertz.
    pub fn new(hz: f64) -> Self {
        Self(hz)
    }

    /// The frequency of a clock with the given period.
    pub fn from_period_fs(period_fs: u64) -> Self {
        Self(FS_PER_S as f64 / period_fs as f64)
    }

    /// Value in Hertz.
    pub fn hz(&self) -> f64 {
        self.0
    }

    /// Value in megahertz.
    pub fn mhz(&self) -> f64 {
        self.0 / 1e6
    }

    /// Clock period, rounded to the nearest femtosecond.
    ///
    /// 25.175 MHz gives 39 721 946 fs. `None` when the frequency is not a
    /// positive finite number or the period does not fit.
    pub fn period_fs(&self) -> Option<u64> {
        if !(self.0.is_finite() && self.0 > 0.0) {
            return None;
        }
        let period = (FS_PER_S as f64 / self.0).round();
        (1.0..=u64::MAX as f64)
            .contains(&period)
            .then_some(period as u64)
    }
}

impl fmt::Debug for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frequency({self})")
    }
}

/// Uses the largest unit that keeps the number at or above one.
impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (suffix, scale) = UNITS
            .into_iter()
            .find(|(_, scale)| self.0 >= *scale)
            .unwrap_or(UNITS[UNITS.len() - 1]);
        write!(f, "{}{suffix}", self.0 / scale)
    }
}

/// A frequency string that is malformed, zero, or negative.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid frequency: '{input}'")]
pub struct ParseFrequencyError {
    /// The rejected input.
    pub input: String,
}

/// Accepts `25.175MHz`, `100 kHz`, `1GHz`, or a bare number of Hz.
impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let lower = s.to_ascii_lowercase();
        let (number, scale) = UNITS
            .into_iter()
            .find_map(|(suffix, scale)| {
                lower
                    .strip_suffix(&suffix.to_ascii_lowercase())
                    .map(|n| (n, scale))
            })
            .unwrap_or((lower.as_str(), 1.0));

        match number.trim().parse::<f64>() {
            Ok(value) if value.is_finite() && value > 0.0 => Ok(Frequency(value * scale)),
            _ => Err(ParseFrequencyError {
                input: s.to_string(),
            }),
        }
    }
}
