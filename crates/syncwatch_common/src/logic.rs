//! The level of a single observed pin.
//!
//! Sync outputs are expected to settle to `0` or `1`, but a pin can read `X`
//! before reset takes effect and `Z` when a recording leaves it undriven.
//! Neither counts as idle or as a pulse.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Not;

/// Four-state pin level: `Zero`, `One`, unknown `X`, or undriven `Z`.
///
/// New signals start at `X` until something drives them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum Logic {
    /// Driven low.
    Zero,
    /// Driven high.
    One,
    /// Unknown.
    #[default]
    X,
    /// Undriven.
    Z,
}

impl Logic {
    /// Parses a VCD scalar digit. Case is ignored for `x` and `z`.
    pub fn from_char(c: char) -> Option<Self> {
        Some(match c.to_ascii_lowercase() {
            '0' => Self::Zero,
            '1' => Self::One,
            'x' => Self::X,
            'z' => Self::Z,
            _ => return None,
        })
    }

    /// `One` for `true`.
    pub fn from_bool(high: bool) -> Self {
        if high {
            Self::One
        } else {
            Self::Zero
        }
    }

    /// Whether the pin is actually driven to a level.
    pub fn is_known(self) -> bool {
        matches!(self, Self::Zero | Self::One)
    }

    /// The digit VCD files use for this level (lowercase `x`/`z`).
    pub fn vcd_char(self) -> char {
        match self {
            Self::Zero => '0',
            Self::One => '1',
            Self::X => 'x',
            Self::Z => 'z',
        }
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.vcd_char().to_ascii_uppercase())
    }
}

/// Inverts a known level. An inverter fed `X` or `Z` outputs `X`.
impl Not for Logic {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            Self::Zero => Self::One,
            Self::One => Self::Zero,
            Self::X | Self::Z => Self::X,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Logic::{self, *};

    #[test]
    fn inversion_keeps_unknowns_unknown() {
        assert_eq!(!Zero, One);
        assert_eq!(!One, Zero);
        assert_eq!(!X, X);
        assert_eq!(!Z, X);
    }

    #[test]
    fn displayed_like_a_waveform_viewer() {
        let shown: Vec<String> = [Zero, One, X, Z].iter().map(|l| l.to_string()).collect();
        assert_eq!(shown, ["0", "1", "X", "Z"]);
    }

    #[test]
    fn vcd_digits() {
        for level in [Zero, One, X, Z] {
            assert_eq!(Logic::from_char(level.vcd_char()), Some(level));
        }
        assert_eq!(Logic::from_char('X'), Some(X));
        assert_eq!(Logic::from_char('Z'), Some(Z));
        assert_eq!(Logic::from_char('u'), None);
        assert_eq!(Logic::from_char('2'), None);
    }

    #[test]
    fn only_driven_levels_are_known() {
        assert_eq!(Logic::from_bool(true), One);
        assert_eq!(Logic::from_bool(false), Zero);
        assert_eq!(Logic::default(), X);
        let known: Vec<bool> = [Zero, One, X, Z].iter().map(|l| l.is_known()).collect();
        assert_eq!(known, [true, true, false, false]);
    }
}
