//! Shared value types used across the syncwatch timing verifier.
//!
//! This crate provides four-state logic levels for observed pins, clock
//! frequencies, and femtosecond duration parsing used by configuration and
//! the command line.

#![warn(missing_docs)]

pub mod duration;
pub mod frequency;
pub mod logic;

pub use duration::{
    parse_duration, ParseDurationError, FS_PER_MS, FS_PER_NS, FS_PER_PS, FS_PER_S, FS_PER_US,
};
pub use frequency::{Frequency, ParseFrequencyError};
pub use logic::Logic;
