//! Duration units and parsing of strings like `"39.722ns"` into femtoseconds.
//!
//! Parsing is exact: the fractional part is scaled with integer arithmetic, so
//! `"39.722ns"` is exactly `39_722_000` fs. Values finer than one femtosecond
//! are rejected rather than rounded.

use thiserror::Error;

/// Femtoseconds per picosecond.
pub const FS_PER_PS: u64 = 1_000;
/// Femtoseconds per nanosecond.
pub const FS_PER_NS: u64 = 1_000_000;
/// Femtoseconds per microsecond.
pub const FS_PER_US: u64 = 1_000_000_000;
/// Femtoseconds per millisecond.
pub const FS_PER_MS: u64 = 1_000_000_000_000;
/// Femtoseconds per second.
pub const FS_PER_S: u64 = 1_000_000_000_000_000;

/// Errors produced by [`parse_duration`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseDurationError {
    /// The input was empty or whitespace.
    #[error("empty duration string")]
    Empty,
    /// No digits precede the unit.
    #[error("invalid duration: no numeric value in '{0}'")]
    NoNumber(String),
    /// The numeric part could not be parsed.
    #[error("invalid number in duration '{0}'")]
    InvalidNumber(String),
    /// The unit suffix is missing.
    #[error("missing unit in duration '{0}' (use fs, ps, ns, us, ms, or s)")]
    MissingUnit(String),
    /// The unit suffix is not recognized.
    #[error("unknown duration unit '{0}' (use fs, ps, ns, us, ms, or s)")]
    UnknownUnit(String),
    /// The value has more precision than one femtosecond.
    #[error("duration '{0}' is finer than 1 fs")]
    TooPrecise(String),
    /// The value does not fit in 64 bits of femtoseconds.
    #[error("duration '{0}' is out of range")]
    Overflow(String),
}

/// Returns the number of femtoseconds in one `unit`, or `None` if unknown.
pub fn fs_per_unit(unit: &str) -> Option<u64> {
    match unit {
        "fs" => Some(1),
        "ps" => Some(FS_PER_PS),
        "ns" => Some(FS_PER_NS),
        "us" => Some(FS_PER_US),
        "ms" => Some(FS_PER_MS),
        "s" => Some(FS_PER_S),
        _ => None,
    }
}

/// Parses a duration such as `"100ns"`, `"39.722 ns"` or `"16.7ms"` into femtoseconds.
pub fn parse_duration(s: &str) -> Result<u64, ParseDurationError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ParseDurationError::Empty);
    }

    let number_end = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    if number_end == 0 {
        return Err(ParseDurationError::NoNumber(s.to_string()));
    }

    let (number, unit) = s.split_at(number_end);
    let unit = unit.trim();
    if unit.is_empty() {
        return Err(ParseDurationError::MissingUnit(s.to_string()));
    }
    let multiplier =
        fs_per_unit(unit).ok_or_else(|| ParseDurationError::UnknownUnit(unit.to_string()))?;

    let (int_part, frac_part) = match number.split_once('.') {
        Some((i, f)) => (i, f),
        None => (number, ""),
    };
    if (int_part.is_empty() && frac_part.is_empty()) || frac_part.contains('.') {
        return Err(ParseDurationError::InvalidNumber(s.to_string()));
    }

    let whole: u64 = if int_part.is_empty() {
        0
    } else {
        int_part
            .parse()
            .map_err(|_| ParseDurationError::InvalidNumber(s.to_string()))?
    };
    let overflow = || ParseDurationError::Overflow(s.to_string());
    let mut total = whole.checked_mul(multiplier).ok_or_else(overflow)?;

    let frac_digits = frac_part.trim_end_matches('0');
    if !frac_digits.is_empty() {
        let scale = 10u64
            .checked_pow(frac_digits.len() as u32)
            .ok_or_else(|| ParseDurationError::TooPrecise(s.to_string()))?;
        if multiplier % scale != 0 {
            return Err(ParseDurationError::TooPrecise(s.to_string()));
        }
        let frac: u64 = frac_digits
            .parse()
            .map_err(|_| ParseDurationError::InvalidNumber(s.to_string()))?;
        total = total
            .checked_add(frac * (multiplier / scale))
            .ok_or_else(overflow)?;
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_units() {
        assert_eq!(parse_duration("42fs").unwrap(), 42);
        assert_eq!(parse_duration("250ps").unwrap(), 250 * FS_PER_PS);
        assert_eq!(parse_duration("100ns").unwrap(), 100 * FS_PER_NS);
        assert_eq!(parse_duration("5us").unwrap(), 5 * FS_PER_US);
        assert_eq!(parse_duration("10ms").unwrap(), 10 * FS_PER_MS);
        assert_eq!(parse_duration("1s").unwrap(), FS_PER_S);
    }

    #[test]
    fn fractional_is_exact() {
        assert_eq!(parse_duration("39.722ns").unwrap(), 39_722_000);
        assert_eq!(parse_duration("0.5us").unwrap(), 500 * FS_PER_NS);
        assert_eq!(parse_duration(".25ns").unwrap(), 250_000);
        assert_eq!(parse_duration("1.500ps").unwrap(), 1_500);
    }

    #[test]
    fn whitespace_between_number_and_unit() {
        assert_eq!(parse_duration("  50 ns  ").unwrap(), 50 * FS_PER_NS);
    }

    #[test]
    fn too_precise() {
        let err = parse_duration("1.5fs").unwrap_err();
        assert!(matches!(err, ParseDurationError::TooPrecise(_)));
    }

    #[test]
    fn error_cases() {
        assert_eq!(parse_duration(""), Err(ParseDurationError::Empty));
        assert!(matches!(
            parse_duration("ns"),
            Err(ParseDurationError::NoNumber(_))
        ));
        assert!(matches!(
            parse_duration("100"),
            Err(ParseDurationError::MissingUnit(_))
        ));
        assert!(matches!(
            parse_duration("100xyz"),
            Err(ParseDurationError::UnknownUnit(_))
        ));
        assert!(matches!(
            parse_duration("1.2.3ns"),
            Err(ParseDurationError::InvalidNumber(_))
        ));
        assert!(matches!(
            parse_duration("99999999s"),
            Err(ParseDurationError::Overflow(_))
        ));
    }

    #[test]
    fn error_messages() {
        let err = parse_duration("100xyz").unwrap_err();
        assert!(err.to_string().contains("unknown duration unit"));
        let err = parse_duration("100").unwrap_err();
        assert!(err.to_string().contains("missing unit"));
    }
}
