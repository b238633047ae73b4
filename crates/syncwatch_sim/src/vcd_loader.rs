//! VCD file loader for replaying recorded waveforms.
//!
//! Parses IEEE 1364 Value Change Dump (VCD) files written by [`VcdRecorder`]
//! or by an RTL simulator, returning a [`LoadedWaveform`] with signal
//! definitions and value-change histories in femtoseconds. A
//! [`SignalSelector`] such as `tb.uo_out[7]` picks one bit out of it.
//!
//! [`VcdRecorder`]: crate::waveform::VcdRecorder

use std::collections::HashMap;
use std::fmt;
use std::io::BufRead;
use std::path::Path;
use std::str::FromStr;

use syncwatch_common::duration::fs_per_unit;
use syncwatch_common::Logic;
use thiserror::Error;

/// Errors that can occur while loading a VCD file or selecting from it.
#[derive(Debug, Error)]
pub enum VcdLoadError {
    /// An I/O error occurred while reading.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A parse error at a specific line number.
    #[error("parse error at line {line}: {message}")]
    ParseError {
        /// The 1-based line number where the error occurred.
        line: usize,
        /// Description of the error.
        message: String,
    },
    /// The VCD file has a structural format error.
    #[error("format error: {0}")]
    FormatError(String),
    /// No signal matches the selector, or more than one does.
    #[error("no unique signal matches '{selector}'")]
    NoSuchSignal {
        /// The selector as written.
        selector: String,
    },
    /// The selected bit is outside the signal's width.
    #[error("bit {bit} is out of range for '{name}' ({width} bits wide)")]
    BitOutOfRange {
        /// The matched signal name.
        name: String,
        /// The requested bit.
        bit: u32,
        /// The signal width.
        width: u32,
    },
    /// A selector string could not be parsed.
    #[error("invalid signal selector '{0}'")]
    InvalidSelector(String),
}

/// Femtoseconds per VCD time unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VcdTimescale {
    /// Femtoseconds per VCD time unit.
    pub fs_per_unit: u64,
}

impl Default for VcdTimescale {
    fn default() -> Self {
        Self { fs_per_unit: 1 }
    }
}

/// Metadata for a signal found in the VCD file.
#[derive(Clone, Debug)]
pub struct VcdSignalDef {
    /// The VCD identifier code (e.g., "!", "\"", "!\"").
    pub id_code: String,
    /// The hierarchical signal name (dotted path from scope stack).
    pub name: String,
    /// Bit width of the signal.
    pub width: u32,
    /// The VCD variable type (e.g., "wire", "reg").
    pub var_type: String,
}

/// A value of a VCD variable, bit 0 first.
pub type BitValue = Vec<Logic>;

/// A fully loaded waveform from a VCD file.
#[derive(Clone, Debug, Default)]
pub struct LoadedWaveform {
    /// The timescale from the VCD header.
    pub timescale: VcdTimescale,
    /// Signal definitions in order of declaration.
    pub signals: Vec<VcdSignalDef>,
    /// Per-signal `(time_fs, value)` histories, parallel to `signals`.
    pub histories: Vec<Vec<(u64, BitValue)>>,
    /// The last timestamp in the file, in femtoseconds.
    pub end_fs: u64,
}

impl LoadedWaveform {
    /// Finds a signal by exact hierarchical name, or else by a unique
    /// suffix on a scope boundary (`uo_out` matches `tb.dut.uo_out`).
    pub fn find(&self, name: &str) -> Option<usize> {
        if let Some(idx) = self.signals.iter().position(|s| s.name == name) {
            return Some(idx);
        }
        let dotted = format!(".{name}");
        let mut matches = self
            .signals
            .iter()
            .enumerate()
            .filter(|(_, s)| s.name.ends_with(&dotted))
            .map(|(i, _)| i);
        match (matches.next(), matches.next()) {
            (Some(idx), None) => Some(idx),
            _ => None,
        }
    }

    /// Extracts the single-bit history picked by `selector`.
    ///
    /// Consecutive samples with the same level are merged, so every entry
    /// after the first is a real transition.
    pub fn extract(&self, selector: &SignalSelector) -> Result<Vec<(u64, Logic)>, VcdLoadError> {
        // A 1-bit variable may carry the bit index in its own name.
        let (idx, bit) = match self.find(&selector.to_string()) {
            Some(idx) if self.signals[idx].width == 1 => (idx, 0),
            _ => {
                let idx = self
                    .find(&selector.path)
                    .ok_or_else(|| VcdLoadError::NoSuchSignal {
                        selector: selector.to_string(),
                    })?;
                (idx, selector.bit.unwrap_or(0))
            }
        };

        let def = &self.signals[idx];
        if bit >= def.width {
            return Err(VcdLoadError::BitOutOfRange {
                name: def.name.clone(),
                bit,
                width: def.width,
            });
        }

        let mut out: Vec<(u64, Logic)> = Vec::new();
        for (time, value) in &self.histories[idx] {
            let level = value.get(bit as usize).copied().unwrap_or(Logic::X);
            match out.last_mut() {
                Some((t, last)) if *t == *time => *last = level,
                Some((_, last)) if *last == level => {}
                _ => out.push((*time, level)),
            }
        }
        // A same-time overwrite can leave two equal neighbours behind.
        out.dedup_by(|b, a| a.1 == b.1);
        Ok(out)
    }
}

/// A signal path with an optional bit index, e.g. `tb.uo_out[7]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignalSelector {
    /// Hierarchical or suffix name.
    pub path: String,
    /// Bit index within a vector, if any.
    pub bit: Option<u32>,
}

impl FromStr for SignalSelector {
    type Err = VcdLoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || VcdLoadError::InvalidSelector(s.to_string());
        if s.is_empty() {
            return Err(invalid());
        }
        match s.strip_suffix(']') {
            Some(rest) => {
                let (path, index) = rest.rsplit_once('[').ok_or_else(invalid)?;
                let bit = index.trim().parse().map_err(|_| invalid())?;
                if path.is_empty() {
                    return Err(invalid());
                }
                Ok(Self {
                    path: path.to_string(),
                    bit: Some(bit),
                })
            }
            None if s.contains('[') => Err(invalid()),
            None => Ok(Self {
                path: s.to_string(),
                bit: None,
            }),
        }
    }
}

impl fmt::Display for SignalSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bit {
            Some(bit) => write!(f, "{}[{bit}]", self.path),
            None => f.write_str(&self.path),
        }
    }
}

/// Loads a VCD waveform from a buffered reader.
///
/// The header is read as a stream of `$keyword ... $end` blocks, so a
/// declaration may span lines. Value changes are read token by token.
pub fn load_vcd<R: BufRead>(reader: R) -> Result<LoadedWaveform, VcdLoadError> {
    let mut parser = VcdParser::default();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        parser.line = idx + 1;
        for token in line.split_whitespace() {
            parser.token(token)?;
        }
    }
    parser.finish()
}

/// Loads a VCD file from a filesystem path.
pub fn load_vcd_file(path: &Path) -> Result<LoadedWaveform, VcdLoadError> {
    let file = std::fs::File::open(path)?;
    load_vcd(std::io::BufReader::new(file))
}

/// What the next token means.
#[derive(Debug, Default)]
enum Expect {
    /// A keyword, timestamp, or value change.
    #[default]
    Any,
    /// Body tokens of an open `$keyword` block, up to `$end`.
    Block { keyword: String, body: Vec<String> },
    /// The identifier after a `b...` vector value.
    VectorId(String),
}

#[derive(Debug, Default)]
struct VcdParser {
    wave: LoadedWaveform,
    ids: HashMap<String, Vec<usize>>,
    scopes: Vec<String>,
    expect: Expect,
    in_body: bool,
    now_fs: u64,
    line: usize,
}

impl VcdParser {
    fn token(&mut self, token: &str) -> Result<(), VcdLoadError> {
        match std::mem::take(&mut self.expect) {
            Expect::Block { keyword, body } if token == "$end" => self.block(&keyword, &body),
            Expect::Block { keyword, mut body } => {
                body.push(token.to_string());
                self.expect = Expect::Block { keyword, body };
                Ok(())
            }
            Expect::VectorId(bits) => {
                self.vector_change(&bits, token);
                Ok(())
            }
            Expect::Any => self.start(token),
        }
    }

    fn start(&mut self, token: &str) -> Result<(), VcdLoadError> {
        if let Some(keyword) = token.strip_prefix('$') {
            let keyword = keyword.to_ascii_lowercase();
            // Inside the body these only bracket value changes.
            if self.in_body
                && matches!(
                    keyword.as_str(),
                    "dumpvars" | "dumpall" | "dumpon" | "dumpoff" | "end"
                )
            {
                return Ok(());
            }
            self.expect = Expect::Block {
                keyword,
                body: Vec::new(),
            };
            return Ok(());
        }
        if !self.in_body {
            return Err(self.parse_error(format!("unexpected '{token}' before $enddefinitions")));
        }
        if let Some(ticks) = token.strip_prefix('#') {
            return self.timestamp(ticks);
        }
        match token.chars().next() {
            Some('b' | 'B') => self.expect = Expect::VectorId(token[1..].to_string()),
            // Real values carry their identifier in the next token too.
            Some('r' | 'R') => self.expect = Expect::VectorId(String::new()),
            Some(c) => {
                if let Some(level) = Logic::from_char(c) {
                    self.scalar_change(level, &token[c.len_utf8()..]);
                }
            }
            None => {}
        }
        Ok(())
    }

    fn block(&mut self, keyword: &str, body: &[String]) -> Result<(), VcdLoadError> {
        match keyword {
            "timescale" => {
                self.wave.timescale.fs_per_unit = parse_timescale(&body.concat(), self.line)?;
            }
            "scope" => {
                // "module tb", "begin blk", ...
                let name = body.get(1).or(body.first()).cloned().unwrap_or_default();
                self.scopes.push(name);
            }
            "upscope" => {
                self.scopes.pop();
            }
            "var" => self.declare(body)?,
            "enddefinitions" => self.in_body = true,
            // $comment, $date, $version carry nothing we need.
            _ => {}
        }
        Ok(())
    }

    /// `$var <type> <width> <id> <name> [<range>] $end`
    fn declare(&mut self, body: &[String]) -> Result<(), VcdLoadError> {
        let [var_type, width, id_code, name, rest @ ..] = body else {
            return Err(self.parse_error(format!("invalid $var: {}", body.join(" "))));
        };
        let width: u32 = width
            .parse()
            .map_err(|_| self.parse_error(format!("invalid width in $var: {width}")))?;
        let name = match rest.first() {
            // A 1-bit select written as a separate token keeps its index.
            Some(range) if width == 1 && !range.contains(':') => format!("{name}{range}"),
            _ => name.clone(),
        };
        let name = self
            .scopes
            .iter()
            .chain(std::iter::once(&name))
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(".");

        self.ids
            .entry(id_code.clone())
            .or_default()
            .push(self.wave.signals.len());
        self.wave.signals.push(VcdSignalDef {
            id_code: id_code.clone(),
            name,
            width,
            var_type: var_type.clone(),
        });
        self.wave.histories.push(Vec::new());
        Ok(())
    }

    fn timestamp(&mut self, ticks: &str) -> Result<(), VcdLoadError> {
        let fs = ticks
            .parse::<u64>()
            .ok()
            .and_then(|t| t.checked_mul(self.wave.timescale.fs_per_unit))
            .ok_or_else(|| self.parse_error(format!("invalid timestamp: #{ticks}")))?;
        self.now_fs = fs;
        self.wave.end_fs = self.wave.end_fs.max(fs);
        Ok(())
    }

    fn scalar_change(&mut self, level: Logic, id_code: &str) {
        for &idx in self.ids.get(id_code).into_iter().flatten() {
            let mut value = vec![Logic::Zero; self.wave.signals[idx].width.max(1) as usize];
            value[0] = level;
            self.wave.histories[idx].push((self.now_fs, value));
        }
    }

    fn vector_change(&mut self, bits: &str, id_code: &str) {
        if bits.is_empty() {
            return;
        }
        for &idx in self.ids.get(id_code).into_iter().flatten() {
            let value = parse_binary_value(bits, self.wave.signals[idx].width);
            self.wave.histories[idx].push((self.now_fs, value));
        }
    }

    fn finish(self) -> Result<LoadedWaveform, VcdLoadError> {
        if let Expect::Block { keyword, .. } = &self.expect {
            return Err(VcdLoadError::FormatError(format!(
                "${keyword} is not closed by $end"
            )));
        }
        if !self.in_body && !self.wave.signals.is_empty() {
            return Err(VcdLoadError::FormatError(
                "missing $enddefinitions".to_string(),
            ));
        }
        Ok(self.wave)
    }

    fn parse_error(&self, message: String) -> VcdLoadError {
        VcdLoadError::ParseError {
            line: self.line,
            message,
        }
    }
}

/// Parses a VCD timescale such as `1ns`, `10 ps` (already joined), or
/// `100fs` into femtoseconds.
fn parse_timescale(body: &str, line_num: usize) -> Result<u64, VcdLoadError> {
    let invalid = |what: &str| VcdLoadError::ParseError {
        line: line_num,
        message: format!("invalid timescale {what}: {body}"),
    };
    let digits = body.find(|c: char| !c.is_ascii_digit()).unwrap_or(body.len());
    let (count, unit) = body.split_at(digits);
    let count: u64 = if count.is_empty() {
        1
    } else {
        count.parse().map_err(|_| invalid("count"))?
    };
    let fs_per = if unit.is_empty() {
        1
    } else {
        fs_per_unit(&unit.to_ascii_lowercase()).ok_or_else(|| invalid("unit"))?
    };
    count.checked_mul(fs_per).ok_or_else(|| invalid("count"))
}

/// Parses an MSB-first binary string into a bit-0-first value.
///
/// Short values are left-extended with `0`, or with `x`/`z` when the
/// leftmost digit is `x`/`z`.
fn parse_binary_value(bits: &str, width: u32) -> BitValue {
    let digits = bits.chars().map(|c| Logic::from_char(c).unwrap_or(Logic::X));
    let fill = match digits.clone().next() {
        Some(level @ (Logic::X | Logic::Z)) => level,
        _ => Logic::Zero,
    };
    let mut value = vec![fill; width as usize];
    for (slot, level) in value.iter_mut().zip(digits.rev()) {
        *slot = level;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalId;
    use crate::time::TimeUnit;
    use crate::waveform::{VcdRecorder, WaveformRecorder};
    use std::io::Cursor;
    use syncwatch_common::FS_PER_NS;

    const TT_VCD: &str = "\
$date today $end
$timescale 1ps $end
$scope module tb $end
$var wire 1 ! clk $end
$var wire 1 \" rst_n $end
$var wire 8 # uo_out [7:0] $end
$upscope $end
$enddefinitions $end
#0
$dumpvars
0!
x\"
bxxxxxxxx #
$end
#20000
1!
0\"
b11000000 #
#40000
0!
b01000000 #
#60000
1!
b10000000 #
";

    #[test]
    fn load_scoped_vector() {
        let wave = load_vcd(Cursor::new(TT_VCD)).unwrap();
        assert_eq!(wave.timescale.fs_per_unit, 1000);
        assert_eq!(wave.signals.len(), 3);
        assert_eq!(wave.signals[2].name, "tb.uo_out");
        assert_eq!(wave.signals[2].width, 8);
        assert_eq!(wave.end_fs, 60_000_000);
        assert_eq!(wave.histories[2].len(), 4);
        // Bit 0 first.
        assert_eq!(wave.histories[2][1].1[7], Logic::One);
        assert_eq!(wave.histories[2][1].1[0], Logic::Zero);
    }

    #[test]
    fn extract_bit_merges_repeats() {
        let wave = load_vcd(Cursor::new(TT_VCD)).unwrap();
        let sel: SignalSelector = "tb.uo_out[7]".parse().unwrap();
        assert_eq!(
            wave.extract(&sel).unwrap(),
            vec![
                (0, Logic::X),
                (20_000_000, Logic::One),
                (40_000_000, Logic::Zero),
                (60_000_000, Logic::One),
            ]
        );
        let sel: SignalSelector = "uo_out[6]".parse().unwrap();
        assert_eq!(
            wave.extract(&sel).unwrap(),
            vec![(0, Logic::X), (20_000_000, Logic::One), (60_000_000, Logic::Zero)]
        );
    }

    #[test]
    fn extract_errors() {
        let wave = load_vcd(Cursor::new(TT_VCD)).unwrap();
        assert!(matches!(
            wave.extract(&"tb.uo_out[8]".parse().unwrap()),
            Err(VcdLoadError::BitOutOfRange { width: 8, .. })
        ));
        assert!(matches!(
            wave.extract(&"tb.missing".parse().unwrap()),
            Err(VcdLoadError::NoSuchSignal { .. })
        ));
    }

    #[test]
    fn suffix_must_be_unique() {
        let vcd = "\
$scope module a $end
$var wire 1 ! hsync $end
$upscope $end
$scope module b $end
$var wire 1 \" hsync $end
$upscope $end
$enddefinitions $end
";
        let wave = load_vcd(Cursor::new(vcd)).unwrap();
        assert_eq!(wave.find("hsync"), None);
        assert_eq!(wave.find("b.hsync"), Some(1));
    }

    #[test]
    fn selector_parsing() {
        let sel: SignalSelector = "tb.uo_out[7]".parse().unwrap();
        assert_eq!(sel.path, "tb.uo_out");
        assert_eq!(sel.bit, Some(7));
        assert_eq!(sel.to_string(), "tb.uo_out[7]");

        let sel: SignalSelector = "hsync".parse().unwrap();
        assert_eq!(sel.bit, None);

        assert!("uo_out[".parse::<SignalSelector>().is_err());
        assert!("uo_out[a]".parse::<SignalSelector>().is_err());
        assert!("[3]".parse::<SignalSelector>().is_err());
        assert!("".parse::<SignalSelector>().is_err());
    }

    #[test]
    fn multi_line_keywords() {
        let vcd = "\
$timescale
  10ns
$end
$var wire 1 ! s
$end
$enddefinitions $end
#3
1!
";
        let wave = load_vcd(Cursor::new(vcd)).unwrap();
        assert_eq!(wave.timescale.fs_per_unit, 10 * FS_PER_NS);
        assert_eq!(wave.signals[0].name, "s");
        assert_eq!(wave.histories[0], vec![(30 * FS_PER_NS, vec![Logic::One])]);
    }

    #[test]
    fn bad_timestamp() {
        let vcd = "$var wire 1 ! s $end\n$enddefinitions $end\n#abc\n";
        assert!(matches!(
            load_vcd(Cursor::new(vcd)),
            Err(VcdLoadError::ParseError { line: 3, .. })
        ));
    }

    #[test]
    fn missing_enddefinitions() {
        let vcd = "$var wire 1 ! s $end\n";
        assert!(matches!(
            load_vcd(Cursor::new(vcd)),
            Err(VcdLoadError::FormatError(_))
        ));
    }

    #[test]
    fn unclosed_block() {
        let vcd = "$var wire 1 ! s\n";
        assert!(matches!(
            load_vcd(Cursor::new(vcd)),
            Err(VcdLoadError::FormatError(_))
        ));
    }

    #[test]
    fn body_comments_and_packed_lines() {
        let vcd = "\
$timescale 1 ns $end
$var wire 1 ! s $end $var wire 2 \" v $end
$enddefinitions $end
#0 0! b10 \"
$comment 1! is not a change $end
#4 1! r0.5 \"
";
        let wave = load_vcd(Cursor::new(vcd)).unwrap();
        assert_eq!(wave.timescale.fs_per_unit, FS_PER_NS);
        assert_eq!(
            wave.histories[0],
            vec![(0, vec![Logic::Zero]), (4 * FS_PER_NS, vec![Logic::One])]
        );
        assert_eq!(wave.histories[1], vec![(0, vec![Logic::Zero, Logic::One])]);
    }

    #[test]
    fn binary_value_extension() {
        assert_eq!(
            parse_binary_value("1", 3),
            vec![Logic::One, Logic::Zero, Logic::Zero]
        );
        assert_eq!(parse_binary_value("x0", 3), vec![Logic::Zero, Logic::X, Logic::X]);
    }

    #[test]
    fn reads_back_recorder_output() {
        let mut rec = VcdRecorder::with_timescale(Vec::new(), TimeUnit::Ps);
        rec.begin_scope("syncwatch").unwrap();
        rec.register_signal(SignalId::from_raw(0), "hsync").unwrap();
        rec.end_scope().unwrap();
        rec.record_change(0, SignalId::from_raw(0), Logic::One).unwrap();
        rec.record_change(5_000, SignalId::from_raw(0), Logic::Zero).unwrap();
        rec.finalize().unwrap();

        let wave = load_vcd(Cursor::new(rec.into_inner())).unwrap();
        let history = wave.extract(&"hsync".parse().unwrap()).unwrap();
        assert_eq!(history, vec![(0, Logic::One), (5_000, Logic::Zero)]);
    }
}
