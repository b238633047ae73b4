//! Waveform recording for simulation output.
//!
//! The [`WaveformRecorder`] trait abstracts waveform output. [`VcdRecorder`]
//! writes the IEEE 1364 Value Change Dump (VCD) text format, which GTKWave
//! and Surfer can open.

use std::io::Write;

use syncwatch_common::Logic;

use crate::error::SimError;
use crate::signal::SignalId;
use crate::time::TimeUnit;

/// Trait for recording simulation waveforms.
///
/// The kernel registers every signal inside one scope, dumps initial values
/// at the current time, and then reports each change as it is applied.
pub trait WaveformRecorder {
    /// Registers a single-bit signal for recording.
    fn register_signal(&mut self, id: SignalId, name: &str) -> Result<(), SimError>;

    /// Opens a new scope (hierarchy level) in the waveform.
    fn begin_scope(&mut self, name: &str) -> Result<(), SimError>;

    /// Closes the current scope.
    fn end_scope(&mut self) -> Result<(), SimError>;

    /// Records a value change at the given time (in femtoseconds).
    fn record_change(&mut self, time_fs: u64, id: SignalId, value: Logic) -> Result<(), SimError>;

    /// Finalizes the waveform output (flush, close sections).
    fn finalize(&mut self) -> Result<(), SimError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Section {
    Header,
    DumpVars,
    Changes,
}

/// VCD (Value Change Dump) format recorder.
///
/// Identifier codes use printable ASCII starting from `!`. Timestamps are
/// written in the recorder's timescale; changes that fall between two ticks
/// are truncated onto the earlier one.
pub struct VcdRecorder<W: Write> {
    writer: W,
    codes: Vec<Option<String>>,
    next_code: u32,
    timescale: TimeUnit,
    header_written: bool,
    section: Section,
    last_tick: Option<u64>,
}

impl<W: Write> VcdRecorder<W> {
    /// Creates a recorder with a 1 fs timescale.
    pub fn new(writer: W) -> Self {
        Self::with_timescale(writer, TimeUnit::Fs)
    }

    /// Creates a recorder writing timestamps in `timescale` units.
    pub fn with_timescale(writer: W, timescale: TimeUnit) -> Self {
        Self {
            writer,
            codes: Vec::new(),
            next_code: 0,
            timescale,
            header_written: false,
            section: Section::Header,
            last_tick: None,
        }
    }

    /// Consumes the recorder and returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_header(&mut self) -> Result<(), SimError> {
        if self.header_written {
            return Ok(());
        }
        self.header_written = true;
        writeln!(self.writer, "$version")?;
        writeln!(self.writer, "  syncwatch {}", env!("CARGO_PKG_VERSION"))?;
        writeln!(self.writer, "$end")?;
        writeln!(self.writer, "$timescale")?;
        writeln!(self.writer, "  1{}", self.timescale.suffix())?;
        writeln!(self.writer, "$end")?;
        Ok(())
    }

    /// Generates a VCD identifier code from a sequential index.
    fn make_id_code(index: u32) -> String {
        let mut result = String::new();
        let mut idx = index;
        loop {
            let c = (b'!' + (idx % 94) as u8) as char;
            result.push(c);
            idx /= 94;
            if idx == 0 {
                break;
            }
            idx -= 1;
        }
        result
    }

    fn code_for(&self, id: SignalId) -> Result<&str, SimError> {
        self.codes
            .get(id.index())
            .and_then(|c| c.as_deref())
            .ok_or(SimError::UnregisteredSignal { id: id.as_raw() })
    }
}

impl<W: Write> WaveformRecorder for VcdRecorder<W> {
    fn register_signal(&mut self, id: SignalId, name: &str) -> Result<(), SimError> {
        self.write_header()?;
        let code = Self::make_id_code(self.next_code);
        self.next_code += 1;
        writeln!(self.writer, "$var wire 1 {code} {name} $end")?;

        if self.codes.len() <= id.index() {
            self.codes.resize(id.index() + 1, None);
        }
        self.codes[id.index()] = Some(code);
        Ok(())
    }

    fn begin_scope(&mut self, name: &str) -> Result<(), SimError> {
        self.write_header()?;
        writeln!(self.writer, "$scope module {name} $end")?;
        Ok(())
    }

    fn end_scope(&mut self) -> Result<(), SimError> {
        writeln!(self.writer, "$upscope $end")?;
        Ok(())
    }

    fn record_change(&mut self, time_fs: u64, id: SignalId, value: Logic) -> Result<(), SimError> {
        let tick = time_fs / self.timescale.fs_per_unit();
        match self.section {
            Section::Header => {
                self.write_header()?;
                writeln!(self.writer, "$enddefinitions $end")?;
                writeln!(self.writer, "#{tick}")?;
                writeln!(self.writer, "$dumpvars")?;
                self.section = Section::DumpVars;
                self.last_tick = Some(tick);
            }
            Section::DumpVars if self.last_tick != Some(tick) => {
                writeln!(self.writer, "$end")?;
                writeln!(self.writer, "#{tick}")?;
                self.section = Section::Changes;
                self.last_tick = Some(tick);
            }
            Section::Changes if self.last_tick != Some(tick) => {
                writeln!(self.writer, "#{tick}")?;
                self.last_tick = Some(tick);
            }
            Section::DumpVars | Section::Changes => {}
        }

        let code = self.code_for(id)?.to_string();
        writeln!(self.writer, "{}{code}", value.vcd_char())?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SimError> {
        match self.section {
            Section::Header => {
                self.write_header()?;
                writeln!(self.writer, "$enddefinitions $end")?;
            }
            Section::DumpVars => writeln!(self.writer, "$end")?,
            Section::Changes => {}
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(rec: VcdRecorder<Vec<u8>>) -> String {
        String::from_utf8(rec.into_inner()).unwrap()
    }

    fn sig(n: u32) -> SignalId {
        SignalId::from_raw(n)
    }

    #[test]
    fn id_codes() {
        assert_eq!(VcdRecorder::<Vec<u8>>::make_id_code(0), "!");
        assert_eq!(VcdRecorder::<Vec<u8>>::make_id_code(1), "\"");
        assert_eq!(VcdRecorder::<Vec<u8>>::make_id_code(93), "~");
        assert_eq!(VcdRecorder::<Vec<u8>>::make_id_code(94).len(), 2);
    }

    #[test]
    fn header_and_vars() {
        let mut rec = VcdRecorder::with_timescale(Vec::new(), TimeUnit::Ps);
        rec.begin_scope("tb").unwrap();
        rec.register_signal(sig(0), "clk").unwrap();
        rec.register_signal(sig(1), "hsync").unwrap();
        rec.end_scope().unwrap();
        rec.finalize().unwrap();
        let out = output(rec);
        assert!(out.contains("$timescale\n  1ps\n$end"));
        assert!(out.contains("$scope module tb $end"));
        assert!(out.contains("$var wire 1 ! clk $end"));
        assert!(out.contains("$var wire 1 \" hsync $end"));
        assert!(out.contains("$upscope $end"));
        assert!(out.ends_with("$enddefinitions $end\n"));
    }

    #[test]
    fn dumpvars_then_changes() {
        let mut rec = VcdRecorder::new(Vec::new());
        rec.begin_scope("tb").unwrap();
        rec.register_signal(sig(0), "clk").unwrap();
        rec.register_signal(sig(1), "vsync").unwrap();
        rec.end_scope().unwrap();
        rec.record_change(0, sig(0), Logic::Zero).unwrap();
        rec.record_change(0, sig(1), Logic::X).unwrap();
        rec.record_change(500, sig(0), Logic::One).unwrap();
        rec.record_change(500, sig(1), Logic::One).unwrap();
        rec.record_change(1000, sig(0), Logic::Zero).unwrap();
        rec.finalize().unwrap();

        let out = output(rec);
        let body = out.split("$enddefinitions $end\n").nth(1).unwrap();
        assert_eq!(
            body,
            "#0\n$dumpvars\n0!\nx\"\n$end\n#500\n1!\n1\"\n#1000\n0!\n"
        );
    }

    #[test]
    fn timescale_truncates() {
        let mut rec = VcdRecorder::with_timescale(Vec::new(), TimeUnit::Ps);
        rec.register_signal(sig(0), "clk").unwrap();
        rec.record_change(0, sig(0), Logic::Zero).unwrap();
        rec.record_change(19_861_000, sig(0), Logic::One).unwrap();
        rec.finalize().unwrap();
        assert!(output(rec).contains("#19861\n1!\n"));
    }

    #[test]
    fn unregistered_signal() {
        let mut rec = VcdRecorder::new(Vec::new());
        rec.register_signal(sig(0), "clk").unwrap();
        let err = rec.record_change(0, sig(3), Logic::One).unwrap_err();
        assert!(matches!(err, SimError::UnregisteredSignal { id: 3 }));
    }
}
