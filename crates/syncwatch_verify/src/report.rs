//! Summary of a passed verification run.

use std::fmt;

use serde::Serialize;
use syncwatch_sim::{SimTime, TimeUnit};

use crate::checkpoint::Measurement;

/// What a successful run observed.
///
/// Measurements are kept for diagnostics only; every one of them already
/// passed its check when it was taken.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunReport {
    /// Name of the verified mode.
    pub mode: String,
    /// Reference clock period.
    pub clock_period_fs: u64,
    /// Frames validated checkpoint by checkpoint.
    pub frames_validated: u32,
    /// Frame periods confirmed afterwards.
    pub periodicity_frames: u32,
    /// When measuring began.
    pub aligned_at: SimTime,
    /// Every passed checkpoint, in order.
    pub measurements: Vec<Measurement>,
    /// Simulated time at the end of the run.
    pub final_time: SimTime,
    /// Rising clock edges simulated.
    pub clock_cycles: u64,
}

impl RunReport {
    /// Observed cycle counts for one frame, in checkpoint order.
    ///
    /// `frame` is zero-based; returns `None` past the validated frames.
    pub fn frame_deltas(&self, frame: usize) -> Option<Vec<f64>> {
        if frame >= self.frames_validated as usize {
            return None;
        }
        Some(
            self.measurements
                .chunks(4)
                .nth(frame)?
                .iter()
                .map(|m| m.observed)
                .collect(),
        )
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: PASS ({} frame(s) validated, {} period(s) confirmed)",
            self.mode, self.frames_validated, self.periodicity_frames
        )?;
        writeln!(
            f,
            "  clock period {}, aligned at {}",
            SimTime::from_fs(self.clock_period_fs),
            self.aligned_at
        )?;
        for m in &self.measurements {
            writeln!(
                f,
                "  {:<20} {:>9} cycles  {} of {} at {:.6} ms",
                m.interval.to_string(),
                m.observed,
                m.edge,
                m.signal,
                m.time.in_unit(TimeUnit::Ms)
            )?;
        }
        write!(
            f,
            "  finished at {} after {} clock cycles",
            self.final_time, self.clock_cycles
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::Interval;
    use syncwatch_sim::Edge;

    fn measurement(interval: Interval, observed: u64) -> Measurement {
        Measurement {
            interval,
            signal: "hsync".into(),
            edge: Edge::Falling,
            expected: observed,
            observed: observed as f64,
            time: SimTime::from_ns(1_000),
        }
    }

    fn report() -> RunReport {
        RunReport {
            mode: "vga_640x480_60".into(),
            clock_period_fs: 39_722_000,
            frames_validated: 1,
            periodicity_frames: 1,
            aligned_at: SimTime::from_fs(9 * 39_722_000),
            measurements: vec![
                measurement(Interval::HsyncFrontPorch, 656),
                measurement(Interval::HsyncPulse, 96),
                measurement(Interval::VsyncFrontPorch, 391_056),
                measurement(Interval::VsyncPulse, 1600),
                measurement(Interval::FramePeriod, 420_000),
            ],
            final_time: SimTime::from_ns(50_000_000),
            clock_cycles: 1_000_000,
        }
    }

    #[test]
    fn text_report() {
        let text = report().to_string();
        assert!(text.starts_with("vga_640x480_60: PASS (1 frame(s) validated"));
        assert!(text.contains("hsync front porch"));
        assert!(text.contains("391056 cycles"));
        assert!(text.ends_with("finished at 50 ms after 1000000 clock cycles"));
    }

    #[test]
    fn json_report() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(json["mode"], "vga_640x480_60");
        assert_eq!(json["measurements"][0]["interval"], "hsync_front_porch");
        assert_eq!(json["measurements"][0]["edge"], "falling");
        assert_eq!(json["measurements"][0]["observed"], 656.0);
        assert_eq!(json["final_time"]["fs"], 50_000_000_000_000u64);
    }

    #[test]
    fn per_frame_deltas() {
        let r = report();
        assert_eq!(r.frame_deltas(0).unwrap(), vec![656.0, 96.0, 391_056.0, 1600.0]);
        assert_eq!(r.frame_deltas(1), None);
    }
}
