//! `syncwatch modes`: list built-in video modes.

use std::error::Error;
use std::fmt::Write as _;

use syncwatch_config::ConfigError;
use syncwatch_verify::{AxisTiming, VideoMode};

use crate::{ModesArgs, ReportFormat};

/// Runs the `syncwatch modes` command.
pub fn run(args: &ModesArgs) -> Result<i32, Box<dyn Error>> {
    let output = match &args.name {
        Some(name) => {
            let mode =
                VideoMode::builtin(name).ok_or_else(|| ConfigError::UnknownMode(name.clone()))?;
            match args.format {
                ReportFormat::Text => describe_mode(&mode),
                ReportFormat::Json => serde_json::to_string_pretty(&mode)?,
            }
        }
        None => {
            let modes = VideoMode::builtins();
            match args.format {
                ReportFormat::Text => mode_table(&modes),
                ReportFormat::Json => serde_json::to_string_pretty(&modes)?,
            }
        }
    };
    println!("{output}");
    Ok(0)
}

fn axis(a: &AxisTiming) -> String {
    format!(
        "{}/{}/{}/{} {}",
        a.active,
        a.front_porch,
        a.sync,
        a.back_porch,
        a.polarity.sign()
    )
}

/// One line per mode: name, pixel clock, both axes, and frame length.
fn mode_table(modes: &[VideoMode]) -> String {
    let mut out = format!(
        "{:<18} {:>12}  {:<22} {:<18} {:>12}",
        "MODE", "PIXEL CLOCK", "HORIZONTAL", "VERTICAL", "FRAME CYCLES"
    );
    for mode in modes {
        let clock = mode
            .pixel_clock
            .map(|f| f.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = write!(
            out,
            "\n{:<18} {:>12}  {:<22} {:<18} {:>12}",
            mode.name,
            clock,
            axis(&mode.horizontal),
            axis(&mode.vertical),
            mode.frame_cycles()
        );
    }
    out
}

/// Full breakdown of one mode, including every checkpoint it implies.
fn describe_mode(mode: &VideoMode) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", mode.name);
    if let Some(clock) = mode.pixel_clock {
        let _ = writeln!(out, "  pixel clock   {clock}");
    }
    for (label, a) in [("horizontal", &mode.horizontal), ("vertical", &mode.vertical)] {
        let _ = write!(out, "  {label:<13}");
        for (name, len) in a.intervals() {
            let _ = write!(out, " {name} {len},");
        }
        let _ = writeln!(out, " polarity {}", a.polarity.sign());
    }
    let _ = writeln!(out, "  line          {} cycles", mode.line_cycles());
    let _ = writeln!(
        out,
        "  frame         {} lines, {} cycles",
        mode.frame_lines(),
        mode.frame_cycles()
    );
    let _ = writeln!(out, "  checkpoints");
    let checkpoints = [
        ("hsync front porch", mode.hsync_front_porch_cycles()),
        ("hsync pulse", mode.hsync_pulse_cycles()),
        ("hsync back porch", mode.hsync_back_porch_cycles()),
        ("vsync front porch", mode.vsync_front_porch_cycles()),
        ("vsync pulse", mode.vsync_pulse_cycles()),
        ("vsync back porch", mode.vsync_back_porch_cycles()),
        ("frame period", mode.frame_cycles()),
    ];
    for (name, cycles) in checkpoints {
        let _ = write!(out, "\n    {name:<18} {cycles:>9}");
    }
    out
}
