//! Configuration types deserialized from `syncwatch.toml`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::PathBuf;
use syncwatch_common::Logic;
use syncwatch_sim::TimeUnit;
use syncwatch_verify::{AxisTiming, ResetPolarity};

/// The top-level run configuration parsed from `syncwatch.toml`.
///
/// Every section is optional. The video mode must come from the file or
/// from the command line before the configuration can be resolved.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SyncwatchConfig {
    /// Expected video timing: a built-in name or an inline table.
    pub mode: Option<ModeSpec>,
    /// Reference clock.
    pub clock: ClockConfig,
    /// Reset phase.
    pub reset: ResetConfig,
    /// Observed sync ports.
    pub probes: ProbeConfig,
    /// Constant levels driven onto other inputs, by port name.
    pub inputs: BTreeMap<String, InputLevel>,
    /// Run length and limits.
    pub run: RunConfig,
    /// Optional waveform dump.
    pub waveform: WaveformConfig,
}

/// A video mode reference.
///
/// Uses serde's untagged enum to accept either `mode = "vga_640x480_60"` or
/// a `[mode]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ModeSpec {
    /// A built-in mode name.
    Named(String),
    /// A mode spelled out interval by interval.
    Inline(InlineMode),
}

/// A custom video mode.
#[derive(Debug, Clone, Deserialize)]
pub struct InlineMode {
    /// Name used in logs and reports.
    #[serde(default = "default_mode_name")]
    pub name: String,
    /// Nominal pixel clock (e.g. `"25.175MHz"`), used when `[clock]` gives no rate.
    #[serde(default)]
    pub pixel_clock: Option<String>,
    /// Horizontal intervals in clock cycles.
    pub horizontal: AxisTiming,
    /// Vertical intervals in lines.
    pub vertical: AxisTiming,
}

fn default_mode_name() -> String {
    "custom".to_string()
}

/// The reference clock. `period` and `frequency` are mutually exclusive.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Clock port name.
    pub port: String,
    /// Clock period as a duration (e.g. `"39.722ns"`).
    pub period: Option<String>,
    /// Clock frequency (e.g. `"25.175MHz"`).
    pub frequency: Option<String>,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            port: "clk".to_string(),
            period: None,
            frequency: None,
        }
    }
}

/// The reset phase at the start of a run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResetConfig {
    /// Drive the reset port. When false the run only waits `cycles`.
    pub enabled: bool,
    /// Reset port name.
    pub port: String,
    /// Which level asserts reset (`"low"` or `"high"`).
    pub active: ResetPolarity,
    /// Rising clock edges to hold reset for.
    pub cycles: u64,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: "rst_n".to_string(),
            active: ResetPolarity::ActiveLow,
            cycles: 10,
        }
    }
}

/// Names of the observed sync ports. In replay these are VCD selectors
/// such as `tb.uo_out[7]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Horizontal sync.
    pub hsync: String,
    /// Vertical sync.
    pub vsync: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            hsync: "hsync".to_string(),
            vsync: "vsync".to_string(),
        }
    }
}

/// Run length and limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Frames to validate checkpoint by checkpoint.
    pub frames: u32,
    /// Frame periods to confirm afterwards.
    pub periodicity_frames: u32,
    /// Fail a wait that runs one cycle past its expected count.
    pub bound_waits: bool,
    /// Simulated-time limit as a duration (e.g. `"100ms"`).
    pub watchdog: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            frames: 1,
            periodicity_frames: 1,
            bound_waits: false,
            watchdog: None,
        }
    }
}

/// Waveform dump settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WaveformConfig {
    /// Output VCD path; no dump when absent.
    pub path: Option<PathBuf>,
    /// VCD timescale unit.
    pub timescale: Timescale,
}

/// A VCD timescale unit, femtoseconds unless configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Timescale(pub TimeUnit);

impl Default for Timescale {
    fn default() -> Self {
        Self(TimeUnit::Fs)
    }
}

/// A constant input level.
///
/// Accepts `1`, `0`, `true`, `false`, or a one-character string such as
/// `"x"`, so `ena = 1` and `ui_in = "0"` both work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputLevel(pub Logic);

impl<'de> Deserialize<'de> for InputLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct LevelVisitor;

        impl Visitor<'_> for LevelVisitor {
            type Value = InputLevel;

            fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                formatter.write_str("0, 1, a boolean, or one of \"0\", \"1\", \"x\", \"z\"")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(InputLevel(Logic::from_bool(v)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                match v {
                    0 => Ok(InputLevel(Logic::Zero)),
                    1 => Ok(InputLevel(Logic::One)),
                    _ => Err(E::invalid_value(de::Unexpected::Signed(v), &self)),
                }
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                match v {
                    0 => Ok(InputLevel(Logic::Zero)),
                    1 => Ok(InputLevel(Logic::One)),
                    _ => Err(E::invalid_value(de::Unexpected::Unsigned(v), &self)),
                }
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                let mut chars = v.trim().chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Logic::from_char(c)
                        .map(InputLevel)
                        .ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self)),
                    _ => Err(E::invalid_value(de::Unexpected::Str(v), &self)),
                }
            }
        }

        deserializer.deserialize_any(LevelVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncwatch_verify::SyncPolarity;

    #[test]
    fn defaults_when_empty() {
        let config: SyncwatchConfig = toml::from_str("").unwrap();
        assert!(config.mode.is_none());
        assert_eq!(config.clock.port, "clk");
        assert!(config.reset.enabled);
        assert_eq!(config.reset.port, "rst_n");
        assert_eq!(config.reset.active, ResetPolarity::ActiveLow);
        assert_eq!(config.reset.cycles, 10);
        assert_eq!(config.probes.hsync, "hsync");
        assert_eq!(config.run.frames, 1);
        assert_eq!(config.run.periodicity_frames, 1);
        assert_eq!(config.waveform.timescale, Timescale(TimeUnit::Fs));
    }

    #[test]
    fn named_mode() {
        let config: SyncwatchConfig = toml::from_str(r#"mode = "vga_640x480_60""#).unwrap();
        assert!(matches!(config.mode, Some(ModeSpec::Named(ref n)) if n == "vga_640x480_60"));
    }

    #[test]
    fn inline_mode() {
        let toml = r#"
[mode]
name = "tiny"
pixel_clock = "1MHz"
horizontal = { active = 8, front_porch = 2, sync = 3, back_porch = 3 }
vertical = { active = 6, front_porch = 1, sync = 2, back_porch = 2, polarity = "positive" }
"#;
        let config: SyncwatchConfig = toml::from_str(toml).unwrap();
        let Some(ModeSpec::Inline(mode)) = config.mode else {
            panic!("expected an inline mode");
        };
        assert_eq!(mode.name, "tiny");
        assert_eq!(mode.horizontal.polarity, SyncPolarity::Negative);
        assert_eq!(mode.vertical.polarity, SyncPolarity::Positive);
        assert_eq!(mode.vertical.sync, 2);
    }

    #[test]
    fn input_levels() {
        let toml = r#"
[inputs]
ena = 1
ui_in = "0"
uio_in = false
spare = "z"
"#;
        let config: SyncwatchConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.inputs["ena"], InputLevel(Logic::One));
        assert_eq!(config.inputs["ui_in"], InputLevel(Logic::Zero));
        assert_eq!(config.inputs["uio_in"], InputLevel(Logic::Zero));
        assert_eq!(config.inputs["spare"], InputLevel(Logic::Z));
    }

    #[test]
    fn input_level_out_of_range() {
        assert!(toml::from_str::<SyncwatchConfig>("[inputs]\nena = 2").is_err());
        assert!(toml::from_str::<SyncwatchConfig>("[inputs]\nena = \"hi\"").is_err());
    }

    #[test]
    fn active_high_reset() {
        let config: SyncwatchConfig =
            toml::from_str("[reset]\nport = \"rst\"\nactive = \"high\"").unwrap();
        assert_eq!(config.reset.active, ResetPolarity::ActiveHigh);
        assert_eq!(config.reset.cycles, 10);
    }

    #[test]
    fn waveform_timescale() {
        let config: SyncwatchConfig =
            toml::from_str("[waveform]\npath = \"run.vcd\"\ntimescale = \"ps\"").unwrap();
        assert_eq!(config.waveform.path, Some(PathBuf::from("run.vcd")));
        assert_eq!(config.waveform.timescale, Timescale(TimeUnit::Ps));
    }
}
