//! syncwatch: cycle-accurate hsync/vsync timing verification.
//!
//! Provides `syncwatch run` to check the reference sync generator (optionally
//! with injected timing faults), `syncwatch replay` to check sync signals
//! recorded in a VCD file, and `syncwatch modes` to list built-in video modes.

#![warn(missing_docs)]

mod logging;
mod modes;
mod pipeline;
mod replay;
mod run;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// syncwatch: video sync timing verifier.
#[derive(Parser, Debug)]
#[command(name = "syncwatch", version, about = "Cycle-accurate video sync timing verifier")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Path to a `syncwatch.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Verify the reference sync generator against a video mode.
    Run(RunArgs),
    /// Verify hsync/vsync recorded in a VCD file.
    Replay(ReplayArgs),
    /// List built-in video modes.
    Modes(ModesArgs),
}

/// Options shared by `run` and `replay` that override `syncwatch.toml`.
#[derive(Args, Debug, Default)]
pub struct RunOverrides {
    /// Built-in video mode to verify against.
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Clock period (e.g. "39.722ns").
    #[arg(long, conflicts_with = "frequency")]
    pub period: Option<String>,

    /// Clock frequency (e.g. "25.175MHz").
    #[arg(long)]
    pub frequency: Option<String>,

    /// Horizontal sync port, or VCD signal selector when replaying.
    #[arg(long)]
    pub hsync: Option<String>,

    /// Vertical sync port, or VCD signal selector when replaying.
    #[arg(long)]
    pub vsync: Option<String>,

    /// Frames to validate checkpoint by checkpoint.
    #[arg(long)]
    pub frames: Option<u32>,

    /// Frame periods to confirm after validation.
    #[arg(long)]
    pub periodicity_frames: Option<u32>,

    /// Fail a checkpoint one cycle after its expected edge instead of waiting.
    #[arg(long)]
    pub bound_waits: bool,

    /// Simulated-time limit (e.g. "100ms").
    #[arg(long)]
    pub watchdog: Option<String>,

    /// Output format for the run report.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `syncwatch run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Shared run options.
    #[command(flatten)]
    pub overrides: RunOverrides,

    /// Dump every signal to this VCD file.
    #[arg(short, long)]
    pub waveform: Option<PathBuf>,

    /// Timing the generator actually produces, when it differs.
    #[command(flatten)]
    pub dut: DutArgs,
}

/// Timing faults injected into the reference generator.
#[derive(Args, Debug, Default)]
pub struct DutArgs {
    /// Built-in mode the generator produces instead of the expected one.
    #[arg(long)]
    pub dut_mode: Option<String>,

    /// Horizontal front porch of the generator, in cycles.
    #[arg(long)]
    pub dut_h_front: Option<u64>,

    /// Horizontal sync width of the generator, in cycles.
    #[arg(long)]
    pub dut_h_sync: Option<u64>,

    /// Horizontal back porch of the generator, in cycles.
    #[arg(long)]
    pub dut_h_back: Option<u64>,

    /// Vertical front porch of the generator, in lines.
    #[arg(long)]
    pub dut_v_front: Option<u64>,

    /// Vertical sync width of the generator, in lines.
    #[arg(long)]
    pub dut_v_sync: Option<u64>,

    /// Vertical back porch of the generator, in lines.
    #[arg(long)]
    pub dut_v_back: Option<u64>,
}

/// Arguments for the `syncwatch replay` subcommand.
#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// VCD file holding the recorded sync signals.
    pub vcd: PathBuf,

    /// Shared run options.
    #[command(flatten)]
    pub overrides: RunOverrides,
}

/// Arguments for the `syncwatch modes` subcommand.
#[derive(Args, Debug)]
pub struct ModesArgs {
    /// Show one mode with its checkpoint cycle counts.
    pub name: Option<String>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Report output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    #[default]
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Optional path to a configuration file.
    pub config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.quiet, cli.verbose);

    let global = GlobalArgs {
        quiet: cli.quiet,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Run(ref args) => run::run(args, &global),
        Command::Replay(ref args) => replay::run(args, &global),
        Command::Modes(ref args) => modes::run(args),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
