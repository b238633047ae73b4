//! Logging configuration.
//!
//! Logs go to stderr so reports on stdout stay machine-readable. `RUST_LOG`
//! replaces the level chosen from the command-line flags.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Filter directive for the given verbosity flags.
pub fn filter_directive(quiet: bool, verbose: bool) -> &'static str {
    if quiet {
        "error"
    } else if verbose {
        // Debug for syncwatch crates, info for dependencies
        "info,syncwatch_sim=debug,syncwatch_verify=debug,syncwatch_config=debug,syncwatch=debug"
    } else {
        "info"
    }
}

/// Installs the global subscriber.
pub fn init(quiet: bool, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(quiet, verbose)));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_span_events(FmtSpan::NONE);

    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(filter)
        .try_init();

    tracing::debug!(quiet, verbose, "Logging initialized");
}
