//! Structured logging initialization for the cmux CLI.
//!
//! Supports both human-friendly and machine-readable (JSON) output formats,
//! with TTY detection and verbosity control.

use std::io::{self, IsTerminal};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Default filter directive for a verbosity setting.
pub fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        "cmux=error"
    } else {
        match verbose {
            0 => "cmux=warn",
            1 => "cmux=info",
            2 => "cmux=debug",
            _ => "cmux=trace",
        }
    }
}

/// Initialize the tracing subscriber based on CLI flags and environment.
///
/// # Arguments
///
/// * `robot_mode` - If true, output structured JSON logs for machine consumption
/// * `verbose` - Verbosity level: 0 = warn, 1 = info, 2 = debug, 3+ = trace
/// * `quiet` - If true, only errors are logged
///
/// # Environment Variables
///
/// * `RUST_LOG` - Override default filter (e.g., "cmux=debug")
///
/// | Mode | TTY | Output |
/// |------|-----|--------|
/// | Robot | any | JSON lines to stderr |
/// | Human | yes | Colored output to stderr |
/// | Human | no | Compact plain output to stderr |
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_logging(robot_mode: bool, verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));

    let result = if robot_mode {
        let fmt_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .with_thread_ids(false)
            .with_span_events(FmtSpan::NONE)
            .with_writer(io::stderr);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
    } else if io::stderr().is_terminal() {
        let fmt_layer = fmt::layer()
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .with_thread_ids(false)
            .with_span_events(FmtSpan::NONE)
            .with_writer(io::stderr);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .with_thread_ids(false)
            .with_span_events(FmtSpan::NONE)
            .compact()
            .with_writer(io::stderr);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
