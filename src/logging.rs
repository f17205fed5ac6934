//! Structured logging initialization for the keypad binary.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! job of whoever runs the control loop (normally `main`).

use std::io::{self, IsTerminal};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Filter directive used when `RUST_LOG` is not set.
///
/// `quiet` wins over `verbose`: 0 = info, 1 = debug, 2+ = trace.
#[must_use]
pub const fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "keypad=error";
    }
    match verbose {
        0 => "keypad=info",
        1 => "keypad=debug",
        _ => "keypad=trace",
    }
}

/// Initialize the tracing subscriber based on CLI flags and environment.
///
/// | Mode | TTY | Output |
/// |------|-----|--------|
/// | Robot | any | JSON lines to stderr |
/// | Human | yes | Pretty colored output to stderr |
/// | Human | no | Compact plain output to stderr |
///
/// `RUST_LOG` overrides the verbosity flags (e.g. `keypad::actions=trace`).
pub fn init_logging(robot_mode: bool, verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));
    let registry = tracing_subscriber::registry().with(filter);

    // try_init: a second call (tests, embedding) keeps the first subscriber
    if robot_mode {
        let layer = fmt::layer()
            .json()
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .with_span_events(FmtSpan::NONE)
            .with_writer(io::stderr);
        let _ = registry.with(layer).try_init();
    } else if io::stderr().is_terminal() {
        let layer = fmt::layer()
            .with_target(false)
            .with_span_events(FmtSpan::NONE)
            .with_writer(io::stderr);
        let _ = registry.with(layer).try_init();
    } else {
        let layer = fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_span_events(FmtSpan::NONE)
            .compact()
            .with_writer(io::stderr);
        let _ = registry.with(layer).try_init();
    }
}
