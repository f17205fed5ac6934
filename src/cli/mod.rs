//! CLI argument definitions and command dispatch.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Macro keypad - chorded four-button keypad driven by a declarative config.
///
/// Robot Mode: Use --robot or --format=json for machine-parseable output.
#[derive(Parser, Debug)]
#[command(name = "keypad", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (text for humans, json for agents/scripts, yaml for config export)
    #[arg(
        long,
        short = 'f',
        default_value = "text",
        global = true,
        env = "KEYPAD_FORMAT"
    )]
    pub format: OutputFormat,

    /// Robot mode: equivalent to --format=json
    #[arg(long, global = true)]
    pub robot: bool,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Directory holding config.yaml (default: platform config dir + /keypad)
    #[arg(long, global = true, env = "KEYPAD_CONFIG_DIR", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Directory tried when the primary has no config.yaml
    #[arg(long, global = true, env = "KEYPAD_FALLBACK_DIR", value_name = "DIR")]
    pub fallback_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text with optional color
    #[default]
    Text,
    /// JSON output for scripts and agents
    Json,
    /// Compact JSON (single line)
    JsonCompact,
    /// YAML (config export)
    Yaml,
}

impl Cli {
    /// Returns true if output should be JSON (robot mode or explicit --format=json).
    pub const fn use_json(&self) -> bool {
        self.robot || matches!(self.format, OutputFormat::Json | OutputFormat::JsonCompact)
    }

    /// Returns true if output should be compact JSON.
    pub const fn use_compact_json(&self) -> bool {
        matches!(self.format, OutputFormat::JsonCompact)
    }

    pub const fn use_yaml(&self) -> bool {
        !self.robot && matches!(self.format, OutputFormat::Yaml)
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    // === Configuration ===
    /// Parse and validate a configuration, listing every problem
    Check(CheckArgs),

    /// Print the parsed configuration
    Show(ShowArgs),

    /// List profiles and the active one
    Profiles(SourceArgs),

    // === Actions ===
    /// Run a key's actions (keyboard output printed, not sent)
    Dispatch(DispatchArgs),

    /// Run a macro script on the console keyboard
    Macro(MacroArgs),

    /// Parse and optionally send an HTTP request descriptor
    Request(RequestArgs),

    // === Device ===
    /// Drive the keypad from a Stream Deck's first four buttons
    Run(RunArgs),

    /// List connected Stream Deck devices
    Devices,

    // === Utilities ===
    /// Show version and build information
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// === Argument Structs ===

/// Where to read the configuration from.
#[derive(Parser, Debug, Default)]
pub struct SourceArgs {
    /// Read this file instead of the config directories
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Parser, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Only show this profile
    #[arg(long, short = 'p')]
    pub profile: Option<String>,
}

/// Arguments for running one key.
///
/// # Examples
///
/// ```bash
/// # Run key "copy" from the active profile
/// keypad dispatch copy
///
/// # Run whatever is bound to chord event 5
/// keypad dispatch --event 5
///
/// # Use a specific profile and never touch the network
/// keypad dispatch copy --profile work --offline
/// ```
#[derive(Parser, Debug)]
pub struct DispatchArgs {
    /// Key id (or event id with --event)
    pub key: String,

    /// Treat KEY as a chord event id (1-10)
    #[arg(long, short = 'e')]
    pub event: bool,

    /// Profile to activate first
    #[arg(long, short = 'p')]
    pub profile: Option<String>,

    /// Do not send HTTP requests (http_request actions fail)
    #[arg(long)]
    pub offline: bool,

    /// Read this file instead of the config directories
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct MacroArgs {
    /// Script, e.g. "press:CTRL+C; delay:50; release:CTRL+C"
    pub script: String,

    /// Skip delay steps instead of sleeping
    #[arg(long, short = 'n')]
    pub no_delay: bool,
}

#[derive(Parser, Debug)]
pub struct RequestArgs {
    /// Descriptor text; `\n` separates fields
    pub descriptor: String,

    /// Show the parsed request without sending it
    #[arg(long, short = 'n')]
    pub dry_run: bool,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Target device by serial number (required if multiple devices connected)
    #[arg(long, short = 's', env = "KEYPAD_SERIAL")]
    pub serial: Option<String>,

    /// Profile to activate
    #[arg(long, short = 'p')]
    pub profile: Option<String>,

    /// Exit after the first event
    #[arg(long)]
    pub once: bool,

    /// Timeout in seconds (0 = no timeout)
    #[arg(long, short = 't', default_value = "0")]
    pub timeout: u64,

    /// Milliseconds between samples
    #[arg(long, default_value = "5")]
    pub poll_ms: u32,

    /// Do not send HTTP requests
    #[arg(long)]
    pub offline: bool,
}

#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
