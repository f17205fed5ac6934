//! Macro keypad CLI - validate configurations, try actions and drive the keypad.
//!
//! Provides both human-friendly and agent-friendly (robot mode) interfaces.
#![forbid(unsafe_code)]

use std::fs;
use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use console::style;
use serde::Serialize;
use tracing::debug;

use keypad::actions::{
    ActionRegistry, ActionStatus, execute_request, parse_macro_script, parse_request_descriptor,
    run_macro,
};
use keypad::cli::{self, Cli, Commands};
use keypad::config::{
    ActionConfig, ConfigLimits, ConfigLoader, ConfigSource, DirectorySource, KeyConfig,
    MemorySource, Scope, default_fallback_dir, default_primary_dir,
};
use keypad::device::{
    self, ConsoleKeyboard, ReqwestTransport, SharedKeyboard, Sleeper, StreamDeckSampler,
    ThreadSleeper,
};
use keypad::error::{KeypadError, Result, ResultExt};
use keypad::logging;
use keypad::runtime::{KeyEvent, Keypad, RunOptions};

/// Build information embedded at compile time.
mod build_info {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    pub fn git_sha() -> &'static str {
        option_env!("VERGEN_GIT_SHA").unwrap_or("unknown")
    }

    pub fn git_dirty() -> &'static str {
        option_env!("VERGEN_GIT_DIRTY").unwrap_or("false")
    }

    pub fn build_timestamp() -> &'static str {
        option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown")
    }

    pub fn rustc_semver() -> &'static str {
        option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown")
    }

    pub fn target() -> &'static str {
        option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown")
    }
}

fn main() {
    let cli = Cli::parse();

    // Handle no-color flag or non-TTY
    if cli.no_color || !io::stdout().is_terminal() {
        console::set_colors_enabled(false);
    }
    if cli.no_color || !io::stderr().is_terminal() {
        console::set_colors_enabled_stderr(false);
    }

    logging::init_logging(cli.use_json(), cli.verbose, cli.quiet);

    if let Err(e) = run(&cli) {
        output_error(&cli, &e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        None => print_quick_start(cli),
        Some(Commands::Check(args)) => cmd_check(cli, args),
        Some(Commands::Show(args)) => cmd_show(cli, args),
        Some(Commands::Profiles(args)) => cmd_profiles(cli, args),
        Some(Commands::Dispatch(args)) => cmd_dispatch(cli, args),
        Some(Commands::Macro(args)) => cmd_macro(cli, args),
        Some(Commands::Request(args)) => cmd_request(cli, args),
        Some(Commands::Run(args)) => cmd_run(cli, args),
        Some(Commands::Devices) => cmd_devices(cli),
        Some(Commands::Version) => cmd_version(cli),
        Some(Commands::Completions(args)) => cmd_completions(cli, args),
    }
}

// === Quick Start (Robot Mode Optimized) ===

#[allow(clippy::unnecessary_wraps)] // Consistent return type with other commands
fn print_quick_start(cli: &Cli) -> Result<()> {
    if cli.use_json() {
        let help = RobotQuickStart {
            tool: "keypad",
            version: build_info::VERSION,
            description: "Chorded macro keypad: config validation, action dispatch and control loop",
            config: RobotConfig {
                validate: "keypad check [FILE] --robot",
                show: "keypad show --format yaml",
                profiles: "keypad profiles --robot",
                location: "$KEYPAD_CONFIG_DIR/config.yaml, then $KEYPAD_FALLBACK_DIR/config.yaml",
            },
            actions: RobotActions {
                dispatch_key: "keypad dispatch <KEY_ID> --robot",
                dispatch_event: "keypad dispatch <1-10> --event --robot",
                run_macro: "keypad macro 'press:CTRL+C; release:CTRL+C'",
                preview_request: "keypad request 'url: http://host/hook' --dry-run",
            },
            chords: ChordLayout {
                singles: "buttons 0,1,2,3 -> events 1,2,3,4",
                pairs: "0+1 -> 5, 0+2 -> 6, 1+2 -> 7, 2+3 -> 9, 0+3 -> 10",
                all: "all four -> 8",
            },
            output_modes: OutputModes {
                human: "--format=text (default)",
                robot: "--robot or --format=json",
                compact: "--format=json-compact",
                yaml: "--format=yaml",
            },
            device: "keypad run --serial <SERIAL> when multiple Stream Decks are connected",
        };
        output_json(cli, &help)
    } else {
        print_human_quick_start();
        Ok(())
    }
}

fn print_human_quick_start() {
    println!(
        "{} {} - Macro keypad\n",
        style("keypad").bold().cyan(),
        build_info::VERSION
    );

    println!("{}", style("QUICK START").bold().underlined());
    println!();
    println!("  {}  Validate config.yaml", style("keypad check").green());
    println!("  {}  Print the parsed config", style("keypad show").green());
    println!("  {}  List profiles", style("keypad profiles").green());
    println!("  {}  Run one key", style("keypad dispatch copy").green());
    println!(
        "  {}  Try a macro",
        style("keypad macro 'text:hello'").green()
    );
    println!("  {}  Drive from a Stream Deck", style("keypad run").green());
    println!();

    println!("{}", style("ROBOT MODE (for agents)").bold().underlined());
    println!();
    println!("  {}  JSON output", style("keypad --robot <command>").cyan());
    println!("  {}  Quick-start JSON", style("keypad --robot").cyan());
    println!();

    println!("{}", style("CHORDS").bold().underlined());
    println!();
    println!("  [0]=1  [1]=2  [2]=3  [3]=4");
    println!("  [0+1]=5  [0+2]=6  [1+2]=7  [2+3]=9  [0+3]=10  [all]=8");
    println!();

    println!("Run {} for full help", style("keypad --help").yellow());
}

// === Robot Mode JSON Structures ===

#[derive(Serialize)]
struct RobotQuickStart {
    tool: &'static str,
    version: &'static str,
    description: &'static str,
    config: RobotConfig,
    actions: RobotActions,
    chords: ChordLayout,
    output_modes: OutputModes,
    device: &'static str,
}

#[derive(Serialize)]
struct RobotConfig {
    validate: &'static str,
    show: &'static str,
    profiles: &'static str,
    location: &'static str,
}

#[derive(Serialize)]
struct RobotActions {
    dispatch_key: &'static str,
    dispatch_event: &'static str,
    run_macro: &'static str,
    preview_request: &'static str,
}

#[derive(Serialize)]
struct ChordLayout {
    singles: &'static str,
    pairs: &'static str,
    all: &'static str,
}

#[derive(Serialize)]
struct OutputModes {
    human: &'static str,
    robot: &'static str,
    compact: &'static str,
    yaml: &'static str,
}

#[derive(Serialize)]
struct CheckReport<'a> {
    valid: bool,
    source: Option<&'a str>,
    lines: Option<usize>,
    sha256: Option<&'a str>,
    profiles: usize,
    errors: &'a [String],
    diagnostics: &'a [String],
}

#[derive(Serialize)]
struct ProfileSummary<'a> {
    id: &'a str,
    label: &'a str,
    active: bool,
    keys: usize,
    actions: usize,
}

#[derive(Serialize)]
struct MacroOutcome<'a> {
    steps: usize,
    steps_run: usize,
    unresolved: &'a [String],
}

// === Config Loading ===

/// Sources for the config: one file, or the primary/fallback directories.
fn config_sources(
    cli: &Cli,
    file: Option<&Path>,
) -> Result<(Box<dyn ConfigSource>, Option<Box<dyn ConfigSource>>)> {
    if let Some(file) = file {
        let text = match fs::read_to_string(file) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(KeypadError::ConfigNotFound {
                    path: file.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let source = MemorySource::with_config(file.display().to_string(), text);
        return Ok((Box::new(source), None));
    }

    let primary_dir = match &cli.config_dir {
        Some(dir) => dir.clone(),
        None => default_primary_dir().ok_or_else(|| {
            KeypadError::Other("Could not determine config directory; pass --config-dir".into())
        })?,
    };
    let primary = DirectorySource::with_expanded_root("primary", &primary_dir)?;

    // The platform fallback only applies when the primary is the platform default too
    let fallback_dir = cli
        .fallback_dir
        .clone()
        .or_else(|| cli.config_dir.is_none().then(default_fallback_dir).flatten());
    let fallback = match fallback_dir {
        Some(dir) => Some(
            Box::new(DirectorySource::with_expanded_root("fallback", &dir)?)
                as Box<dyn ConfigSource>,
        ),
        None => None,
    };
    debug!(primary = %primary.root().display(), fallback = fallback.is_some(), "Config sources");
    Ok((Box::new(primary), fallback))
}

fn load_config(cli: &Cli, file: Option<&Path>) -> Result<ConfigLoader> {
    let (primary, fallback) = config_sources(cli, file)?;
    let mut loader = ConfigLoader::new(primary, fallback);
    loader.reload_config()?;
    Ok(loader)
}

/// Registry printing keyboard output, with real HTTP unless `offline`.
fn build_registry(cli: &Cli, offline: bool) -> Result<ActionRegistry> {
    let keyboard = console_keyboard(cli);
    let registry = ActionRegistry::new().with_keyboard(keyboard);
    if offline {
        return Ok(registry);
    }
    Ok(registry.with_http(Arc::new(Mutex::new(ReqwestTransport::new()?))))
}

/// Keyboard lines go to stderr when stdout carries JSON.
fn console_keyboard(cli: &Cli) -> SharedKeyboard {
    if cli.use_json() {
        Arc::new(Mutex::new(ConsoleKeyboard::new(io::stderr())))
    } else {
        Arc::new(Mutex::new(ConsoleKeyboard::stdout()))
    }
}

// === Command Implementations ===

fn cmd_check(cli: &Cli, args: &cli::CheckArgs) -> Result<()> {
    let (primary, fallback) = config_sources(cli, args.source.file.as_deref())?;
    let mut loader = ConfigLoader::new(primary, fallback);

    let errors = match loader.reload_config() {
        Ok(()) => Vec::new(),
        Err(KeypadError::ConfigInvalid { errors }) => errors,
        Err(e) => return Err(e),
    };

    let config = loader.config();
    let provenance = loader.provenance();
    if cli.use_json() {
        output_json(
            cli,
            &CheckReport {
                valid: errors.is_empty(),
                source: provenance.map(|p| p.source.as_str()),
                lines: provenance.map(|p| p.lines),
                sha256: provenance.map(|p| p.sha256.as_str()),
                profiles: config.profiles.len(),
                errors: &errors,
                diagnostics: loader.diagnostics(),
            },
        )?;
    } else if errors.is_empty() {
        if !cli.quiet {
            if let Some(p) = provenance {
                println!(
                    "{} {} is valid ({} lines, sha256 {})",
                    style("✓").green(),
                    p.source,
                    p.lines,
                    short_digest(&p.sha256)
                );
            }
        }
    } else {
        for error in &errors {
            println!("{} {error}", style("✗").red());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(KeypadError::ConfigInvalid { errors })
    }
}

fn cmd_show(cli: &Cli, args: &cli::ShowArgs) -> Result<()> {
    let loader = load_config(cli, args.source.file.as_deref())?;
    let config = loader.config();

    if let Some(id) = &args.profile {
        let profile = config
            .find_profile(id)
            .ok_or_else(|| KeypadError::ProfileNotFound { id: id.clone() })?;
        if cli.use_json() || cli.use_yaml() {
            return output_structured(cli, profile);
        }
        println!("{} {}", style("profile").bold(), style(&profile.id).cyan());
        print_scope(&profile.scope());
        return Ok(());
    }

    if cli.use_json() || cli.use_yaml() {
        return output_structured(cli, config.as_ref());
    }

    println!(
        "{} v{}  debounce {}ms",
        style("config").bold(),
        config.version,
        config.debounce_ms
    );
    if config.profiles.is_empty() {
        print_scope(&config.fallback_scope());
    }
    let active = config.active_profile().map(|p| p.id.as_str());
    for profile in &config.profiles {
        let marker = if Some(profile.id.as_str()) == active {
            " (active)"
        } else {
            ""
        };
        println!(
            "{} {}{marker}",
            style("profile").bold(),
            style(&profile.id).cyan()
        );
        print_scope(&profile.scope());
    }
    Ok(())
}

fn print_scope(scope: &Scope<'_>) {
    for key in scope.keys {
        print_key(key);
    }
    for action in scope.actions {
        print_action(action, 1);
    }
}

fn print_key(key: &KeyConfig) {
    let binding = if key.action_id.is_empty() {
        String::new()
    } else {
        format!(" -> {}", key.action_id)
    };
    let disabled = if key.enabled { "" } else { " (disabled)" };
    println!(
        "  key {} [{}]{binding}{disabled}",
        style(&key.id).green(),
        key.key_index
    );
    for action in &key.actions {
        print_action(action, 2);
    }
}

fn print_action(action: &ActionConfig, depth: usize) {
    let indent = "  ".repeat(depth);
    let mut details = Vec::new();
    if !action.payload.is_empty() {
        details.push(format!("payload {:?}", action.payload));
    }
    if action.repeat != 1 {
        details.push(format!("x{}", action.repeat));
    }
    if action.delay_ms > 0 {
        details.push(format!("delay {}ms", action.delay_ms));
    }
    if !action.steps.is_empty() {
        details.push(format!("{} steps", action.steps.len()));
    }
    if let Some(request) = &action.http_request {
        details.push(format!("{} {}", request.method, request.url));
    }
    if !action.enabled {
        details.push("disabled".to_string());
    }
    println!(
        "{indent}action {} ({}) {}",
        style(action.label()).yellow(),
        action.action_type,
        details.join(", ")
    );
    for child in &action.actions {
        print_action(child, depth + 1);
    }
}

fn cmd_profiles(cli: &Cli, args: &cli::SourceArgs) -> Result<()> {
    let loader = load_config(cli, args.file.as_deref())?;
    let config = loader.config();
    let active = config.active_profile().map(|p| p.id.as_str());

    let profiles: Vec<_> = config
        .profiles
        .iter()
        .map(|p| ProfileSummary {
            id: &p.id,
            label: &p.label,
            active: Some(p.id.as_str()) == active,
            keys: p.keys.len(),
            actions: p.actions.len(),
        })
        .collect();

    if cli.use_json() {
        output_json(cli, &profiles)?;
    } else if profiles.is_empty() {
        println!("{}", style("No profiles (flat keys/actions in use)").yellow());
    } else {
        for p in &profiles {
            let marker = if p.active { "*" } else { " " };
            println!(
                "{marker} {} {} ({} keys, {} actions)",
                style(p.id).green(),
                p.label,
                p.keys,
                p.actions
            );
        }
    }
    Ok(())
}

fn cmd_dispatch(cli: &Cli, args: &cli::DispatchArgs) -> Result<()> {
    let loader = load_config(cli, args.file.as_deref())?;
    let registry = build_registry(cli, args.offline)?;
    let mut keypad = Keypad::new(loader, registry, Box::new(ThreadSleeper));
    if let Some(profile) = &args.profile {
        keypad.set_active_profile(profile)?;
    }

    let event = if args.event {
        let event_id = args.key.parse::<u8>().with_context(|| {
            format!("Invalid event id '{}': expected 1-10", args.key)
        })?;
        keypad.handle_event(event_id)
    } else {
        keypad.handle_key(&args.key)?
    };

    report_event(cli, &event)?;
    status_to_result(&event.status)
}

fn report_event(cli: &Cli, event: &KeyEvent) -> Result<()> {
    if cli.use_json() {
        return output_json(cli, event);
    }
    if cli.quiet && event.status.success {
        return Ok(());
    }
    let key = event.key.as_deref().unwrap_or("(unbound)");
    let outcome = if event.status.success {
        style("ok").green()
    } else {
        style("failed").red()
    };
    let detail = if event.status.message.is_empty() {
        String::new()
    } else {
        format!(": {}", event.status.message)
    };
    println!(
        "[{}] event {} {key} {outcome}{detail}",
        event.timestamp.format("%H:%M:%S"),
        event.event_id
    );
    Ok(())
}

fn status_to_result(status: &ActionStatus) -> Result<()> {
    if status.success {
        Ok(())
    } else {
        Err(KeypadError::ActionFailed {
            code: status.status_code,
            message: status.message.clone(),
        })
    }
}

/// Sleeper for `--no-delay`.
struct SkipDelays;

impl Sleeper for SkipDelays {
    fn pause(&self, ms: u32) {
        debug!(ms, "Skipping delay");
    }
}

fn cmd_macro(cli: &Cli, args: &cli::MacroArgs) -> Result<()> {
    let limits = ConfigLimits::default();
    let steps = parse_macro_script(&args.script, &limits);
    if steps.is_empty() {
        return Err(KeypadError::Other(format!(
            "No valid macro steps in '{}'",
            args.script
        )));
    }

    let keyboard = console_keyboard(cli);
    let report = {
        let mut output = device::lock_shared(&keyboard);
        if args.no_delay {
            run_macro(&steps, &mut *output, &SkipDelays, &limits)
        } else {
            run_macro(&steps, &mut *output, &ThreadSleeper, &limits)
        }
    };

    if cli.use_json() {
        output_json(
            cli,
            &MacroOutcome {
                steps: steps.len(),
                steps_run: report.steps_run,
                unresolved: &report.unresolved,
            },
        )?;
    } else if !report.unresolved.is_empty() {
        println!(
            "{}: unresolved keys {}",
            style("Warning").yellow(),
            report.unresolved.join(", ")
        );
    } else if !cli.quiet {
        println!("{} {} step(s)", style("✓").green(), report.steps_run);
    }
    Ok(())
}

fn cmd_request(cli: &Cli, args: &cli::RequestArgs) -> Result<()> {
    let definition = parse_request_descriptor(&args.descriptor);

    if args.dry_run {
        if cli.use_json() || cli.use_yaml() {
            return output_structured(cli, &definition);
        }
        println!(
            "{} {}",
            style(definition.method.to_ascii_uppercase()).bold(),
            definition.url
        );
        for (name, value) in &definition.headers {
            println!("{name}: {value}");
        }
        if !definition.body.is_empty() {
            println!();
            println!("{}", definition.body);
        }
        println!(
            "{}",
            style(format!(
                "timeout {}ms, retries {}",
                definition.timeout_ms, definition.retries
            ))
            .dim()
        );
        return Ok(());
    }

    let mut transport = ReqwestTransport::new()?;
    let status = execute_request(&definition, &mut transport, &ConfigLimits::default());

    if cli.use_json() {
        output_json(cli, &status)?;
    } else if status.success && !cli.quiet {
        println!("{} HTTP {}", style("✓").green(), status.status_code);
    }
    status_to_result(&status)
}

fn cmd_run(cli: &Cli, args: &cli::RunArgs) -> Result<()> {
    let loader = load_config(cli, None)?;
    let registry = build_registry(cli, args.offline)?;
    let mut keypad = Keypad::new(loader, registry, Box::new(ThreadSleeper));
    if let Some(profile) = &args.profile {
        keypad.set_active_profile(profile)?;
    }

    let mut sampler = StreamDeckSampler::open(args.serial.as_deref())?;
    if !cli.quiet && !cli.use_json() {
        println!(
            "Listening on {} (Ctrl+C to stop)...",
            style(sampler.serial()).cyan()
        );
    }

    let options = RunOptions {
        poll_interval_ms: args.poll_ms,
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        max_events: args.once.then_some(1),
    };
    let compact = cli.use_json();
    let handled = keypad.run(&mut sampler, options, |event| {
        if compact {
            // One JSON object per line so the stream can be consumed incrementally
            match serde_json::to_string(event) {
                Ok(line) => println!("{line}"),
                Err(e) => debug!(error = %e, "Could not serialize event"),
            }
        } else if let Err(e) = report_event(cli, event) {
            debug!(error = %e, "Could not report event");
        }
    })?;

    if !cli.quiet && !cli.use_json() {
        println!("Stopped after {handled} event(s)");
    }
    Ok(())
}

fn cmd_devices(cli: &Cli) -> Result<()> {
    let devices = device::list_devices()?;

    if cli.use_json() {
        output_json(cli, &devices)?;
    } else if devices.is_empty() {
        println!("{}", style("No Stream Deck devices found").yellow());
        println!("Ensure device is connected via USB");
    } else {
        for d in &devices {
            println!(
                "{}: {} ({} keys)",
                style(&d.serial).green(),
                d.product_name,
                d.key_count
            );
        }
    }
    Ok(())
}

fn cmd_version(cli: &Cli) -> Result<()> {
    if cli.use_json() {
        output_json(
            cli,
            &serde_json::json!({
                "version": build_info::VERSION,
                "git_sha": build_info::git_sha(),
                "git_dirty": build_info::git_dirty() == "true",
                "build_timestamp": build_info::build_timestamp(),
                "rustc_version": build_info::rustc_semver(),
                "target": build_info::target(),
            }),
        )
    } else {
        println!("keypad {}", build_info::VERSION);
        println!(
            "git: {}{}",
            build_info::git_sha(),
            if build_info::git_dirty() == "true" {
                " (dirty)"
            } else {
                ""
            }
        );
        println!("built: {}", build_info::build_timestamp());
        println!("rustc: {}", build_info::rustc_semver());
        println!("target: {}", build_info::target());
        Ok(())
    }
}

#[allow(clippy::unnecessary_wraps)] // Consistent return type with other commands
fn cmd_completions(_cli: &Cli, args: &cli::CompletionsArgs) -> Result<()> {
    use clap::CommandFactory;
    clap_complete::generate(args.shell, &mut Cli::command(), "keypad", &mut io::stdout());
    Ok(())
}

// === Utility Functions ===

fn short_digest(sha256: &str) -> &str {
    sha256.get(..12).unwrap_or(sha256)
}

fn output_json<T: Serialize + ?Sized>(cli: &Cli, data: &T) -> Result<()> {
    let json = if cli.use_compact_json() {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    }
    .with_context(|| "Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

/// JSON, or YAML when `--format yaml` was asked for.
fn output_structured<T: Serialize + ?Sized>(cli: &Cli, data: &T) -> Result<()> {
    if cli.use_yaml() {
        let yaml = serde_yaml::to_string(data).with_context(|| "Failed to serialize output")?;
        print!("{yaml}");
        Ok(())
    } else {
        output_json(cli, data)
    }
}

fn output_error(cli: &Cli, error: &KeypadError) {
    if cli.use_json() {
        let mut json = serde_json::json!({
            "error": true,
            "message": error.to_string(),
            "suggestion": error.suggestion(),
            "recoverable": error.is_user_recoverable(),
        });
        if let KeypadError::ConfigInvalid { errors } = error {
            json["errors"] = serde_json::json!(errors);
        }
        match serde_json::to_string_pretty(&json) {
            Ok(text) => eprintln!("{text}"),
            Err(_) => eprintln!("{error}"),
        }
    } else {
        eprintln!("{}: {}", style("Error").red().bold(), error);
        if let Some(suggestion) = error.suggestion() {
            eprintln!("{}: {}", style("Hint").yellow(), suggestion);
        }
    }
}
