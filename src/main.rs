//! CMake Mux CLI - switch between CMake build roots and auto-enable profiles.
//!
//! Provides both human-friendly and agent-friendly (robot mode) interfaces.
#![forbid(unsafe_code)]

use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::Parser;
use console::style;
use serde::Serialize;

use cmux::activation::Activation;
use cmux::cli::{self, Cli, Commands, PatternCommand};
use cmux::config::MuxConfig;
use cmux::detect::Probe;
use cmux::entry::Entry;
use cmux::error::{MuxError, Result};
use cmux::logging;
use cmux::session::MuxSession;

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

    if cli.no_color || !io::stdout().is_terminal() {
        console::set_colors_enabled(false);
    }
    if cli.no_color || !io::stderr().is_terminal() {
        console::set_colors_enabled_stderr(false);
    }

    logging::init_logging(cli.robot, cli.verbose, cli.quiet);

    if let Err(e) = run(&cli) {
        output_error(&cli, &e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        None => print_quick_start(cli),
        Some(Commands::Add(args)) => cmd_add(cli, args),
        Some(Commands::List) => cmd_list(cli),
        Some(Commands::Rename(args)) => cmd_rename(cli, args),
        Some(Commands::Remove(args)) => cmd_remove(cli, args),
        Some(Commands::Move(args)) => cmd_move(cli, args),
        Some(Commands::Pattern(command)) => cmd_pattern(cli, command),
        Some(Commands::Activate(args)) => cmd_activate(cli, args),
        Some(Commands::Pick(args)) => cmd_pick(cli, args),
        Some(Commands::Active) => cmd_active(cli),
        Some(Commands::Detect) => cmd_detect(cli),
        Some(Commands::Profiles) => cmd_profiles(cli),
        Some(Commands::Version) => cmd_version(cli),
        Some(Commands::Completions(args)) => cmd_completions(cli, args),
    }
}

fn open_session(cli: &Cli) -> Result<MuxSession> {
    let config = MuxConfig::load()?;
    let workspace = match &cli.workspace {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    let mut builder = MuxSession::builder().workspace(workspace).config(config);
    if let Some(dir) = &cli.state_dir {
        builder = builder.state_dir(dir.clone());
    }
    builder.build()
}

// === Quick Start (Robot Mode Optimized) ===

#[allow(clippy::unnecessary_wraps)] // Consistent return type with other commands
fn print_quick_start(cli: &Cli) -> Result<()> {
    if cli.use_json() {
        output_json(cli, &robot_quick_start());
    } else {
        print_human_quick_start();
    }
    Ok(())
}

#[derive(Serialize)]
struct RobotQuickStart {
    tool: &'static str,
    version: &'static str,
    description: &'static str,
    entries: RobotEntries,
    patterns: RobotPatterns,
    activation: RobotActivation,
    selectors: &'static str,
    output_modes: OutputModes,
}

#[derive(Serialize)]
struct RobotEntries {
    add: &'static str,
    list: &'static str,
    rename: &'static str,
    remove: &'static str,
    reorder: &'static str,
}

#[derive(Serialize)]
struct RobotPatterns {
    list: &'static str,
    add: &'static str,
    edit: &'static str,
    remove: &'static str,
    reorder: &'static str,
    matching: &'static str,
}

#[derive(Serialize)]
struct RobotActivation {
    activate: &'static str,
    quick_pick: &'static str,
    active: &'static str,
    detect: &'static str,
    profiles: &'static str,
}

#[derive(Serialize)]
struct OutputModes {
    human: &'static str,
    robot: &'static str,
    compact: &'static str,
}

fn robot_quick_start() -> RobotQuickStart {
    RobotQuickStart {
        tool: "cmux",
        version: build_info::VERSION,
        description: "Switch between CMake build roots and auto-enable matching profiles",
        entries: RobotEntries {
            add: "cmux add <CMakeLists.txt> [--name NAME] [--pattern REGEX]...",
            list: "cmux list --robot",
            rename: "cmux rename <ENTRY> <NAME>",
            remove: "cmux remove <ENTRY>",
            reorder: "cmux move <ENTRY> up|down",
        },
        patterns: RobotPatterns {
            list: "cmux pattern list <ENTRY>",
            add: "cmux pattern add <ENTRY> <REGEX>",
            edit: "cmux pattern edit <ENTRY> <INDEX> <REGEX>",
            remove: "cmux pattern remove <ENTRY> <INDEX>",
            reorder: "cmux pattern move <ENTRY> <INDEX> up|down",
            matching: "Case-insensitive search anywhere in the profile name",
        },
        activation: RobotActivation {
            activate: "cmux activate <ENTRY>",
            quick_pick: "cmux pick [ORDINAL]",
            active: "cmux active --robot",
            detect: "cmux detect --robot",
            profiles: "cmux profiles --robot",
        },
        selectors: "ENTRY is a 1-based ordinal, a nickname, or a path",
        output_modes: OutputModes {
            human: "--format=text (default)",
            robot: "--robot or --format=json",
            compact: "--format=json-compact",
        },
    }
}

fn print_human_quick_start() {
    println!(
        "{} {} - CMake build root switcher\n",
        style("cmux").bold().cyan(),
        build_info::VERSION
    );

    println!("{}", style("QUICK START").bold().underlined());
    println!();
    println!("  {}  Register a build root", style("cmux add app/CMakeLists.txt").green());
    println!("  {}  Auto-enable profiles", style("cmux pattern add app '^debug'").green());
    println!("  {}  List entries", style("cmux list").green());
    println!("  {}  Activate an entry", style("cmux activate app").green());
    println!("  {}  Activate by ordinal", style("cmux pick 2").green());
    println!("  {}  Show host profiles", style("cmux profiles").green());
    println!();

    println!("{}", style("ROBOT MODE (for AI agents)").bold().underlined());
    println!();
    println!("  {}  JSON output", style("cmux --robot <command>").cyan());
    println!("  {}  Quick-start JSON", style("cmux --robot").cyan());
    println!();

    println!("Run {} for full help", style("cmux --help").yellow());
}

// === Views ===

#[derive(Serialize)]
struct EntryView {
    ordinal: usize,
    nickname: String,
    path: String,
    patterns: Vec<String>,
    active: bool,
}

fn entry_view(session: &MuxSession, entry: &Entry) -> EntryView {
    EntryView {
        ordinal: session.store().position(entry.path()).map_or(0, |i| i + 1),
        nickname: entry.nickname.clone(),
        path: entry.path().to_string(),
        patterns: entry.patterns.clone(),
        active: session.tracker().is_active(entry.path()),
    }
}

fn print_entry_line(view: &EntryView) {
    let marker = if view.active {
        style("*").green().bold().to_string()
    } else {
        " ".to_string()
    };
    let title = if view.nickname.trim().is_empty() {
        view.path.as_str()
    } else {
        view.nickname.as_str()
    };
    println!(
        "{marker} {:>2}. {}  {}",
        view.ordinal,
        style(title).bold(),
        style(&view.path).dim()
    );
}

// === Entry Commands ===

fn cmd_add(cli: &Cli, args: &cli::AddArgs) -> Result<()> {
    let session = open_session(cli)?;
    let file = absolute_from_cwd(&args.file);
    let entry = session.add(&file, args.name.as_deref(), &args.patterns, args.force)?;
    let view = entry_view(&session, &entry);

    if cli.use_json() {
        output_json(cli, &view);
    } else if !cli.quiet {
        println!("Added {} as #{}", style(&view.nickname).bold(), view.ordinal);
    }
    Ok(())
}

fn cmd_list(cli: &Cli) -> Result<()> {
    let session = open_session(cli)?;
    session.detect_now();
    let views: Vec<EntryView> = session
        .store()
        .list()
        .iter()
        .map(|entry| entry_view(&session, entry))
        .collect();

    if cli.use_json() {
        output_json(cli, &views);
    } else if views.is_empty() {
        println!("{}", style("No entries registered").yellow());
        println!("Add one with: cmux add <path/to/CMakeLists.txt>");
    } else {
        for view in &views {
            print_entry_line(view);
            for pattern in &view.patterns {
                println!("        {}", style(pattern).cyan());
            }
        }
    }
    Ok(())
}

fn cmd_rename(cli: &Cli, args: &cli::RenameArgs) -> Result<()> {
    let session = open_session(cli)?;
    let entry = session.rename(&args.entry, &args.name)?;

    if cli.use_json() {
        output_json(cli, &entry_view(&session, &entry));
    } else if !cli.quiet {
        println!("Renamed to {}", style(&entry.nickname).bold());
    }
    Ok(())
}

fn cmd_remove(cli: &Cli, args: &cli::SelectorArgs) -> Result<()> {
    let session = open_session(cli)?;
    let entry = session.remove(&args.entry)?;

    if cli.use_json() {
        output_json(
            cli,
            &serde_json::json!({ "removed": entry.path(), "nickname": entry.nickname, "ok": true }),
        );
    } else if !cli.quiet {
        println!("Removed {}", style(entry.title()).bold());
    }
    Ok(())
}

fn cmd_move(cli: &Cli, args: &cli::MoveArgs) -> Result<()> {
    let session = open_session(cli)?;
    let entry = session.find(&args.entry)?;
    let moved = session.reorder(entry.path(), args.direction.into())?;
    let view = entry_view(&session, &entry);

    if cli.use_json() {
        output_json(cli, &serde_json::json!({ "moved": moved, "entry": view }));
    } else if !cli.quiet {
        if moved {
            println!("{} is now #{}", style(entry.title()).bold(), view.ordinal);
        } else {
            println!("{} is already at the edge", style(entry.title()).bold());
        }
    }
    Ok(())
}

// === Pattern Commands ===

fn cmd_pattern(cli: &Cli, command: &PatternCommand) -> Result<()> {
    let session = open_session(cli)?;
    let (selector, moved) = match command {
        PatternCommand::List(args) => (&args.entry, None),
        PatternCommand::Add(args) => {
            session.add_pattern(&args.entry, &args.pattern)?;
            (&args.entry, None)
        }
        PatternCommand::Edit(args) => {
            session.edit_pattern(&args.entry, args.index.get() - 1, &args.pattern)?;
            (&args.entry, None)
        }
        PatternCommand::Remove(args) => {
            session.remove_pattern(&args.entry, args.index.get() - 1)?;
            (&args.entry, None)
        }
        PatternCommand::Move(args) => {
            let moved = session.move_pattern(&args.entry, args.index.get() - 1, args.direction.into())?;
            (&args.entry, Some(moved))
        }
    };

    let entry = session.find(selector)?;
    if cli.use_json() {
        let mut value = serde_json::json!({
            "entry": entry.nickname,
            "path": entry.path(),
            "patterns": entry.patterns,
        });
        if let Some(moved) = moved {
            value["moved"] = serde_json::json!(moved);
        }
        output_json(cli, &value);
    } else if entry.patterns.is_empty() {
        println!("{} has no patterns", style(entry.title()).bold());
    } else if !cli.quiet || matches!(command, PatternCommand::List(_)) {
        println!("{}", style(entry.title()).bold());
        for (i, pattern) in entry.patterns.iter().enumerate() {
            println!("  {:>2}. {}", i + 1, style(pattern).cyan());
        }
    }
    Ok(())
}

// === Activation Commands ===

#[derive(Serialize)]
struct ActivationView {
    entry: EntryView,
    selection_changed: bool,
    state: cmux::activation::ActivationState,
    profiles: Option<cmux::engine::EnableReport>,
}

fn finish_activation(cli: &Cli, session: &MuxSession, entry: &Entry, activation: &Activation) {
    session.run_until_idle();
    let view = ActivationView {
        entry: entry_view(session, entry),
        selection_changed: activation.selection_changed(),
        state: activation.state(),
        profiles: activation.report().cloned(),
    };

    if cli.use_json() {
        output_json(cli, &view);
    } else if !cli.quiet {
        println!(
            "Activated {}  {}",
            style(entry.title()).bold().green(),
            style(activation.target().normalized()).dim()
        );
        match activation.report() {
            Some(report) if report.flipped > 0 => {
                println!("Enabled {} profile(s)", style(report.flipped).bold());
            }
            Some(report) if report.source.is_none() && !entry.patterns.is_empty() => {
                println!("{}", style("Host exposes no profiles; nothing enabled").yellow());
            }
            _ => {}
        }
        if let Some(report) = activation.report() {
            for pattern in &report.skipped_patterns {
                println!("{} {}", style("Skipped invalid pattern").yellow(), pattern);
            }
        }
    }
}

fn cmd_activate(cli: &Cli, args: &cli::SelectorArgs) -> Result<()> {
    let session = open_session(cli)?;
    let entry = session.find(&args.entry)?;
    let activation = session.activate_entry(&entry)?;
    finish_activation(cli, &session, &entry, &activation);
    Ok(())
}

fn cmd_pick(cli: &Cli, args: &cli::PickArgs) -> Result<()> {
    let session = open_session(cli)?;
    session.detect_now();
    let pick = session.quick_pick();

    if let Some(ordinal) = args.ordinal {
        let item = ordinal
            .checked_sub(1)
            .and_then(|i| pick.items.get(i))
            .ok_or_else(|| MuxError::EntryNotFound {
                selector: ordinal.to_string(),
            })?;
        let entry = session.find(&item.path)?;
        let activation = session.activate_entry(&entry)?;
        finish_activation(cli, &session, &entry, &activation);
        return Ok(());
    }

    if cli.use_json() {
        output_json(cli, &pick);
    } else if pick.is_empty() {
        println!("{}", style("No entries registered").yellow());
    } else {
        for (i, item) in pick.items.iter().enumerate() {
            let cursor = if i == pick.selected { ">" } else { " " };
            let line = format!("{cursor} {}. {}", item.ordinal, item.title);
            if item.active {
                println!("{}", style(line).green().bold());
            } else {
                println!("{line}");
            }
        }
        println!();
        println!("Activate with: cmux pick <N>");
    }
    Ok(())
}

#[derive(Serialize)]
struct ActiveView {
    active: Option<String>,
    entry: Option<EntryView>,
}

fn active_view(session: &MuxSession) -> ActiveView {
    let active = session.tracker().get_active();
    let entry = active
        .as_deref()
        .and_then(|path| session.store().get(path))
        .map(|entry| entry_view(session, &entry));
    ActiveView { active, entry }
}

fn print_active(view: &ActiveView) {
    match (&view.active, &view.entry) {
        (_, Some(entry)) => print_entry_line(entry),
        (Some(path), None) => println!("{} {}", path, style("(not registered)").dim()),
        (None, None) => println!("{}", style("No active build root").yellow()),
    }
}

fn cmd_active(cli: &Cli) -> Result<()> {
    let session = open_session(cli)?;
    session.detect_now();
    let view = active_view(&session);

    if cli.use_json() {
        output_json(cli, &view);
    } else {
        print_active(&view);
    }
    Ok(())
}

fn cmd_detect(cli: &Cli) -> Result<()> {
    let session = open_session(cli)?;
    let probe = session.detect_now();
    if probe == Probe::Unknown {
        session.start_detection();
        session.run_until_idle();
    }
    let view = active_view(&session);

    if cli.use_json() {
        output_json(cli, &view);
    } else {
        print_active(&view);
    }
    Ok(())
}

fn cmd_profiles(cli: &Cli) -> Result<()> {
    let session = open_session(cli)?;
    let collection = session.profiles();

    if cli.use_json() {
        let value = collection.map_or_else(
            || serde_json::json!({ "source": null, "profiles": [] }),
            |c| serde_json::json!({ "source": c.source, "profiles": c.profiles }),
        );
        output_json(cli, &value);
        return Ok(());
    }

    let Some(collection) = collection else {
        println!("{}", style("Host exposes no profiles").yellow());
        return Ok(());
    };
    if collection.profiles.is_empty() {
        println!("{}", style("No profiles").yellow());
    }
    for profile in &collection.profiles {
        let name = profile.resolved_name().unwrap_or("<unnamed>");
        if profile.is_enabled() {
            println!("{} {}", style("[x]").green(), name);
        } else {
            println!("[ ] {}", style(name).dim());
        }
    }
    Ok(())
}

// === Utility Commands ===

#[allow(clippy::unnecessary_wraps)] // Consistent return type with other commands
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
        );
    } else {
        println!("cmux {}", build_info::VERSION);
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
    }
    Ok(())
}

#[allow(clippy::unnecessary_wraps)] // Consistent return type with other commands
fn cmd_completions(_cli: &Cli, args: &cli::CompletionsArgs) -> Result<()> {
    use clap::CommandFactory;
    clap_complete::generate(args.shell, &mut Cli::command(), "cmux", &mut io::stdout());
    Ok(())
}

// === Utility Functions ===

/// Paths typed on the command line are relative to the current directory.
fn absolute_from_cwd(file: &str) -> String {
    let path = PathBuf::from(file);
    if path.is_absolute() {
        return file.to_string();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path).to_string_lossy().into_owned())
        .unwrap_or_else(|_| file.to_string())
}

fn output_json<T: Serialize>(cli: &Cli, data: &T) {
    let json = if cli.use_compact_json() {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    match json {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Failed to serialize output: {e}"),
    }
}

fn output_error(cli: &Cli, error: &MuxError) {
    if cli.use_json() {
        let json = serde_json::json!({
            "error": true,
            "message": error.to_string(),
            "suggestion": error.suggestion(),
            "recoverable": error.is_user_recoverable(),
        });
        let text = serde_json::to_string_pretty(&json).unwrap_or_else(|_| error.to_string());
        eprintln!("{text}");
    } else {
        eprintln!("{}: {}", style("Error").red().bold(), error);
        if let Some(suggestion) = error.suggestion() {
            eprintln!("{}: {}", style("Hint").yellow(), suggestion);
        }
    }
}
