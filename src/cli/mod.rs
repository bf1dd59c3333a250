//! CLI argument definitions.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::num::NonZeroUsize;
use std::path::PathBuf;

use crate::entry::Move;

/// CMake Mux - switch between CMake build roots and auto-enable their profiles.
///
/// Robot Mode: Use --robot or --format json for machine-parseable output.
#[derive(Parser, Debug)]
#[command(name = "cmux", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (text for humans, json for agents/scripts)
    #[arg(
        long,
        short = 'f',
        default_value = "text",
        global = true,
        env = "CMUX_FORMAT"
    )]
    pub format: OutputFormat,

    /// Robot mode: equivalent to --format=json
    #[arg(long, global = true)]
    pub robot: bool,

    /// Verbose output (repeat for more detail)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Workspace directory (defaults to the current directory)
    #[arg(long, short = 'w', global = true, env = "CMUX_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// State directory holding entries.json and host.json
    #[arg(long, global = true, env = "CMUX_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format selection.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text with optional color
    #[default]
    Text,
    /// JSON output for scripts and agents
    Json,
    /// Compact JSON (single line)
    JsonCompact,
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
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    // === Entries ===
    /// Register a CMakeLists.txt as an entry
    Add(AddArgs),

    /// List entries in order
    #[command(visible_alias = "ls")]
    List,

    /// Change an entry's nickname
    Rename(RenameArgs),

    /// Remove an entry
    #[command(visible_alias = "rm")]
    Remove(SelectorArgs),

    /// Move an entry up or down one position
    Move(MoveArgs),

    /// Manage an entry's profile patterns
    #[command(subcommand)]
    Pattern(PatternCommand),

    // === Activation ===
    /// Load an entry in the host and enable its matching profiles
    Activate(SelectorArgs),

    /// Show the quick-pick list, optionally activating an ordinal
    Pick(PickArgs),

    /// Show the active entry
    Active,

    /// Ask the host which build root it has loaded
    Detect,

    /// Show the host's profiles
    Profiles,

    // === Utilities ===
    /// Show version and build information
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Pattern subcommands. Indexes are 1-based.
#[derive(Subcommand, Debug)]
pub enum PatternCommand {
    /// List an entry's patterns
    List(SelectorArgs),

    /// Append a pattern
    Add(PatternAddArgs),

    /// Replace a pattern
    Edit(PatternEditArgs),

    /// Remove a pattern
    Remove(PatternIndexArgs),

    /// Move a pattern up or down one position
    Move(PatternMoveArgs),
}

// === Argument Structs ===

/// Arguments for registering a build root.
///
/// # Examples
///
/// ```bash
/// cmux add app/CMakeLists.txt --name app --pattern '^debug'
/// cmux add tools/CMakeLists.txt -p 'release' -p 'relwithdebinfo'
/// ```
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Build root file
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Nickname (defaults to the parent directory name)
    #[arg(long, short = 'n')]
    pub name: Option<String>,

    /// Profile pattern (repeatable)
    #[arg(long = "pattern", short = 'p', value_name = "REGEX")]
    pub patterns: Vec<String>,

    /// Accept files not named CMakeLists.txt
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct SelectorArgs {
    /// Entry ordinal (1-based), nickname, or path
    #[arg(value_name = "ENTRY")]
    pub entry: String,
}

#[derive(Args, Debug)]
pub struct RenameArgs {
    /// Entry ordinal (1-based), nickname, or path
    #[arg(value_name = "ENTRY")]
    pub entry: String,

    /// New nickname
    pub name: String,
}

/// Direction for move commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Direction {
    Up,
    Down,
}

impl From<Direction> for Move {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Up => Self::Up,
            Direction::Down => Self::Down,
        }
    }
}

#[derive(Args, Debug)]
pub struct MoveArgs {
    /// Entry ordinal (1-based), nickname, or path
    #[arg(value_name = "ENTRY")]
    pub entry: String,

    pub direction: Direction,
}

#[derive(Args, Debug)]
pub struct PickArgs {
    /// Activate the entry at this ordinal
    pub ordinal: Option<usize>,
}

#[derive(Args, Debug)]
pub struct PatternAddArgs {
    /// Entry ordinal (1-based), nickname, or path
    #[arg(value_name = "ENTRY")]
    pub entry: String,

    /// Regular expression matched case-insensitively against profile names
    #[arg(value_name = "REGEX")]
    pub pattern: String,
}

#[derive(Args, Debug)]
pub struct PatternEditArgs {
    /// Entry ordinal (1-based), nickname, or path
    #[arg(value_name = "ENTRY")]
    pub entry: String,

    /// Pattern position (1-based)
    #[arg(value_name = "INDEX")]
    pub index: NonZeroUsize,

    #[arg(value_name = "REGEX")]
    pub pattern: String,
}

#[derive(Args, Debug)]
pub struct PatternIndexArgs {
    /// Entry ordinal (1-based), nickname, or path
    #[arg(value_name = "ENTRY")]
    pub entry: String,

    /// Pattern position (1-based)
    #[arg(value_name = "INDEX")]
    pub index: NonZeroUsize,
}

#[derive(Args, Debug)]
pub struct PatternMoveArgs {
    /// Entry ordinal (1-based), nickname, or path
    #[arg(value_name = "ENTRY")]
    pub entry: String,

    /// Pattern position (1-based)
    #[arg(value_name = "INDEX")]
    pub index: NonZeroUsize,

    pub direction: Direction,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
