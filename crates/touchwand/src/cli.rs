//! Clap derive structures for the `touchwand` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// touchwand -- control TouchWand hubs from the command line
#[derive(Debug, Parser)]
#[command(
    name = "touchwand",
    version,
    about = "Control TouchWand home-automation hubs from the command line",
    long_about = "List, discover and drive the switches, dimmers and shutters\n\
        attached to a TouchWand hub, and watch their status live.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Hub profile to use
    #[arg(long, short = 'p', env = "TOUCHWAND_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Hub host name or IP (overrides profile)
    #[arg(long, short = 'H', env = "TOUCHWAND_HOST", global = true)]
    pub host: Option<String>,

    /// Hub REST port (overrides profile)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Hub username (overrides profile)
    #[arg(long, short = 'u', env = "TOUCHWAND_USERNAME", global = true)]
    pub username: Option<String>,

    /// Hub password
    #[arg(long, env = "TOUCHWAND_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "TOUCHWAND_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "TOUCHWAND_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Rounded table for terminals
    Table,
    /// Indented JSON
    Json,
    /// One JSON document per line
    JsonCompact,
    /// YAML
    Yaml,
    /// Bare unit ids, one per line
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Color when stdout is a terminal and NO_COLOR is unset
    Auto,
    Always,
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List, inspect and drive units
    #[command(alias = "u")]
    Units(UnitsArgs),

    /// Run one discovery scan and list what the bridge would add
    #[command(alias = "scan")]
    Discover(DiscoverArgs),

    /// Stream unit status changes until interrupted
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Units ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct UnitsArgs {
    #[command(subcommand)]
    pub command: UnitsCommand,
}

#[derive(Debug, Subcommand)]
pub enum UnitsCommand {
    /// List every unit the hub knows
    #[command(alias = "ls")]
    List,

    /// Show one unit's current status
    Get {
        /// Unit ID
        id: String,
    },

    /// Turn a switch on or off
    Switch {
        /// Unit ID
        id: String,
        state: SwitchState,
    },

    /// Set a dimmer level (0-255)
    Dim {
        /// Unit ID
        id: String,
        level: u8,
    },

    /// Move or stop a shutter
    Shutter {
        /// Unit ID
        id: String,
        direction: ShutterDirection,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SwitchState {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ShutterDirection {
    Up,
    Down,
    Stop,
}

// ── Discover / Watch ─────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// Include units on secondary connectivity (overrides profile)
    #[arg(long)]
    pub secondary: bool,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Only watch these unit IDs
    #[arg(long = "unit", short = 'U')]
    pub units: Vec<String>,

    /// Stop after this many seconds
    #[arg(long, short = 'd')]
    pub duration: Option<u64>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display current configuration (passwords masked)
    Show,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name
        name: String,
    },

    /// Store the active profile's password in the system keyring
    SetPassword,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
