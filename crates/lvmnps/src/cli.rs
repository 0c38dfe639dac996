//! Clap derive structures for the `lvmnps` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// lvmnps -- control a fleet of networked power switches
#[derive(Debug, Parser)]
#[command(
    name = "lvmnps",
    version,
    about = "Control a fleet of networked power switches",
    long_about = "Connects to every configured power switch concurrently, reports\n\
        which ones answered, and switches or power-cycles individual outlets.\n\n\
        Without a subcommand, runs as a long-lived actor until Ctrl-C.",
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Option<Command>,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration file (YAML or TOML)
    #[arg(long, short = 'c', env = "LVMNPS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
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

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
    /// Plain text, one line per item (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always use color
    Always,
    /// Never use color
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect every switch and keep serving until Ctrl-C (default)
    Actor,

    /// List configured switches without contacting them
    #[command(alias = "ls")]
    List,

    /// Show connection status and outlet states
    Status(StatusArgs),

    /// Switch an outlet on
    On(OutletArgs),

    /// Switch an outlet off
    Off(OutletArgs),

    /// Power-cycle an outlet
    Cycle(OutletArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Switch name (all switches when omitted)
    pub device: Option<String>,
}

#[derive(Debug, Args)]
pub struct OutletArgs {
    /// Switch name
    pub device: String,

    /// Outlet number, starting at 1
    pub outlet: u32,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
