//! Clap derive structures for the `sumo` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// sumo -- provision and update SumoRobot boards over USB
#[derive(Debug, Parser)]
#[command(
    name = "sumo",
    version,
    about = "Provision and update SumoRobot boards over USB",
    long_about = "Finds a SumoRobot on the USB serial ports, writes WiFi credentials\n\
        into its configuration, and reflashes MicroPython together with the\n\
        SumoRobot application sources.",
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
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, env = "SUMO_CONFIG", global = true)]
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

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table and colored messages
    Table,
    /// JSON (one document, or one line per notification)
    Json,
    /// Plain text, one value per line
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List serial ports and mark the ones a SumoRobot would use
    Ports(PortsArgs),

    /// Watch for SumoRobots and print everything that happens
    Watch,

    /// Add a WiFi network to the connected SumoRobot
    Wifi(WifiArgs),

    /// Reflash MicroPython and the SumoRobot sources
    #[command(alias = "fw")]
    Firmware(FirmwareArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct PortsArgs {
    /// Only show ports matching the configured vendor prefixes
    #[arg(long, short = 'm')]
    pub managed: bool,
}

#[derive(Debug, Args)]
pub struct WaitArgs {
    /// Seconds to wait for a SumoRobot to be plugged in
    #[arg(long, default_value = "60")]
    pub wait: u64,
}

#[derive(Debug, Args)]
pub struct WifiArgs {
    /// Network name
    #[arg(long, short = 's')]
    pub ssid: String,

    /// Network password (prompted when omitted)
    #[arg(long, short = 'p', env = "SUMO_WIFI_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[command(flatten)]
    pub wait: WaitArgs,
}

#[derive(Debug, Args)]
pub struct FirmwareArgs {
    #[command(flatten)]
    pub wait: WaitArgs,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the configuration file location
    Path,

    /// Print the effective configuration (file + environment)
    Show,

    /// Write a configuration file with every default spelled out
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
