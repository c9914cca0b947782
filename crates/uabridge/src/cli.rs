//! Clap derive structures for the `uabridge` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// uabridge -- inspect the state the bridge engine reconciles against
#[derive(Debug, Parser)]
#[command(
    name = "uabridge",
    version,
    about = "Inspect the industrial endpoint bridge backend",
    long_about = "Operator tooling for the uabridge engine.\n\n\
        Shows the servers and data points the management backend asks the\n\
        bridge to track, which servers pass the staleness gate, and which\n\
        writes are still waiting to be pushed to an endpoint.",
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
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "UABRIDGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL (overrides config)
    #[arg(long, short = 'u', global = true)]
    pub api_url: Option<String>,

    /// Backend bearer token
    #[arg(long, env = "ACCESS_TOKEN", global = true, hide_env_values = true)]
    pub access_token: Option<String>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept invalid backend TLS certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides config)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

// ── Output Format ────────────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that the backend answers its health check
    Ping,

    /// List servers with their staleness-gate verdict
    #[command(alias = "srv")]
    Servers(ServersArgs),

    /// List tracked data points
    #[command(alias = "dp")]
    DataPoints(DataPointsArgs),

    /// List data points with a write waiting to be pushed
    Pending(DataPointsArgs),

    /// Inspect the resolved configuration
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ServersArgs {
    /// Only show servers the bridge would connect to right now
    #[arg(long)]
    pub due: bool,
}

#[derive(Debug, Args)]
pub struct DataPointsArgs {
    /// Only show data points of this server
    #[arg(long, short = 's')]
    pub server: Option<i64>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the resolved configuration (the token is never shown)
    Show,
    /// Print the config file path
    Path,
}
