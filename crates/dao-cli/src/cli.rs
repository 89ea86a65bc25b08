//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// DAO provisioning pipeline.
#[derive(Parser, Debug, Clone)]
#[command(name = "dao-provision")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Pipeline config file (JSON). Defaults are used when absent.
    #[arg(short, long, env = "DAO_PROVISION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Print the stage order and failure policy of each stage.
    Plan,

    /// Run the pipeline against the simulated chain and record the manifest.
    Deploy(DeployArgs),
}

/// Arguments for the deploy command.
#[derive(Parser, Debug, Clone, Default)]
pub struct DeployArgs {
    /// Network name the manifest is recorded under.
    #[arg(short, long)]
    pub network: Option<String>,

    /// Numeric network ID.
    #[arg(long)]
    pub network_id: Option<u64>,

    /// Manifest file to write.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Manifest tag.
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Number of founder accounts; defaults to the number of allocations.
    #[arg(long)]
    pub founders: Option<u32>,
}
