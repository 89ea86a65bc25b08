//! # dao-cli
//!
//! Command-line driver for the DAO provisioning pipeline.
//!
//! Provides commands for:
//! - Printing the stage plan and each stage's failure policy
//! - Running the pipeline against the simulated chain and recording the manifest
//!
//! Configuration comes from a JSON file (`--config` or `DAO_PROVISION_CONFIG`)
//! with per-run overrides on the command line.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands, DeployArgs, Format};
pub use error::CliError;
pub use output::OutputFormat;
