//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use serde::Serialize;

use dao_provision::{FailurePolicy, GovernanceOutcome, PipelineReport, Stage};

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Write a value in the selected format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => value.write_table(writer)?,
        }
        Ok(())
    }

    /// Write a value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// One row of the stage plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    /// Stage
    pub stage: Stage,
    /// What a failure of this stage does to the run
    pub policy: FailurePolicy,
    /// Stages that must complete first
    pub depends_on: Vec<Stage>,
}

/// Stage plan in run order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanView {
    /// Stages in run order
    pub stages: Vec<PlanEntry>,
}

impl TableDisplay for PlanView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "{:<4} {:<12} {:<9} DEPENDS ON", "#", "STAGE", "POLICY")?;
        for (i, entry) in self.stages.iter().enumerate() {
            let policy = match entry.policy {
                FailurePolicy::Abort => "abort",
                FailurePolicy::Degrade => "degrade",
            };
            let deps: Vec<String> = entry.depends_on.iter().map(ToString::to_string).collect();
            let deps = if deps.is_empty() { "-".to_string() } else { deps.join(", ") };
            writeln!(writer, "{:<4} {:<12} {:<9} {}", i + 1, entry.stage.to_string(), policy, deps)?;
        }
        Ok(())
    }
}

impl TableDisplay for PipelineReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Deployment {}", self.run_id)?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Network:     {} ({})", self.network.name, self.network.id)?;
        let stages: Vec<String> = self.stages.iter().map(ToString::to_string).collect();
        writeln!(writer, "Stages:      {}", stages.join(" > "))?;
        match &self.governance {
            GovernanceOutcome::Deployed(_) => writeln!(writer, "Governance:  deployed")?,
            GovernanceOutcome::Absent { reason } => {
                writeln!(writer, "Governance:  absent ({reason})")?;
            }
        }
        writeln!(writer)?;
        writeln!(writer, "Components")?;
        for (name, address) in self.manifest.components() {
            writeln!(writer, "  {name:<16} {address}")?;
        }
        Ok(())
    }
}
