//! Plan command implementation.

use std::io::Write;

use dao_provision::{PipelineConfig, StageGraph};

use crate::error::CliError;
use crate::output::{OutputFormat, PlanEntry, PlanView};

/// Plan command executor.
#[derive(Debug)]
pub struct PlanCommand {
    config: PipelineConfig,
    graph: StageGraph,
}

impl PlanCommand {
    /// Create a plan command over the standard stage graph.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            graph: StageGraph::standard(),
        }
    }

    /// Validates the config and computes the stage plan.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the graph has a cycle.
    pub fn plan(&self) -> Result<PlanView, CliError> {
        self.config.validate()?;
        let stages = self
            .graph
            .topological_order()?
            .into_iter()
            .map(|stage| PlanEntry {
                stage,
                policy: stage.failure_policy(),
                depends_on: self.graph.dependencies(stage),
            })
            .collect();
        Ok(PlanView { stages })
    }

    /// Execute the plan command.
    ///
    /// # Errors
    ///
    /// Returns an error if planning or output fails.
    pub fn execute<W: Write>(&self, writer: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let view = self.plan()?;
        format.write(writer, &view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dao_provision::{FailurePolicy, Stage};

    #[test]
    fn standard_plan_starts_with_collateral_and_ends_with_manifest() {
        let view = PlanCommand::new(PipelineConfig::default()).plan().expect("plan");
        assert_eq!(view.stages.len(), 6);
        assert_eq!(view.stages[0].stage, Stage::Collateral);
        assert_eq!(view.stages[5].stage, Stage::Manifest);
    }

    #[test]
    fn only_governance_degrades() {
        let view = PlanCommand::new(PipelineConfig::default()).plan().expect("plan");
        for entry in &view.stages {
            let expected = if entry.stage == Stage::Governance {
                FailurePolicy::Degrade
            } else {
                FailurePolicy::Abort
            };
            assert_eq!(entry.policy, expected, "{}", entry.stage);
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = PipelineConfig::default();
        config.organization.allocations.clear();
        let result = PlanCommand::new(config).plan();
        assert!(matches!(result, Err(CliError::Pipeline(_))));
    }
}
