//! Stage graph and deployment order.
//!
//! The ownership chain between modules (market maker owned by reserve,
//! reserve authorized by controller, controller trusted by identity) is
//! expressed as edges between stages. The run order is a topological sort of
//! this graph rather than a hand-written sequence.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{ProvisionError, ProvisionResult};

/// A pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Collateral, reward and yield tokens
    Collateral,
    /// Identity, avatar, controller and native token
    Bootstrap,
    /// Reserve, market maker, fund manager and staking
    Economy,
    /// Voting machine and proposal schemes
    Governance,
    /// First-claim pool and UBI scheme
    Ubi,
    /// Address manifest handed to the recorder
    Manifest,
}

impl Stage {
    /// Every stage, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Collateral,
        Self::Bootstrap,
        Self::Economy,
        Self::Governance,
        Self::Ubi,
        Self::Manifest,
    ];

    /// What a failure in this stage does to the run.
    #[must_use]
    pub const fn failure_policy(&self) -> FailurePolicy {
        match self {
            Self::Governance => FailurePolicy::Degrade,
            _ => FailurePolicy::Abort,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collateral => write!(f, "collateral"),
            Self::Bootstrap => write!(f, "bootstrap"),
            Self::Economy => write!(f, "economy"),
            Self::Governance => write!(f, "governance"),
            Self::Ubi => write!(f, "ubi"),
            Self::Manifest => write!(f, "manifest"),
        }
    }
}

/// How a stage failure propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// The run stops; units from completed stages stay deployed.
    Abort,
    /// The stage yields an absent result and the run continues.
    Degrade,
}

/// Directed acyclic graph of stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageGraph {
    stages: Vec<Stage>,
    /// (dependency, dependent)
    edges: Vec<(Stage, Stage)>,
}

impl StageGraph {
    /// The fixed five-module topology plus collateral and manifest stages.
    #[must_use]
    pub fn standard() -> Self {
        use Stage::{Bootstrap, Collateral, Economy, Governance, Manifest, Ubi};
        Self {
            stages: Stage::ALL.to_vec(),
            edges: vec![
                (Collateral, Economy),
                (Bootstrap, Economy),
                (Bootstrap, Governance),
                (Bootstrap, Ubi),
                (Economy, Ubi),
                (Governance, Ubi),
                (Economy, Manifest),
                (Governance, Manifest),
                (Ubi, Manifest),
            ],
        }
    }

    #[cfg(test)]
    fn with_edge(mut self, from: Stage, to: Stage) -> Self {
        self.edges.push((from, to));
        self
    }

    /// Stages `stage` directly depends on.
    #[must_use]
    pub fn dependencies(&self, stage: Stage) -> Vec<Stage> {
        self.edges
            .iter()
            .filter(|(_, to)| *to == stage)
            .map(|(from, _)| *from)
            .collect()
    }

    /// True if `stage` transitively depends on `other`.
    #[must_use]
    pub fn depends_on(&self, stage: Stage, other: Stage) -> bool {
        let mut pending = self.dependencies(stage);
        let mut seen = Vec::new();
        while let Some(next) = pending.pop() {
            if next == other {
                return true;
            }
            if !seen.contains(&next) {
                seen.push(next);
                pending.extend(self.dependencies(next));
            }
        }
        false
    }

    /// Kahn's algorithm; ties resolve in declaration order.
    ///
    /// # Errors
    ///
    /// Returns a plan error if an edge names an unknown stage or the graph
    /// has a cycle.
    pub fn topological_order(&self) -> ProvisionResult<Vec<Stage>> {
        let mut in_degree: HashMap<Stage, usize> =
            self.stages.iter().map(|stage| (*stage, 0)).collect();
        for (from, to) in &self.edges {
            if !in_degree.contains_key(from) {
                return Err(ProvisionError::Plan(format!("edge from unknown stage {from}")));
            }
            match in_degree.get_mut(to) {
                Some(degree) => *degree += 1,
                None => {
                    return Err(ProvisionError::Plan(format!("edge to unknown stage {to}")));
                }
            }
        }

        let mut order = Vec::with_capacity(self.stages.len());
        while order.len() < self.stages.len() {
            let ready = self
                .stages
                .iter()
                .find(|stage| !order.contains(*stage) && in_degree.get(*stage) == Some(&0))
                .copied();
            let Some(stage) = ready else {
                let stuck: Vec<String> = self
                    .stages
                    .iter()
                    .filter(|stage| !order.contains(*stage))
                    .map(ToString::to_string)
                    .collect();
                return Err(ProvisionError::Plan(format!(
                    "dependency cycle among stages: {}",
                    stuck.join(", ")
                )));
            };
            for (_, to) in self.edges.iter().filter(|(from, _)| *from == stage) {
                if let Some(degree) = in_degree.get_mut(to) {
                    *degree -= 1;
                }
            }
            order.push(stage);
        }
        Ok(order)
    }
}

impl Default for StageGraph {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(order: &[Stage], stage: Stage) -> usize {
        order.iter().position(|s| *s == stage).unwrap_or(usize::MAX)
    }

    #[test]
    fn standard_order_respects_every_edge() {
        let graph = StageGraph::standard();
        let order = graph.topological_order().expect("acyclic");
        assert_eq!(order.len(), Stage::ALL.len());
        for (from, to) in &graph.edges {
            assert!(
                position(&order, *from) < position(&order, *to),
                "{from} must run before {to}"
            );
        }
    }

    #[test]
    fn standard_order_is_stable() {
        let order = StageGraph::standard().topological_order().expect("acyclic");
        assert_eq!(
            order,
            vec![
                Stage::Collateral,
                Stage::Bootstrap,
                Stage::Economy,
                Stage::Governance,
                Stage::Ubi,
                Stage::Manifest,
            ]
        );
    }

    #[test]
    fn cycle_is_rejected() {
        let graph = StageGraph::standard().with_edge(Stage::Ubi, Stage::Bootstrap);
        let result = graph.topological_order();
        assert!(matches!(result, Err(ProvisionError::Plan(msg)) if msg.contains("cycle")));
    }

    #[test]
    fn ubi_depends_on_bootstrap_transitively() {
        let graph = StageGraph::standard();
        assert!(graph.depends_on(Stage::Ubi, Stage::Bootstrap));
        assert!(graph.depends_on(Stage::Manifest, Stage::Collateral));
        assert!(!graph.depends_on(Stage::Governance, Stage::Economy));
        assert!(!graph.depends_on(Stage::Bootstrap, Stage::Ubi));
    }

    #[test]
    fn only_governance_degrades() {
        for stage in Stage::ALL {
            let expected = if stage == Stage::Governance {
                FailurePolicy::Degrade
            } else {
                FailurePolicy::Abort
            };
            assert_eq!(stage.failure_policy(), expected);
        }
    }
}
