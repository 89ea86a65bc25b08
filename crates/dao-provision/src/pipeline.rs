//! Pipeline driver.
//!
//! Runs every stage in the topological order of the [`StageGraph`], storing
//! each stage's output in a run-state record that later stages read from.
//! Fatal stages abort the run; units deployed by completed stages stay
//! deployed. The governance stage stores its outcome as-is.

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

use crate::bootstrap::{OrganizationParams, create_organization};
use crate::collateral::deploy_collateral;
use crate::config::PipelineConfig;
use crate::context::{DeployContext, NetworkInfo};
use crate::economy::deploy_economy;
use crate::error::{ProvisionError, ProvisionResult};
use crate::gateway::CapabilityGateway;
use crate::governance::deploy_governance;
use crate::manifest::{DeploymentManifest, ManifestRecorder};
use crate::model::{CollateralSet, EconomicModule, GovernanceOutcome, Organization, UbiModule};
use crate::plan::{Stage, StageGraph};
use crate::registrar::PermissionRegistrar;
use crate::types::RunId;
use crate::ubi::{UbiParams, deploy_ubi};

/// Everything a completed run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    /// Run ID
    pub run_id: RunId,
    /// Target network
    pub network: NetworkInfo,
    /// Stages in the order they ran
    pub stages: Vec<Stage>,
    /// Collateral tokens
    pub collateral: CollateralSet,
    /// Organization core
    pub organization: Organization,
    /// Economic module
    pub economy: EconomicModule,
    /// Governance module or the reason it is absent
    pub governance: GovernanceOutcome,
    /// UBI module
    pub ubi: UbiModule,
    /// Manifest handed to the recorder
    pub manifest: DeploymentManifest,
}

#[derive(Debug, Default)]
struct RunState {
    collateral: Option<CollateralSet>,
    organization: Option<Organization>,
    economy: Option<EconomicModule>,
    governance: Option<GovernanceOutcome>,
    ubi: Option<UbiModule>,
    manifest: Option<DeploymentManifest>,
}

fn upstream<'a, T>(slot: &'a Option<T>, stage: Stage, needs: Stage) -> ProvisionResult<&'a T> {
    slot.as_ref().ok_or_else(|| {
        ProvisionError::Plan(format!("{stage} stage ran before {needs} produced its output"))
    })
}

fn now_unix() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or_default()
}

/// One provisioning run.
#[derive(Debug)]
pub struct Pipeline<G, R> {
    ctx: DeployContext<G>,
    config: PipelineConfig,
    recorder: R,
    graph: StageGraph,
    now: Option<u64>,
}

impl<G: CapabilityGateway, R: ManifestRecorder> Pipeline<G, R> {
    /// Creates a run over the standard stage graph.
    #[must_use]
    pub fn new(ctx: DeployContext<G>, config: PipelineConfig, recorder: R) -> Self {
        Self {
            ctx,
            config,
            recorder,
            graph: StageGraph::standard(),
            now: None,
        }
    }

    /// Uses `now` (unix seconds) instead of the wall clock for time-derived defaults.
    #[must_use]
    pub fn with_clock(mut self, now: u64) -> Self {
        self.now = Some(now);
        self
    }

    /// Deployment context of this run.
    #[must_use]
    pub const fn context(&self) -> &DeployContext<G> {
        &self.ctx
    }

    /// Stage order this run will follow.
    pub fn plan(&self) -> ProvisionResult<Vec<Stage>> {
        self.graph.topological_order()
    }

    /// Runs every stage.
    ///
    /// # Errors
    ///
    /// Returns the first fatal stage error. Governance failures are not
    /// errors; they show up as [`GovernanceOutcome::Absent`] in the report.
    pub async fn run(&self) -> ProvisionResult<PipelineReport> {
        self.config.validate_for(self.ctx.network())?;
        let order = self.plan()?;
        let run_id = self.ctx.run_id();
        info!(
            %run_id,
            network = %self.ctx.network().name,
            network_id = self.ctx.network().id,
            stages = order.len(),
            "pipeline started"
        );

        let mut state = RunState::default();
        for stage in &order {
            info!(%run_id, %stage, "stage started");
            if let Err(e) = self.run_stage(*stage, &mut state).await {
                error!(%run_id, %stage, kind = e.kind(), error = %e, "stage failed, aborting run");
                return Err(e);
            }
        }

        let report = PipelineReport {
            run_id,
            network: self.ctx.network().clone(),
            collateral: *upstream(&state.collateral, Stage::Manifest, Stage::Collateral)?,
            organization: *upstream(&state.organization, Stage::Manifest, Stage::Bootstrap)?,
            economy: *upstream(&state.economy, Stage::Manifest, Stage::Economy)?,
            governance: upstream(&state.governance, Stage::Manifest, Stage::Governance)?.clone(),
            ubi: *upstream(&state.ubi, Stage::Manifest, Stage::Ubi)?,
            manifest: state.manifest.take().ok_or_else(|| {
                ProvisionError::Plan("manifest stage did not run".to_string())
            })?,
            stages: order,
        };
        info!(
            %run_id,
            components = report.manifest.len(),
            governance = report.governance.is_deployed(),
            "pipeline finished"
        );
        Ok(report)
    }

    async fn run_stage(&self, stage: Stage, state: &mut RunState) -> ProvisionResult<()> {
        let ctx = &self.ctx;
        match stage {
            Stage::Collateral => {
                state.collateral = Some(deploy_collateral(ctx).await?);
            }
            Stage::Bootstrap => {
                let params = OrganizationParams::from_config(
                    &self.config.organization,
                    ctx.signers().founders.clone(),
                );
                state.organization = Some(create_organization(ctx, &params).await?);
            }
            Stage::Economy => {
                let org = *upstream(&state.organization, stage, Stage::Bootstrap)?;
                let collateral = *upstream(&state.collateral, stage, Stage::Collateral)?;
                let registrar = PermissionRegistrar::new(ctx, org);
                state.economy =
                    Some(deploy_economy(ctx, &registrar, &collateral, &self.config.economy).await?);
            }
            Stage::Governance => {
                let org = *upstream(&state.organization, stage, Stage::Bootstrap)?;
                let registrar = PermissionRegistrar::new(ctx, org);
                state.governance =
                    Some(deploy_governance(ctx, &registrar, &self.config.governance).await);
            }
            Stage::Ubi => {
                let org = *upstream(&state.organization, stage, Stage::Bootstrap)?;
                let registrar = PermissionRegistrar::new(ctx, org);
                let params =
                    UbiParams::from_config(&self.config.ubi, self.now.unwrap_or_else(now_unix));
                state.ubi = Some(deploy_ubi(ctx, &registrar, &params).await?);
            }
            Stage::Manifest => {
                let manifest = DeploymentManifest::from_run(
                    ctx.run_id(),
                    ctx.network().clone(),
                    upstream(&state.collateral, stage, Stage::Collateral)?,
                    upstream(&state.organization, stage, Stage::Bootstrap)?,
                    upstream(&state.economy, stage, Stage::Economy)?,
                    upstream(&state.governance, stage, Stage::Governance)?,
                    upstream(&state.ubi, stage, Stage::Ubi)?,
                );
                self.recorder
                    .record(&self.config.manifest.tag, &manifest)
                    .await?;
                state.manifest = Some(manifest);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::MemoryRecorder;
    use crate::simulated::SimulatedChain;
    use std::sync::Arc;

    fn pipeline(config: PipelineConfig) -> Pipeline<SimulatedChain, MemoryRecorder> {
        let chain = Arc::new(SimulatedChain::with_clock(10_000));
        let ctx = DeployContext::new(
            chain,
            NetworkInfo::new("develop", 4447),
            SimulatedChain::signers(3),
        );
        Pipeline::new(ctx, config, MemoryRecorder::new()).with_clock(10_000)
    }

    #[test]
    fn upstream_reports_missing_output() {
        let state = RunState::default();
        let result = upstream(&state.organization, Stage::Economy, Stage::Bootstrap);
        assert!(matches!(result, Err(ProvisionError::Plan(msg)) if msg.contains("bootstrap")));
    }

    #[tokio::test]
    async fn run_executes_stages_in_plan_order() {
        let pipeline = pipeline(PipelineConfig::default());
        let report = pipeline.run().await.expect("run");
        assert_eq!(report.stages, pipeline.plan().expect("plan"));
        assert!(report.governance.is_deployed());
        assert_eq!(report.manifest.run_id(), pipeline.context().run_id());
    }

    #[tokio::test]
    async fn invalid_config_fails_before_any_stage() {
        let mut config = PipelineConfig::default();
        config.economy.contribution.denominator = 0;
        let result = pipeline(config).run().await;
        assert!(matches!(result, Err(ProvisionError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn network_mismatch_fails_before_any_stage() {
        let mut config = PipelineConfig::default();
        config.network.id = 122;
        let pipeline = pipeline(config);
        let result = pipeline.run().await;
        assert!(matches!(result, Err(ProvisionError::InvalidConfig(msg)) if msg.contains("122")));
        assert!(pipeline.recorder.records().await.is_empty());
    }

    #[tokio::test]
    async fn founder_count_mismatch_aborts_in_bootstrap() {
        let mut config = PipelineConfig::default();
        config.organization.allocations = vec![1, 2];
        let pipeline = pipeline(config);
        let result = pipeline.run().await;
        assert!(matches!(result, Err(ProvisionError::Deployment { .. })));
        assert!(pipeline.recorder.records().await.is_empty());
    }
}
