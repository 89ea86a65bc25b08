//! Full pipeline runs: stage order, manifest recording and failure policies.

use std::sync::Arc;

use dao_provision::{
    Address, CapabilityGateway, DeployContext, GatewayError, GatewayResult, GovernanceOutcome,
    JsonFileRecorder, ManifestRecorder, MemoryRecorder, NetworkInfo, Pipeline, PipelineConfig,
    ProvisionError, SimulatedChain, Stage, UnitKind, Value,
};

const START: u64 = 1_700_000_000;

/// Simulated chain that reverts every deployment of one unit kind.
struct RejectingGateway {
    inner: SimulatedChain,
    reject: UnitKind,
}

impl CapabilityGateway for RejectingGateway {
    async fn deploy(
        &self,
        from: Address,
        unit: UnitKind,
        args: Vec<Value>,
    ) -> GatewayResult<Address> {
        if unit == self.reject {
            return Err(GatewayError::revert(format!("{unit} rejected")));
        }
        self.inner.deploy(from, unit, args).await
    }

    async fn call(
        &self,
        from: Address,
        target: Address,
        method: &str,
        args: Vec<Value>,
    ) -> GatewayResult<Value> {
        self.inner.call(from, target, method, args).await
    }
}

fn simulated_pipeline<R: ManifestRecorder>(recorder: R) -> Pipeline<SimulatedChain, R> {
    let ctx = DeployContext::new(
        Arc::new(SimulatedChain::with_clock(START)),
        NetworkInfo::new("develop", 4447),
        SimulatedChain::signers(3),
    );
    Pipeline::new(ctx, PipelineConfig::default(), recorder).with_clock(START)
}

fn rejecting_pipeline(
    chain: &SimulatedChain,
    reject: UnitKind,
    recorder: MemoryRecorder,
) -> Pipeline<RejectingGateway, MemoryRecorder> {
    let gateway = RejectingGateway {
        inner: chain.clone(),
        reject,
    };
    let ctx = DeployContext::new(
        Arc::new(gateway),
        NetworkInfo::new("develop", 4447),
        SimulatedChain::signers(3),
    );
    Pipeline::new(ctx, PipelineConfig::default(), recorder).with_clock(START)
}

#[tokio::test]
async fn stages_run_in_dependency_order() {
    let report = simulated_pipeline(MemoryRecorder::new()).run().await.expect("run");
    assert_eq!(
        report.stages,
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

#[tokio::test]
async fn manifest_lists_every_component() {
    let recorder = MemoryRecorder::new();
    let report = simulated_pipeline(recorder.clone()).run().await.expect("run");

    let names: Vec<&str> = report
        .manifest
        .components()
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(
        names,
        vec![
            "Reserve",
            "GoodDollar",
            "Identity",
            "Avatar",
            "Controller",
            "FeeFormula",
            "AbsoluteVote",
            "SchemeRegistrar",
            "UpgradeScheme",
            "DAI",
            "cDAI",
            "COMP",
            "Contribution",
            "FundManager",
            "DAIStaking",
            "MarketMaker",
            "FirstClaimPool",
            "UBIScheme",
        ]
    );

    let recorded = recorder.latest("olddao").await.expect("recorded");
    assert_eq!(recorded, report.manifest);
    assert_eq!(recorded.network().id, 4447);
}

#[tokio::test]
async fn json_recorder_writes_tag_and_network() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("releases").join("deployment.json");
    let report = simulated_pipeline(JsonFileRecorder::new(&path))
        .run()
        .await
        .expect("run");

    let raw = std::fs::read_to_string(&path).expect("read");
    let document: serde_json::Value = serde_json::from_str(&raw).expect("parse");
    let entry = &document["olddao"]["develop"];
    assert_eq!(entry["networkId"], 4447);
    assert_eq!(entry["runId"], report.run_id.to_string());
    assert_eq!(entry["Avatar"], report.organization.avatar.to_string());
}

#[tokio::test]
async fn fatal_stage_aborts_and_leaves_units_deployed() {
    let chain = SimulatedChain::with_clock(START);
    let recorder = MemoryRecorder::new();
    let pipeline = rejecting_pipeline(&chain, UnitKind::UbiScheme, recorder.clone());

    let result = pipeline.run().await;
    assert!(matches!(result, Err(ProvisionError::Deployment { .. })));
    assert!(recorder.records().await.is_empty());
    // 3 collateral + 7 organization + 5 economy + 3 governance + first-claim pool
    assert_eq!(chain.unit_count().await, 19);
}

#[tokio::test]
async fn governance_failure_degrades_without_aborting() {
    let chain = SimulatedChain::with_clock(START);
    let recorder = MemoryRecorder::new();
    let pipeline = rejecting_pipeline(&chain, UnitKind::VotingMachine, recorder.clone());

    let report = pipeline.run().await.expect("run");
    match &report.governance {
        GovernanceOutcome::Absent { reason } => assert!(reason.contains("AbsoluteVote"), "{reason}"),
        GovernanceOutcome::Deployed(_) => unreachable!("voting machine deployment was rejected"),
    }
    assert!(report.manifest.get("UBIScheme").is_some());
    assert_eq!(recorder.records().await.len(), 1);
}

#[tokio::test]
async fn economy_failure_aborts_before_ubi() {
    let chain = SimulatedChain::with_clock(START);
    let pipeline = rejecting_pipeline(&chain, UnitKind::Staking, MemoryRecorder::new());

    let result = pipeline.run().await;
    let message = result.err().map(|e| e.to_string()).unwrap_or_default();
    assert!(message.contains("SimpleDAIStaking"), "{message}");
}
