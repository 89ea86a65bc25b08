//! Governance stage: voting machine, scheme registrar and upgrade scheme.
//!
//! Unlike every other stage, a failure here does not abort the run. The
//! stage returns [`GovernanceOutcome::Absent`] with the reason and the
//! pipeline continues without governance.

use tracing::{info, warn};

use crate::config::GovernanceConfig;
use crate::context::DeployContext;
use crate::error::{ProvisionError, ProvisionResult};
use crate::gateway::{CapabilityGateway, UnitKind};
use crate::model::{GovernanceModule, GovernanceOutcome};
use crate::params::{
    scheme_registrar_parameters_hash, upgrade_parameters_hash, vote_parameters_hash,
};
use crate::registrar::PermissionRegistrar;
use crate::types::{Address, ParamsHash, PermissionFlags, Value};

/// Deploys the governance module, degrading to [`GovernanceOutcome::Absent`] on any error.
pub async fn deploy_governance<G: CapabilityGateway>(
    ctx: &DeployContext<G>,
    registrar: &PermissionRegistrar<'_, G>,
    config: &GovernanceConfig,
) -> GovernanceOutcome {
    match try_deploy_governance(ctx, registrar, config).await {
        Ok(module) => {
            info!(
                run_id = %ctx.run_id(),
                voting_machine = %module.voting_machine,
                scheme_registrar = %module.scheme_registrar,
                upgrade_scheme = %module.upgrade_scheme,
                vote_params = %module.vote_params,
                "governance module deployed"
            );
            GovernanceOutcome::Deployed(module)
        }
        Err(e) => {
            warn!(
                run_id = %ctx.run_id(),
                kind = e.kind(),
                error = %e,
                "governance stage failed, continuing without governance"
            );
            GovernanceOutcome::Absent {
                reason: e.to_string(),
            }
        }
    }
}

async fn try_deploy_governance<G: CapabilityGateway>(
    ctx: &DeployContext<G>,
    registrar: &PermissionRegistrar<'_, G>,
    config: &GovernanceConfig,
) -> ProvisionResult<GovernanceModule> {
    let reputation_system = Address::parse(&config.reputation_system)?;
    let quorum = config.quorum_percent;

    let (voting_machine, scheme_registrar, upgrade_scheme) = tokio::try_join!(
        ctx.deploy(UnitKind::VotingMachine, Vec::new()),
        ctx.deploy(UnitKind::SchemeRegistrar, Vec::new()),
        ctx.deploy(UnitKind::UpgradeScheme, Vec::new()),
    )?;

    let vote_params = vote_parameters_hash(quorum, reputation_system);
    let upgrade_params = upgrade_parameters_hash(vote_params, voting_machine);
    let scheme_register_params =
        scheme_registrar_parameters_hash(vote_params, vote_params, voting_machine);

    tokio::try_join!(
        ctx.configure(
            UnitKind::VotingMachine,
            voting_machine,
            "setParameters",
            vec![Value::Uint(u128::from(quorum)), Value::Address(reputation_system)],
        ),
        ctx.configure(
            UnitKind::SchemeRegistrar,
            scheme_registrar,
            "setParameters",
            vec![
                Value::Hash(vote_params),
                Value::Hash(vote_params),
                Value::Address(voting_machine),
            ],
        ),
        ctx.configure(
            UnitKind::UpgradeScheme,
            upgrade_scheme,
            "setParameters",
            vec![Value::Hash(vote_params), Value::Address(voting_machine)],
        ),
    )?;

    let (remote_vote, remote_register, remote_upgrade) = tokio::try_join!(
        read_params_hash(
            ctx,
            UnitKind::VotingMachine,
            voting_machine,
            vec![Value::Uint(u128::from(quorum)), Value::Address(reputation_system)],
        ),
        read_params_hash(
            ctx,
            UnitKind::SchemeRegistrar,
            scheme_registrar,
            vec![
                Value::Hash(vote_params),
                Value::Hash(vote_params),
                Value::Address(voting_machine),
            ],
        ),
        read_params_hash(
            ctx,
            UnitKind::UpgradeScheme,
            upgrade_scheme,
            vec![Value::Hash(vote_params), Value::Address(voting_machine)],
        ),
    )?;
    ensure_matches(UnitKind::VotingMachine, vote_params, remote_vote)?;
    ensure_matches(UnitKind::SchemeRegistrar, scheme_register_params, remote_register)?;
    ensure_matches(UnitKind::UpgradeScheme, upgrade_params, remote_upgrade)?;

    registrar
        .register_schemes(
            &[scheme_registrar, upgrade_scheme],
            &[scheme_register_params, upgrade_params],
            PermissionFlags::ALL,
        )
        .await?;

    Ok(GovernanceModule {
        voting_machine,
        scheme_registrar,
        upgrade_scheme,
        vote_params,
        upgrade_params,
        scheme_register_params,
    })
}

async fn read_params_hash<G: CapabilityGateway>(
    ctx: &DeployContext<G>,
    unit: UnitKind,
    target: Address,
    args: Vec<Value>,
) -> ProvisionResult<ParamsHash> {
    let value = ctx.configure(unit, target, "getParametersHash", args).await?;
    value.as_hash().ok_or_else(|| {
        ProvisionError::Configuration(format!(
            "{unit} returned {} instead of a parameters hash",
            value.type_name()
        ))
    })
}

fn ensure_matches(unit: UnitKind, local: ParamsHash, remote: ParamsHash) -> ProvisionResult<()> {
    if local == remote {
        Ok(())
    } else {
        Err(ProvisionError::Configuration(format!(
            "{unit} parameters hash mismatch: computed {local}, unit reports {remote}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::{OrganizationParams, create_organization};
    use crate::config::OrganizationConfig;
    use crate::context::NetworkInfo;
    use crate::simulated::SimulatedChain;
    use std::sync::Arc;
    use test_case::test_case;

    async fn setup() -> (DeployContext<SimulatedChain>, crate::model::Organization) {
        let chain = Arc::new(SimulatedChain::with_clock(1_000));
        let ctx = DeployContext::new(
            chain,
            NetworkInfo::new("develop", 4447),
            SimulatedChain::signers(3),
        );
        let params = OrganizationParams::from_config(
            &OrganizationConfig::default(),
            ctx.signers().founders.clone(),
        );
        let org = create_organization(&ctx, &params).await.expect("organization");
        (ctx, org)
    }

    #[tokio::test]
    async fn deploys_and_registers_proposal_schemes() {
        let (ctx, org) = setup().await;
        let registrar = PermissionRegistrar::new(&ctx, org);
        let outcome = deploy_governance(&ctx, &registrar, &GovernanceConfig::default()).await;

        let module = outcome.module().copied().expect("deployed");
        assert_eq!(module.vote_params, vote_parameters_hash(50, Address::ZERO));
        assert!(registrar.is_registered(module.scheme_registrar).await.unwrap_or(false));
        assert!(registrar.is_registered(module.upgrade_scheme).await.unwrap_or(false));
        assert!(!registrar.is_registered(module.voting_machine).await.unwrap_or(true));

        for scheme in [module.scheme_registrar, module.upgrade_scheme] {
            let mask = registrar.permissions_of(scheme).await.ok();
            assert_eq!(mask, Some(PermissionFlags::ALL));
        }
    }

    #[tokio::test]
    async fn proposal_schemes_reference_the_vote_parameters() {
        let (ctx, org) = setup().await;
        let registrar = PermissionRegistrar::new(&ctx, org);
        let outcome = deploy_governance(&ctx, &registrar, &GovernanceConfig::default()).await;
        let module = outcome.module().copied().expect("deployed");

        for (scheme, params) in [
            (module.scheme_registrar, module.scheme_register_params),
            (module.upgrade_scheme, module.upgrade_params),
        ] {
            let vote = ctx
                .invoke(scheme, "votingParameters", vec![Value::Hash(params)])
                .await
                .ok()
                .and_then(|v| v.as_hash());
            assert_eq!(vote, Some(module.vote_params));
        }
    }

    #[test_case("not-an-address" ; "malformed")]
    #[test_case("0x1234" ; "too short")]
    #[test_case("0x00000000000000000000000000000000000000ff" ; "undeployed reputation system")]
    #[tokio::test]
    async fn bad_reputation_system_yields_absent(reputation_system: &str) {
        let (ctx, org) = setup().await;
        let registrar = PermissionRegistrar::new(&ctx, org);
        let config = GovernanceConfig {
            reputation_system: reputation_system.to_string(),
            ..GovernanceConfig::default()
        };
        let outcome = deploy_governance(&ctx, &registrar, &config).await;
        assert!(matches!(outcome, GovernanceOutcome::Absent { .. }));
    }

    #[tokio::test]
    async fn zero_quorum_yields_absent() {
        let (ctx, org) = setup().await;
        let registrar = PermissionRegistrar::new(&ctx, org);
        let config = GovernanceConfig {
            quorum_percent: 0,
            ..GovernanceConfig::default()
        };
        let outcome = deploy_governance(&ctx, &registrar, &config).await;
        let reason = match outcome {
            GovernanceOutcome::Absent { reason } => reason,
            GovernanceOutcome::Deployed(_) => String::new(),
        };
        assert!(reason.contains("quorum"), "{reason}");
    }

    #[test]
    fn mismatched_hash_is_configuration_error() {
        let result = ensure_matches(
            UnitKind::UpgradeScheme,
            ParamsHash::from_bytes([1; 32]),
            ParamsHash::from_bytes([2; 32]),
        );
        assert!(matches!(result, Err(ProvisionError::Configuration(_))));
    }
}
