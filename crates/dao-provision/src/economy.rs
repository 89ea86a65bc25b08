//! Economic module: reserve, market maker, fund manager and staking.
//!
//! The reserve can only be constructed once fund manager and market maker
//! exist, and can only be started once it owns the market maker, holds mint
//! authority on the native token and the reserve token is initialized on the
//! market maker. Those steps are recorded in a [`WiringChecklist`] that the
//! activation step checks before any `start()` is sent.

use std::fmt;
use tracing::info;

use crate::config::EconomyConfig;
use crate::context::DeployContext;
use crate::error::{ProvisionError, ProvisionResult};
use crate::gateway::{CapabilityGateway, UnitKind};
use crate::model::{CollateralSet, EconomicModule, ReserveTokenConfig};
use crate::registrar::PermissionRegistrar;
use crate::types::{Address, PermissionFlags, Value};

/// A wiring step that must precede activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WiringStep {
    /// Fund manager deployed
    FundManagerDeployed,
    /// Market maker deployed
    MarketMakerDeployed,
    /// Reserve deployed
    ReserveDeployed,
    /// Market maker ownership moved to the reserve
    OwnershipTransferred,
    /// Staking deployed
    StakingDeployed,
    /// All economic units registered as schemes
    SchemesRegistered,
    /// Reserve may mint native token
    ReserveMinter,
    /// Reserve token registered on the market maker
    ReserveTokenInitialized,
}

impl WiringStep {
    /// Every step, in execution order.
    pub const ALL: [Self; 8] = [
        Self::FundManagerDeployed,
        Self::MarketMakerDeployed,
        Self::ReserveDeployed,
        Self::OwnershipTransferred,
        Self::StakingDeployed,
        Self::SchemesRegistered,
        Self::ReserveMinter,
        Self::ReserveTokenInitialized,
    ];
}

impl fmt::Display for WiringStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FundManagerDeployed => "fund manager deployed",
            Self::MarketMakerDeployed => "market maker deployed",
            Self::ReserveDeployed => "reserve deployed",
            Self::OwnershipTransferred => "market maker owned by reserve",
            Self::StakingDeployed => "staking deployed",
            Self::SchemesRegistered => "schemes registered",
            Self::ReserveMinter => "reserve is minter",
            Self::ReserveTokenInitialized => "reserve token initialized",
        };
        f.write_str(name)
    }
}

/// Wiring progress of one economic deployment.
#[derive(Debug, Default, Clone)]
pub struct WiringChecklist {
    done: Vec<WiringStep>,
}

impl WiringChecklist {
    /// Marks a step complete.
    pub fn record(&mut self, step: WiringStep) {
        if !self.done.contains(&step) {
            self.done.push(step);
        }
    }

    /// First step not yet recorded.
    #[must_use]
    pub fn missing(&self) -> Option<WiringStep> {
        WiringStep::ALL.into_iter().find(|step| !self.done.contains(step))
    }

    /// Fails with an activation error naming the first missing step.
    pub fn require_complete(&self) -> ProvisionResult<()> {
        match self.missing() {
            None => Ok(()),
            Some(step) => Err(ProvisionError::activation(
                UnitKind::Reserve,
                format!("wiring incomplete: {step}"),
            )),
        }
    }
}

/// Deploys, wires and starts the economic module.
///
/// # Errors
///
/// Deployment, permission and activation errors are all fatal; units deployed
/// before the failure stay deployed.
pub async fn deploy_economy<G: CapabilityGateway>(
    ctx: &DeployContext<G>,
    registrar: &PermissionRegistrar<'_, G>,
    collateral: &CollateralSet,
    config: &EconomyConfig,
) -> ProvisionResult<EconomicModule> {
    let org = *registrar.organization();
    let mut checklist = WiringChecklist::default();

    let contribution = ctx
        .deploy(
            UnitKind::ContributionCalculation,
            vec![
                Value::Address(org.avatar),
                Value::Uint(config.contribution.numerator),
                Value::Uint(config.contribution.denominator),
            ],
        )
        .await?;

    let (fund_manager, market_maker) = tokio::try_join!(
        ctx.deploy(
            UnitKind::FundManager,
            vec![
                Value::Address(org.avatar),
                Value::Address(org.identity),
                Value::Address(collateral.yield_token),
                Value::Address(Address::ZERO),
                Value::Address(Address::ZERO),
                Value::Uint(config.fund_manager.block_interval),
            ],
        ),
        ctx.deploy(
            UnitKind::MarketMaker,
            vec![
                Value::Address(org.avatar),
                Value::Uint(config.market_maker.numerator),
                Value::Uint(config.market_maker.denominator),
            ],
        ),
    )?;
    checklist.record(WiringStep::FundManagerDeployed);
    checklist.record(WiringStep::MarketMakerDeployed);

    let reserve = ctx
        .deploy(
            UnitKind::Reserve,
            vec![
                Value::Address(collateral.collateral_token),
                Value::Address(collateral.yield_token),
                Value::Address(fund_manager),
                Value::Address(org.avatar),
                Value::Address(org.identity),
                Value::Address(market_maker),
                Value::Address(contribution),
                Value::Uint(config.reserve.block_interval),
            ],
        )
        .await?;
    checklist.record(WiringStep::ReserveDeployed);

    ctx.configure(
        UnitKind::MarketMaker,
        market_maker,
        "transferOwnership",
        vec![Value::Address(reserve)],
    )
    .await?;
    checklist.record(WiringStep::OwnershipTransferred);

    let staking = ctx
        .deploy(
            UnitKind::Staking,
            vec![
                Value::Address(collateral.collateral_token),
                Value::Address(collateral.yield_token),
                Value::Address(fund_manager),
                Value::Uint(config.staking.block_interval),
                Value::Address(org.avatar),
                Value::Address(org.identity),
            ],
        )
        .await?;
    checklist.record(WiringStep::StakingDeployed);

    registrar
        .register_schemes(
            &[contribution, fund_manager, market_maker, reserve, staking],
            &[],
            PermissionFlags::ALL,
        )
        .await?;
    checklist.record(WiringStep::SchemesRegistered);

    registrar.add_minter(org.native_token, reserve).await?;
    checklist.record(WiringStep::ReserveMinter);

    let token_params = config.market_maker.reserve_token;
    let reserve_token = ReserveTokenConfig {
        token: collateral.yield_token,
        gd_reserve_amount: token_params.gd_reserve_amount,
        token_reserve_amount: token_params.token_reserve_amount,
        reserve_ratio: token_params.reserve_ratio,
    };
    registrar
        .initialize_reserve_token(market_maker, &reserve_token)
        .await?;
    checklist.record(WiringStep::ReserveTokenInitialized);

    checklist.require_complete()?;
    tokio::try_join!(
        ctx.activate(UnitKind::Reserve, reserve),
        ctx.activate(UnitKind::FundManager, fund_manager),
        ctx.activate(UnitKind::Staking, staking),
    )?;

    info!(
        run_id = %ctx.run_id(),
        %reserve,
        %market_maker,
        %fund_manager,
        %staking,
        "economic module started"
    );
    Ok(EconomicModule {
        reserve,
        market_maker,
        fund_manager,
        staking,
        contribution,
        reserve_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::{OrganizationParams, create_organization};
    use crate::collateral::deploy_collateral;
    use crate::config::OrganizationConfig;
    use crate::context::NetworkInfo;
    use crate::model::Organization;
    use crate::simulated::SimulatedChain;
    use std::sync::Arc;

    async fn setup() -> (DeployContext<SimulatedChain>, Organization, CollateralSet) {
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
        let collateral = deploy_collateral(&ctx).await.expect("collateral");
        (ctx, org, collateral)
    }

    mod checklist {
        use super::*;

        #[test]
        fn empty_checklist_reports_first_step() {
            let checklist = WiringChecklist::default();
            assert_eq!(checklist.missing(), Some(WiringStep::FundManagerDeployed));
            assert!(matches!(
                checklist.require_complete(),
                Err(ProvisionError::Activation { .. })
            ));
        }

        #[test]
        fn missing_initialization_blocks_activation() {
            let mut checklist = WiringChecklist::default();
            for step in WiringStep::ALL {
                if step != WiringStep::ReserveTokenInitialized {
                    checklist.record(step);
                }
            }
            let err = checklist.require_complete().err().map(|e| e.to_string());
            assert!(err.is_some_and(|msg| msg.contains("reserve token initialized")));
        }

        #[test]
        fn complete_checklist_passes() {
            let mut checklist = WiringChecklist::default();
            for step in WiringStep::ALL {
                checklist.record(step);
                checklist.record(step);
            }
            assert!(checklist.require_complete().is_ok());
        }
    }

    mod deploy_economy {
        use super::*;

        #[tokio::test]
        async fn starts_all_units() {
            let (ctx, org, collateral) = setup().await;
            let registrar = PermissionRegistrar::new(&ctx, org);
            let module = deploy_economy(&ctx, &registrar, &collateral, &EconomyConfig::default())
                .await
                .expect("economy");

            for unit in [module.reserve, module.fund_manager, module.staking] {
                let started = ctx
                    .invoke(unit, "isStarted", Vec::new())
                    .await
                    .ok()
                    .and_then(|v| v.as_bool());
                assert_eq!(started, Some(true));
            }
            let owner = ctx
                .invoke(module.market_maker, "owner", Vec::new())
                .await
                .ok()
                .and_then(|v| v.as_address());
            assert_eq!(owner, Some(module.reserve));
            assert_eq!(module.reserve_token.token, collateral.yield_token);
        }

        #[tokio::test]
        async fn registers_five_schemes() {
            let (ctx, org, collateral) = setup().await;
            let registrar = PermissionRegistrar::new(&ctx, org);
            let module = deploy_economy(&ctx, &registrar, &collateral, &EconomyConfig::default())
                .await
                .expect("economy");

            for unit in [
                module.contribution,
                module.fund_manager,
                module.market_maker,
                module.reserve,
                module.staking,
            ] {
                assert_eq!(
                    registrar.permissions_of(unit).await.ok(),
                    Some(PermissionFlags::ALL)
                );
            }
        }

        #[tokio::test]
        async fn operator_without_authority_fails_with_permission_error() {
            let (ctx, org, collateral) = setup().await;
            let registrar =
                PermissionRegistrar::new(&ctx, org).as_operator(SimulatedChain::account(42));
            let result =
                deploy_economy(&ctx, &registrar, &collateral, &EconomyConfig::default()).await;
            assert!(matches!(result, Err(ProvisionError::Permission { .. })));
        }
    }

    #[tokio::test]
    async fn initialize_token_fails_before_ownership_transfer() {
        let (ctx, org, collateral) = setup().await;
        let registrar = PermissionRegistrar::new(&ctx, org);
        let market_maker = ctx
            .deploy(
                UnitKind::MarketMaker,
                vec![
                    Value::Address(org.avatar),
                    Value::Uint(9_999_999_999),
                    Value::Uint(10_000_000_000),
                ],
            )
            .await
            .expect("market maker");

        let config = ReserveTokenConfig {
            token: collateral.yield_token,
            gd_reserve_amount: 100,
            token_reserve_amount: 10_000,
            reserve_ratio: 1_000_000,
        };
        let result = registrar.initialize_reserve_token(market_maker, &config).await;
        let message = result.err().map(|e| e.to_string()).unwrap_or_default();
        assert!(message.contains("ownership not transferred"), "{message}");
    }
}
