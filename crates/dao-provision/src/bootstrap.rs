//! Bootstrap core: identity, avatar, controller and native token.
//!
//! The organization factory forges avatar, controller and native token in a
//! single call. Its one-shot `setSchemes` then seeds the controller with the
//! pipeline's operator and the identity unit; after that the factory holds
//! no authority and every later registration goes through the
//! [`PermissionRegistrar`](crate::registrar::PermissionRegistrar).

use tracing::{debug, info};

use crate::config::OrganizationConfig;
use crate::context::DeployContext;
use crate::error::{ProvisionError, ProvisionResult};
use crate::gateway::{CapabilityGateway, UnitKind};
use crate::model::Organization;
use crate::types::{Address, ParamsHash, PermissionFlags, Value};

/// Arguments of [`create_organization`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationParams {
    /// Founder accounts, in allocation order
    pub founders: Vec<Address>,
    /// Native token minted to each founder
    pub allocations: Vec<u128>,
    /// Founders' reputation supply
    pub total_supply: u128,
    /// Native token name
    pub token_name: String,
    /// Native token symbol
    pub token_symbol: String,
    /// Token cap, 0 for uncapped
    pub cap: u128,
    /// Fee of the fee formula
    pub fee: u128,
    /// Identity authentication period
    pub authentication_period_days: u32,
}

impl OrganizationParams {
    /// Combines configured token settings with the founder accounts.
    #[must_use]
    pub fn from_config(config: &OrganizationConfig, founders: Vec<Address>) -> Self {
        Self {
            founders,
            allocations: config.allocations.clone(),
            total_supply: config.total_supply,
            token_name: config.token_name.clone(),
            token_symbol: config.token_symbol.clone(),
            cap: config.cap,
            fee: config.fee,
            authentication_period_days: config.authentication_period_days,
        }
    }

    fn validate(&self) -> ProvisionResult<()> {
        if self.founders.is_empty() {
            return Err(ProvisionError::deployment(
                UnitKind::OrganizationFactory,
                "at least one founder is required",
            ));
        }
        if self.founders.len() != self.allocations.len() {
            return Err(ProvisionError::deployment(
                UnitKind::OrganizationFactory,
                format!(
                    "{} founders but {} allocations",
                    self.founders.len(),
                    self.allocations.len()
                ),
            ));
        }
        Ok(())
    }
}

/// Creates the organization core.
///
/// # Errors
///
/// Returns a deployment error if validation fails or any deployment or
/// forge call reverts. Units deployed before the failure stay deployed.
pub async fn create_organization<G: CapabilityGateway>(
    ctx: &DeployContext<G>,
    params: &OrganizationParams,
) -> ProvisionResult<Organization> {
    params.validate()?;

    let (identity, fee_formula, founders_helper) = tokio::try_join!(
        ctx.deploy(UnitKind::Identity, Vec::new()),
        ctx.deploy(UnitKind::FeeFormula, vec![Value::Uint(params.fee)]),
        ctx.deploy(UnitKind::FoundersHelper, Vec::new()),
    )?;

    ctx.configure(
        UnitKind::Identity,
        identity,
        "setAuthenticationPeriod",
        vec![Value::Uint(u128::from(params.authentication_period_days))],
    )
    .await?;

    let factory = ctx
        .deploy(UnitKind::OrganizationFactory, vec![Value::Address(founders_helper)])
        .await?;

    ctx.configure(
        UnitKind::OrganizationFactory,
        factory,
        "forgeOrg",
        vec![
            Value::Str(params.token_name.clone()),
            Value::Str(params.token_symbol.clone()),
            Value::Uint(params.cap),
            Value::Address(fee_formula),
            Value::Address(identity),
            Value::Addresses(params.founders.clone()),
            Value::Uint(params.total_supply),
            Value::Uints(params.allocations.clone()),
        ],
    )
    .await?;

    let avatar = ctx
        .read_address(UnitKind::OrganizationFactory, factory, "avatar")
        .await?;
    if avatar.is_zero() {
        return Err(ProvisionError::deployment(
            UnitKind::OrganizationFactory,
            "forge produced no avatar",
        ));
    }
    let (controller, native_token) = tokio::try_join!(
        ctx.read_address(UnitKind::OrganizationFactory, avatar, "owner"),
        ctx.read_address(UnitKind::OrganizationFactory, avatar, "nativeToken"),
    )?;
    debug!(run_id = %ctx.run_id(), %avatar, %controller, %native_token, "organization forged");

    ctx.configure(UnitKind::Identity, identity, "setAvatar", vec![Value::Address(avatar)])
        .await?;

    let operator = ctx.signers().operator;
    let all = u128::from(PermissionFlags::ALL.bits());
    ctx.configure(
        UnitKind::OrganizationFactory,
        factory,
        "setSchemes",
        vec![
            Value::Address(avatar),
            Value::Addresses(vec![operator, identity]),
            Value::Hashes(vec![ParamsHash::ZERO, ParamsHash::ZERO]),
            Value::Uints(vec![all, all]),
            Value::from("metaData"),
        ],
    )
    .await?;

    info!(
        run_id = %ctx.run_id(),
        %avatar,
        %controller,
        %identity,
        %native_token,
        %operator,
        founders = params.founders.len(),
        "organization created"
    );
    Ok(Organization {
        avatar,
        controller,
        identity,
        native_token,
        fee_formula,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrganizationConfig;
    use crate::context::NetworkInfo;
    use crate::registrar::PermissionRegistrar;
    use crate::simulated::SimulatedChain;
    use std::sync::Arc;

    fn context(chain: &Arc<SimulatedChain>) -> DeployContext<SimulatedChain> {
        DeployContext::new(
            Arc::clone(chain),
            NetworkInfo::new("develop", 4447),
            SimulatedChain::signers(3),
        )
    }

    fn params(ctx: &DeployContext<SimulatedChain>) -> OrganizationParams {
        OrganizationParams::from_config(&OrganizationConfig::default(), ctx.signers().founders.clone())
    }

    mod create_organization {
        use super::*;

        #[tokio::test]
        async fn produces_distinct_core_addresses() {
            let chain = Arc::new(SimulatedChain::with_clock(1_000));
            let ctx = context(&chain);
            let org = create_organization(&ctx, &params(&ctx)).await.expect("organization");

            assert!(!org.avatar.is_zero());
            assert!(!org.controller.is_zero());
            assert_ne!(org.avatar, org.controller);
            assert_ne!(org.avatar, org.native_token);
        }

        #[tokio::test]
        async fn identity_points_at_avatar() {
            let chain = Arc::new(SimulatedChain::with_clock(1_000));
            let ctx = context(&chain);
            let org = create_organization(&ctx, &params(&ctx)).await.expect("organization");

            let recorded = ctx
                .invoke(org.identity, "avatar", Vec::new())
                .await
                .ok()
                .and_then(|v| v.as_address());
            assert_eq!(recorded, Some(org.avatar));
            let period = ctx
                .invoke(org.identity, "authenticationPeriod", Vec::new())
                .await
                .ok()
                .and_then(|v| v.as_uint());
            assert_eq!(period, Some(365));
        }

        #[tokio::test]
        async fn operator_and_identity_hold_all_permissions() {
            let chain = Arc::new(SimulatedChain::with_clock(1_000));
            let ctx = context(&chain);
            let org = create_organization(&ctx, &params(&ctx)).await.expect("organization");
            let registrar = PermissionRegistrar::new(&ctx, org);

            let operator = registrar
                .permissions_of(ctx.signers().operator)
                .await
                .expect("read operator");
            let identity = registrar.permissions_of(org.identity).await.expect("read identity");
            assert_eq!(operator, PermissionFlags::ALL);
            assert_eq!(identity, PermissionFlags::ALL);
        }

        #[tokio::test]
        async fn mismatched_allocations_fail_before_any_deployment() {
            let chain = Arc::new(SimulatedChain::with_clock(1_000));
            let ctx = context(&chain);
            let mut params = params(&ctx);
            params.allocations.pop();

            let result = create_organization(&ctx, &params).await;
            assert!(matches!(result, Err(ProvisionError::Deployment { .. })));
            assert_eq!(chain.unit_count().await, 0);
        }

        #[tokio::test]
        async fn empty_founders_are_rejected() {
            let chain = Arc::new(SimulatedChain::with_clock(1_000));
            let ctx = context(&chain);
            let mut params = params(&ctx);
            params.founders.clear();
            params.allocations.clear();

            assert!(create_organization(&ctx, &params).await.is_err());
        }
    }
}
