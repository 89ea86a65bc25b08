//! UBI stage: first-claim pool and UBI scheme.

use tracing::info;

use crate::config::UbiConfig;
use crate::context::DeployContext;
use crate::error::{ProvisionError, ProvisionResult};
use crate::gateway::{CapabilityGateway, UnitKind};
use crate::model::{ClaimConfig, UbiModule};
use crate::registrar::PermissionRegistrar;
use crate::types::{PermissionFlags, Value};

/// Arguments of [`deploy_ubi`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UbiParams {
    /// Claim schedule both units are constructed with
    pub claim: ClaimConfig,
    /// Native token minted to each unit before start
    pub initial_balance: u128,
}

impl UbiParams {
    /// Resolves the configured schedule; an unset period start means `now`.
    #[must_use]
    pub fn from_config(config: &UbiConfig, now: u64) -> Self {
        let period_start = config.period_start.unwrap_or(now);
        Self {
            claim: ClaimConfig {
                daily_claim_amount: config.daily_claim_amount,
                period_start,
                period_end: period_start.saturating_add(config.period_length_secs),
                cycle_length_days: config.cycle_length_days,
                claim_distribution_fraction: config.claim_distribution_fraction,
            },
            initial_balance: config.initial_balance,
        }
    }

    fn validate(&self) -> ProvisionResult<()> {
        let claim = &self.claim;
        if claim.period_start > claim.period_end {
            return Err(ProvisionError::deployment(
                UnitKind::UbiScheme,
                format!(
                    "period start {} is after period end {}",
                    claim.period_start, claim.period_end
                ),
            ));
        }
        if claim.cycle_length_days == 0 || claim.claim_distribution_fraction == 0 {
            return Err(ProvisionError::deployment(
                UnitKind::UbiScheme,
                "cycle length and distribution fraction must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Deploys, funds, registers and starts the UBI module.
///
/// # Errors
///
/// Deployment, permission and activation errors are fatal.
pub async fn deploy_ubi<G: CapabilityGateway>(
    ctx: &DeployContext<G>,
    registrar: &PermissionRegistrar<'_, G>,
    params: &UbiParams,
) -> ProvisionResult<UbiModule> {
    params.validate()?;
    let org = *registrar.organization();
    let claim = params.claim;

    let first_claim_pool = ctx
        .deploy(
            UnitKind::FirstClaimPool,
            vec![
                Value::Address(org.avatar),
                Value::Address(org.identity),
                Value::Uint(claim.daily_claim_amount),
            ],
        )
        .await?;
    let ubi_scheme = ctx
        .deploy(
            UnitKind::UbiScheme,
            vec![
                Value::Address(org.avatar),
                Value::Address(org.identity),
                Value::Address(first_claim_pool),
                Value::Uint(u128::from(claim.period_start)),
                Value::Uint(u128::from(claim.period_end)),
                Value::Uint(u128::from(claim.cycle_length_days)),
                Value::Uint(u128::from(claim.claim_distribution_fraction)),
            ],
        )
        .await?;

    tokio::try_join!(
        registrar.mint(org.native_token, first_claim_pool, params.initial_balance),
        registrar.mint(org.native_token, ubi_scheme, params.initial_balance),
    )?;
    registrar
        .register_schemes(&[first_claim_pool, ubi_scheme], &[], PermissionFlags::ALL)
        .await?;
    tokio::try_join!(
        ctx.activate(UnitKind::FirstClaimPool, first_claim_pool),
        ctx.activate(UnitKind::UbiScheme, ubi_scheme),
    )?;

    info!(
        run_id = %ctx.run_id(),
        %first_claim_pool,
        %ubi_scheme,
        period_start = claim.period_start,
        period_end = claim.period_end,
        "ubi module started"
    );
    Ok(UbiModule {
        first_claim_pool,
        ubi_scheme,
        claim_config: claim,
    })
}
