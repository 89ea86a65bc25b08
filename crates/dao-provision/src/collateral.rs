//! Collateral stage: the tokens the economic module consumes.

use tracing::info;

use crate::context::DeployContext;
use crate::error::ProvisionResult;
use crate::gateway::{CapabilityGateway, UnitKind};
use crate::model::CollateralSet;
use crate::types::Value;

/// Deploys the collateral and reward tokens, then the yield token wrapping the collateral.
///
/// # Errors
///
/// Returns a deployment error if any constructor reverts.
pub async fn deploy_collateral<G: CapabilityGateway>(
    ctx: &DeployContext<G>,
) -> ProvisionResult<CollateralSet> {
    let (collateral_token, reward_token) = tokio::try_join!(
        ctx.deploy(UnitKind::CollateralToken, vec![Value::from("DAI")]),
        ctx.deploy(UnitKind::CollateralToken, vec![Value::from("COMP")]),
    )?;
    let yield_token = ctx
        .deploy(UnitKind::YieldToken, vec![Value::Address(collateral_token)])
        .await?;

    info!(
        run_id = %ctx.run_id(),
        %collateral_token,
        %reward_token,
        %yield_token,
        "collateral deployed"
    );
    Ok(CollateralSet {
        collateral_token,
        reward_token,
        yield_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NetworkInfo;
    use crate::simulated::SimulatedChain;
    use std::sync::Arc;

    #[tokio::test]
    async fn yield_token_wraps_collateral() {
        let chain = Arc::new(SimulatedChain::with_clock(1_000));
        let ctx = DeployContext::new(
            Arc::clone(&chain),
            NetworkInfo::new("develop", 4447),
            SimulatedChain::signers(3),
        );

        let set = deploy_collateral(&ctx).await.expect("collateral");
        assert_ne!(set.collateral_token, set.reward_token);

        let underlying = ctx
            .invoke(set.yield_token, "underlying", Vec::new())
            .await
            .ok()
            .and_then(|v| v.as_address());
        assert_eq!(underlying, Some(set.collateral_token));
        assert_eq!(chain.unit_count().await, 3);
    }
}
