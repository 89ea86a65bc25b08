//! Capability gateway: the pipeline's only way to touch the chain.
//!
//! A gateway deploys units from a [`UnitKind`] plus constructor arguments and
//! invokes named methods on deployed units, awaiting finality for both. Retry
//! and timeout policy belong to the gateway implementation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use thiserror::Error;

use crate::types::{Address, Value};

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors surfaced by a capability gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The deployment or call reverted on-chain.
    #[error("reverted: {reason}")]
    Revert {
        /// Revert reason reported by the unit
        reason: String,
    },

    /// The call never reached the chain.
    #[error("transport error: {message}")]
    Transport {
        /// Description of the transport failure
        message: String,
    },
}

impl GatewayError {
    /// Creates a revert error.
    #[must_use]
    pub fn revert(reason: impl Into<String>) -> Self {
        Self::Revert {
            reason: reason.into(),
        }
    }

    /// The revert reason or transport message.
    #[must_use]
    pub fn reason(&self) -> &str {
        match self {
            Self::Revert { reason } => reason,
            Self::Transport { message } => message,
        }
    }
}

/// Definitions of every unit the pipeline deploys.
///
/// Constructor arguments, in order:
///
/// | kind | arguments |
/// |------|-----------|
/// | `CollateralToken` | symbol |
/// | `YieldToken` | underlying |
/// | `Identity`, `FoundersHelper`, `VotingMachine`, `SchemeRegistrar`, `UpgradeScheme` | none |
/// | `FeeFormula` | fee |
/// | `OrganizationFactory` | founders helper |
/// | `ContributionCalculation` | avatar, numerator, denominator |
/// | `FundManager` | avatar, identity, yield token, bridge, ubi recipient, block interval |
/// | `MarketMaker` | avatar, numerator, denominator |
/// | `Reserve` | collateral, yield token, fund manager, avatar, identity, market maker, contribution, block interval |
/// | `Staking` | collateral, yield token, fund manager, block interval, avatar, identity |
/// | `FirstClaimPool` | avatar, identity, claim amount |
/// | `UbiScheme` | avatar, identity, first claim pool, period start, period end, cycle length (days), distribution fraction |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    /// Plain collateral token (DAI-like mock)
    CollateralToken,
    /// Interest-bearing wrapper of the collateral (cDAI-like mock)
    YieldToken,
    /// Identity / whitelist registry
    Identity,
    /// Transfer fee formula
    FeeFormula,
    /// Founders allocation helper used by the factory
    FoundersHelper,
    /// Organization factory that forges avatar, controller and token
    OrganizationFactory,
    /// Contribution calculation used by the reserve
    ContributionCalculation,
    /// Yield-harvesting fund manager
    FundManager,
    /// Bonding-curve pricing state
    MarketMaker,
    /// Bonding-curve reserve
    Reserve,
    /// Collateral staking
    Staking,
    /// Absolute-vote voting machine
    VotingMachine,
    /// Scheme registrar proposal scheme
    SchemeRegistrar,
    /// Controller upgrade proposal scheme
    UpgradeScheme,
    /// One-time bonus claim pool
    FirstClaimPool,
    /// Periodic UBI claim scheme
    UbiScheme,
}

impl UnitKind {
    /// Artifact name of the definition.
    #[must_use]
    pub const fn artifact(&self) -> &'static str {
        match self {
            Self::CollateralToken => "DAIMock",
            Self::YieldToken => "cDAIMock",
            Self::Identity => "Identity",
            Self::FeeFormula => "FeeFormula",
            Self::FoundersHelper => "AddFoundersGoodDollar",
            Self::OrganizationFactory => "DaoCreatorGoodDollar",
            Self::ContributionCalculation => "ContributionCalculation",
            Self::FundManager => "GoodFundManager",
            Self::MarketMaker => "GoodMarketMaker",
            Self::Reserve => "GoodReserveCDai",
            Self::Staking => "SimpleDAIStaking",
            Self::VotingMachine => "AbsoluteVote",
            Self::SchemeRegistrar => "SchemeRegistrar",
            Self::UpgradeScheme => "UpgradeScheme",
            Self::FirstClaimPool => "FirstClaimPool",
            Self::UbiScheme => "UBIScheme",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.artifact())
    }
}

/// Deploys units and invokes their methods.
pub trait CapabilityGateway: Send + Sync {
    /// Deploys a unit signed by `from` and returns its address.
    ///
    /// # Errors
    ///
    /// Returns error if the constructor reverts or the chain is unreachable.
    fn deploy(
        &self,
        from: Address,
        unit: UnitKind,
        args: Vec<Value>,
    ) -> impl Future<Output = GatewayResult<Address>> + Send;

    /// Invokes `method` on the unit at `target`, signed by `from`.
    ///
    /// # Errors
    ///
    /// Returns error if the call reverts or the chain is unreachable.
    fn call(
        &self,
        from: Address,
        target: Address,
        method: &str,
        args: Vec<Value>,
    ) -> impl Future<Output = GatewayResult<Value>> + Send;
}
