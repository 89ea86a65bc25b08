//! Records produced by each stage.
//!
//! Every record is created once per run by the stage that deploys it and is
//! only referenced afterwards.

use serde::{Deserialize, Serialize};

use crate::types::{Address, ParamsHash, PermissionFlags};

/// Tokens deployed ahead of the economic module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollateralSet {
    /// Plain collateral token
    pub collateral_token: Address,
    /// Reward token paid out by the yield token
    pub reward_token: Address,
    /// Yield-bearing wrapper of the collateral
    pub yield_token: Address,
}

/// The organization's identity/treasury/authority core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    /// Top-level identity/treasury proxy
    pub avatar: Address,
    /// Authority executing calls on the avatar's behalf (owner of the avatar)
    pub controller: Address,
    /// Identity registry, wired to the avatar
    pub identity: Address,
    /// Native token created with the avatar
    pub native_token: Address,
    /// Fee formula used by the native token
    pub fee_formula: Address,
}

/// A unit authorized to act through the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scheme {
    /// Scheme address
    pub address: Address,
    /// Configuration key, or [`ParamsHash::ZERO`] for none
    pub params_hash: ParamsHash,
    /// Permission mask
    pub permissions: PermissionFlags,
}

/// Reserve-token configuration registered on the market maker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveTokenConfig {
    /// Reserve token (the yield token)
    pub token: Address,
    /// Initial native-token supply backing the curve
    pub gd_reserve_amount: u128,
    /// Initial reserve-token balance backing the curve
    pub token_reserve_amount: u128,
    /// Reserve ratio in millionths (1 000 000 = 100%)
    pub reserve_ratio: u32,
}

/// The reserve / market maker / fund manager / staking subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomicModule {
    /// Bonding-curve reserve
    pub reserve: Address,
    /// Market maker, owned by the reserve
    pub market_maker: Address,
    /// Fund manager
    pub fund_manager: Address,
    /// Staking unit
    pub staking: Address,
    /// Contribution calculation used by the reserve
    pub contribution: Address,
    /// Configuration registered on the market maker
    pub reserve_token: ReserveTokenConfig,
}

/// Voting machine and proposal schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceModule {
    /// Absolute-vote voting machine
    pub voting_machine: Address,
    /// Scheme registrar proposal scheme
    pub scheme_registrar: Address,
    /// Upgrade proposal scheme
    pub upgrade_scheme: Address,
    /// Quorum configuration hash shared by all three units
    pub vote_params: ParamsHash,
    /// Upgrade scheme configuration hash
    pub upgrade_params: ParamsHash,
    /// Scheme registrar configuration hash
    pub scheme_register_params: ParamsHash,
}

/// Result of the governance stage.
///
/// Governance failures never abort a run; callers receive the reason instead
/// and must decide what a missing governance module means for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
#[must_use]
pub enum GovernanceOutcome {
    /// All three units deployed, configured and registered.
    Deployed(GovernanceModule),
    /// The stage failed; nothing from it should be used.
    Absent {
        /// Why the stage failed
        reason: String,
    },
}

impl GovernanceOutcome {
    /// The module, when deployed.
    #[must_use]
    pub const fn module(&self) -> Option<&GovernanceModule> {
        match self {
            Self::Deployed(module) => Some(module),
            Self::Absent { .. } => None,
        }
    }

    /// True when the module was deployed.
    #[must_use]
    pub const fn is_deployed(&self) -> bool {
        matches!(self, Self::Deployed(_))
    }
}

/// Claim schedule of the UBI module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimConfig {
    /// Bonus paid by the first-claim pool, and the cap of any single claim
    pub daily_claim_amount: u128,
    /// First second (unix time) claims are accepted
    pub period_start: u64,
    /// Last second (unix time) claims are accepted
    pub period_end: u64,
    /// Cycle length in days
    pub cycle_length_days: u32,
    /// Fraction of the pool distributed per cycle (denominator)
    pub claim_distribution_fraction: u32,
}

/// First-claim pool and UBI scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UbiModule {
    /// One-time bonus claim pool
    pub first_claim_pool: Address,
    /// Periodic claim scheme
    pub ubi_scheme: Address,
    /// Schedule both units were constructed with
    pub claim_config: ClaimConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn governance_outcome_accessors() {
        let absent = GovernanceOutcome::Absent {
            reason: "bad reputation system".to_string(),
        };
        assert!(!absent.is_deployed());
        assert!(absent.module().is_none());

        let module = GovernanceModule {
            voting_machine: Address::from_bytes([1; 20]),
            scheme_registrar: Address::from_bytes([2; 20]),
            upgrade_scheme: Address::from_bytes([3; 20]),
            vote_params: ParamsHash::from_bytes([4; 32]),
            upgrade_params: ParamsHash::from_bytes([5; 32]),
            scheme_register_params: ParamsHash::from_bytes([6; 32]),
        };
        let deployed = GovernanceOutcome::Deployed(module);
        assert!(deployed.is_deployed());
        assert_eq!(deployed.module(), Some(&module));
    }

    #[test]
    fn governance_outcome_serializes_status_tag() {
        let absent = GovernanceOutcome::Absent {
            reason: "x".to_string(),
        };
        let json = serde_json::to_value(&absent).unwrap_or_default();
        assert_eq!(json["status"], "absent");
        assert_eq!(json["reason"], "x");
    }
}
