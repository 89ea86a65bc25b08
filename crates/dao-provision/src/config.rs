//! Pipeline configuration.
//!
//! Every field defaults to the value the reference deployment uses, so an
//! empty JSON object is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::context::NetworkInfo;
use crate::error::{ProvisionError, ProvisionResult};

/// Reserve ratio expressed in millionths; 100%.
pub const FULL_RESERVE_RATIO: u32 = 1_000_000;

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Target network
    pub network: NetworkConfig,
    /// Bootstrap settings
    pub organization: OrganizationConfig,
    /// Economic module settings
    pub economy: EconomyConfig,
    /// Governance settings
    pub governance: GovernanceConfig,
    /// UBI settings
    pub ubi: UbiConfig,
    /// Manifest output
    pub manifest: ManifestConfig,
}

impl PipelineConfig {
    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> ProvisionResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), "loaded pipeline config");
        Ok(config)
    }

    /// Validates cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first violated constraint.
    pub fn validate(&self) -> ProvisionResult<()> {
        if self.organization.allocations.is_empty() {
            return Err(ProvisionError::InvalidConfig(
                "at least one founder allocation is required".to_string(),
            ));
        }
        if self.organization.token_name.is_empty() || self.organization.token_symbol.is_empty() {
            return Err(ProvisionError::InvalidConfig(
                "token name and symbol cannot be empty".to_string(),
            ));
        }
        let token = &self.economy.market_maker.reserve_token;
        if token.reserve_ratio == 0 || token.reserve_ratio > FULL_RESERVE_RATIO {
            return Err(ProvisionError::InvalidConfig(format!(
                "reserve ratio must be in 1..={FULL_RESERVE_RATIO}, got {}",
                token.reserve_ratio
            )));
        }
        if token.gd_reserve_amount == 0 || token.token_reserve_amount == 0 {
            return Err(ProvisionError::InvalidConfig(
                "reserve amounts must be non-zero".to_string(),
            ));
        }
        if self.economy.contribution.denominator == 0 {
            return Err(ProvisionError::InvalidConfig(
                "contribution denominator must be non-zero".to_string(),
            ));
        }
        if self.ubi.cycle_length_days == 0 || self.ubi.claim_distribution_fraction == 0 {
            return Err(ProvisionError::InvalidConfig(
                "ubi cycle length and distribution fraction must be non-zero".to_string(),
            ));
        }
        if self.manifest.tag.is_empty() {
            return Err(ProvisionError::InvalidConfig("manifest tag cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Validates the configuration for a run against `network`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::InvalidConfig`] if [`Self::validate`] fails
    /// or the configured network is not the one being deployed to.
    pub fn validate_for(&self, network: &NetworkInfo) -> ProvisionResult<()> {
        self.validate()?;
        if self.network.info() != *network {
            return Err(ProvisionError::InvalidConfig(format!(
                "configured network {} ({}) does not match target {} ({})",
                self.network.name, self.network.id, network.name, network.id
            )));
        }
        Ok(())
    }
}

/// Target network metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Network name
    pub name: String,
    /// Network ID
    pub id: u64,
}

impl NetworkConfig {
    /// Network metadata for a deployment context.
    #[must_use]
    pub fn info(&self) -> NetworkInfo {
        NetworkInfo::new(self.name.clone(), self.id)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: "develop".to_string(),
            id: 4447,
        }
    }
}

/// Bootstrap settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizationConfig {
    /// Native token name
    pub token_name: String,
    /// Native token symbol
    pub token_symbol: String,
    /// Token cap, 0 for uncapped
    pub cap: u128,
    /// Transfer fee of the fee formula
    pub fee: u128,
    /// Founders' reputation supply
    pub total_supply: u128,
    /// Token allocation per founder, in founder order
    pub allocations: Vec<u128>,
    /// Identity authentication period in days
    pub authentication_period_days: u32,
}

impl Default for OrganizationConfig {
    fn default() -> Self {
        Self {
            token_name: "G$".to_string(),
            token_symbol: "G$".to_string(),
            cap: 0,
            fee: 0,
            total_supply: 1000,
            allocations: vec![100_000, 100_000, 100_000],
            authentication_period_days: 365,
        }
    }
}

/// Economic module settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Contribution calculation
    pub contribution: ContributionParams,
    /// Fund manager
    pub fund_manager: FundManagerParams,
    /// Market maker and its reserve token
    pub market_maker: MarketMakerParams,
    /// Reserve
    pub reserve: ReserveParams,
    /// Staking
    pub staking: StakingParams,
}

/// Contribution calculation ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContributionParams {
    /// Ratio numerator
    pub numerator: u128,
    /// Ratio denominator
    pub denominator: u128,
}

impl Default for ContributionParams {
    fn default() -> Self {
        Self {
            numerator: 0,
            denominator: 1_000_000_000_000_000,
        }
    }
}

/// Fund manager constructor parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FundManagerParams {
    /// Blocks between yield collections
    pub block_interval: u128,
}

impl Default for FundManagerParams {
    fn default() -> Self {
        Self { block_interval: 100 }
    }
}

/// Market maker constructor parameters and the reserve token it is seeded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketMakerParams {
    /// Curve bound numerator
    pub numerator: u128,
    /// Curve bound denominator
    pub denominator: u128,
    /// Reserve token amounts and ratio
    pub reserve_token: ReserveTokenParams,
}

impl Default for MarketMakerParams {
    fn default() -> Self {
        Self {
            numerator: 9_999_999_999,
            denominator: 10_000_000_000,
            reserve_token: ReserveTokenParams::default(),
        }
    }
}

/// Reserve token amounts; the token itself is the yield token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReserveTokenParams {
    /// Native-token supply backing the curve (100 = 1 G$)
    pub gd_reserve_amount: u128,
    /// Reserve-token balance backing the curve (10 000 = 0.0001 cDAI)
    pub token_reserve_amount: u128,
    /// Reserve ratio in millionths
    pub reserve_ratio: u32,
}

impl Default for ReserveTokenParams {
    fn default() -> Self {
        Self {
            gd_reserve_amount: 100,
            token_reserve_amount: 10_000,
            reserve_ratio: FULL_RESERVE_RATIO,
        }
    }
}

/// Reserve constructor parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReserveParams {
    /// Blocks between reserve cycles
    pub block_interval: u128,
}

impl Default for ReserveParams {
    fn default() -> Self {
        Self { block_interval: 100 }
    }
}

/// Staking constructor parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StakingParams {
    /// Blocks between interest collections
    pub block_interval: u128,
}

impl Default for StakingParams {
    fn default() -> Self {
        Self { block_interval: 100 }
    }
}

/// Governance settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Quorum percentage of the voting machine
    pub quorum_percent: u32,
    /// Reputation system address as hex; parsed by the governance stage
    pub reputation_system: String,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            quorum_percent: 50,
            reputation_system: "0x0000000000000000000000000000000000000000".to_string(),
        }
    }
}

/// UBI settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UbiConfig {
    /// First-claim bonus and per-claim cap
    pub daily_claim_amount: u128,
    /// Period start (unix seconds); `None` means the time of the run
    pub period_start: Option<u64>,
    /// Period length in seconds
    pub period_length_secs: u64,
    /// Cycle length in days
    pub cycle_length_days: u32,
    /// Distribution fraction
    pub claim_distribution_fraction: u32,
    /// Balance minted to each of the two units before start
    pub initial_balance: u128,
}

impl Default for UbiConfig {
    fn default() -> Self {
        Self {
            daily_claim_amount: 1000,
            period_start: None,
            period_length_secs: 1000,
            cycle_length_days: 14,
            claim_distribution_fraction: 7,
            initial_balance: 1_000_000,
        }
    }
}

/// Manifest output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// Tag the manifest is recorded under
    pub tag: String,
    /// JSON file used by the file recorder
    pub path: PathBuf,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            tag: "olddao".to_string(),
            path: PathBuf::from("releases/deployment.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn target_network_must_match() {
        let config = PipelineConfig::default();
        assert!(config.validate_for(&NetworkInfo::new("develop", 4447)).is_ok());
        assert!(matches!(
            config.validate_for(&NetworkInfo::new("develop", 122)),
            Err(ProvisionError::InvalidConfig(_))
        ));
        assert!(matches!(
            config.validate_for(&NetworkInfo::new("fuse", 4447)),
            Err(ProvisionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn empty_object_uses_defaults() {
        let parsed: PipelineConfig = serde_json::from_str("{}").expect("parse");
        assert_eq!(parsed, PipelineConfig::default());
        assert_eq!(parsed.network.id, 4447);
        assert_eq!(parsed.economy.market_maker.reserve_token.reserve_ratio, 1_000_000);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let parsed: Result<PipelineConfig, _> =
            serde_json::from_str(r#"{"governance": {"quorum_percent": 60}}"#);
        let parsed = parsed.ok();
        assert_eq!(parsed.as_ref().map(|c| c.governance.quorum_percent), Some(60));
        assert_eq!(
            parsed.as_ref().map(|c| c.governance.reputation_system.len()),
            Some(42)
        );
    }

    #[test]
    fn rejects_ratio_above_full() {
        let mut config = PipelineConfig::default();
        config.economy.market_maker.reserve_token.reserve_ratio = FULL_RESERVE_RATIO + 1;
        assert!(matches!(config.validate(), Err(ProvisionError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_empty_allocations() {
        let mut config = PipelineConfig::default();
        config.organization.allocations.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_cycle() {
        let mut config = PipelineConfig::default();
        config.ubi.cycle_length_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{"network": {"name": "fuse", "id": 122}}"#).expect("write");

        let config = PipelineConfig::load(&path).expect("load");
        assert_eq!(config.network.name, "fuse");
        assert_eq!(config.network.id, 122);
        assert_eq!(config.organization.allocations.len(), 3);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let result = PipelineConfig::load(Path::new("/nonexistent/pipeline.json"));
        assert!(matches!(result, Err(ProvisionError::Io(_))));
    }
}
