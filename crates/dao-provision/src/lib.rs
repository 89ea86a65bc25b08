//! # dao-provision
//!
//! Provisioning pipeline for a multi-module decentralized organization.
//!
//! One run deploys and cross-wires a fixed topology of units through a
//! [`CapabilityGateway`]: an identity/treasury/authority core, an economic
//! module (reserve, market maker, fund manager, staking), a governance module
//! (voting machine and proposal schemes) and a UBI module (first-claim pool
//! and claim scheme). The resulting address map is handed to a
//! [`ManifestRecorder`].
//!
//! ## Features
//!
//! - **Dependency-ordered stages**: the stage order is a topological sort of
//!   an explicit [`StageGraph`]
//! - **Typed permissions**: scheme masks are [`PermissionFlags`], not hex strings
//! - **Explicit context**: gateway, network and signers travel in a [`DeployContext`]
//! - **Tagged governance outcome**: a failed governance stage yields
//!   [`GovernanceOutcome::Absent`] instead of aborting the run
//! - **Simulated chain**: [`SimulatedChain`] implements the gateway in memory
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use dao_provision::{
//!     DeployContext, MemoryRecorder, NetworkInfo, Pipeline, PipelineConfig, SimulatedChain,
//! };
//!
//! let runtime = tokio::runtime::Builder::new_current_thread().build()?;
//! let report = runtime.block_on(async {
//!     let chain = Arc::new(SimulatedChain::new());
//!     let ctx = DeployContext::new(
//!         chain,
//!         NetworkInfo::new("develop", 4447),
//!         SimulatedChain::signers(3),
//!     );
//!     Pipeline::new(ctx, PipelineConfig::default(), MemoryRecorder::new())
//!         .run()
//!         .await
//! })?;
//!
//! assert!(report.governance.is_deployed());
//! assert!(report.manifest.get("Reserve").is_some());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Modules
//!
//! - [`types`]: Addresses, hashes, permission flags and call values
//! - [`error`]: Error types and results
//! - [`gateway`]: Capability gateway trait and unit kinds
//! - [`context`]: Deployment context and signer set
//! - [`plan`]: Stage graph and failure policies
//! - [`registrar`]: Scheme registration and controller-proxied calls
//! - [`collateral`], [`bootstrap`], [`economy`], [`governance`], [`ubi`]: Stages
//! - [`manifest`]: Deployment manifest and recorders
//! - [`pipeline`]: Pipeline driver
//! - [`simulated`]: In-memory gateway

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bootstrap;
pub mod collateral;
pub mod config;
pub mod context;
pub mod economy;
pub mod error;
pub mod gateway;
pub mod governance;
pub mod manifest;
pub mod model;
pub mod params;
pub mod pipeline;
pub mod plan;
pub mod registrar;
pub mod simulated;
pub mod types;
pub mod ubi;

// Re-export main types for convenience
pub use bootstrap::{OrganizationParams, create_organization};
pub use collateral::deploy_collateral;
pub use config::PipelineConfig;
pub use context::{DeployContext, NetworkInfo, SignerSet};
pub use economy::{WiringChecklist, WiringStep, deploy_economy};
pub use error::{ProvisionError, ProvisionResult};
pub use gateway::{CapabilityGateway, GatewayError, GatewayResult, UnitKind};
pub use governance::deploy_governance;
pub use manifest::{DeploymentManifest, JsonFileRecorder, ManifestRecorder, MemoryRecorder};
pub use model::{
    ClaimConfig, CollateralSet, EconomicModule, GovernanceModule, GovernanceOutcome,
    Organization, ReserveTokenConfig, Scheme, UbiModule,
};
pub use pipeline::{Pipeline, PipelineReport};
pub use plan::{FailurePolicy, Stage, StageGraph};
pub use registrar::PermissionRegistrar;
pub use simulated::SimulatedChain;
pub use types::{Address, EncodedCall, ParamsHash, PermissionFlags, RunId, Value};
pub use ubi::{UbiParams, deploy_ubi};
