//! Deployment context threaded into every stage.
//!
//! Holds the gateway handle, network metadata and the signer set. Nothing in
//! the pipeline reads signers or providers from global state.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ProvisionError, ProvisionResult};
use crate::gateway::{CapabilityGateway, GatewayResult, UnitKind};
use crate::types::{Address, RunId, Value};

/// Network the pipeline deploys to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    /// Network name (e.g., "develop")
    pub name: String,
    /// Numeric network ID
    pub id: u64,
}

impl NetworkInfo {
    /// Creates network metadata.
    #[must_use]
    pub fn new(name: impl Into<String>, id: u64) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }
}

/// Accounts that sign pipeline transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerSet {
    /// Signs every deployment and direct configuration call
    pub deployer: Address,
    /// Registered scheme the permission registrar acts as
    pub operator: Address,
    /// Founders receiving the initial token allocation
    pub founders: Vec<Address>,
}

/// Everything a stage needs to talk to the chain.
#[derive(Debug)]
pub struct DeployContext<G> {
    gateway: Arc<G>,
    network: NetworkInfo,
    signers: SignerSet,
    run_id: RunId,
}

impl<G> Clone for DeployContext<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            network: self.network.clone(),
            signers: self.signers.clone(),
            run_id: self.run_id,
        }
    }
}

impl<G: CapabilityGateway> DeployContext<G> {
    /// Creates a context with a fresh run ID.
    #[must_use]
    pub fn new(gateway: Arc<G>, network: NetworkInfo, signers: SignerSet) -> Self {
        Self {
            gateway,
            network,
            signers,
            run_id: RunId::new(),
        }
    }

    /// The gateway handle.
    #[must_use]
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Network metadata.
    #[must_use]
    pub const fn network(&self) -> &NetworkInfo {
        &self.network
    }

    /// Signer set.
    #[must_use]
    pub const fn signers(&self) -> &SignerSet {
        &self.signers
    }

    /// ID of this run.
    #[must_use]
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Deploys a unit as the deployer; reverts become deployment errors.
    pub async fn deploy(&self, unit: UnitKind, args: Vec<Value>) -> ProvisionResult<Address> {
        debug!(run_id = %self.run_id, %unit, args = args.len(), "deploying unit");
        let address = self
            .gateway
            .deploy(self.signers.deployer, unit, args)
            .await
            .map_err(|e| ProvisionError::deployment(unit, e.reason()))?;
        info!(run_id = %self.run_id, %unit, %address, "unit deployed");
        Ok(address)
    }

    /// Raw call as the deployer, leaving error mapping to the caller.
    pub async fn invoke(
        &self,
        target: Address,
        method: &str,
        args: Vec<Value>,
    ) -> GatewayResult<Value> {
        debug!(run_id = %self.run_id, %target, method, "calling unit");
        self.gateway
            .call(self.signers.deployer, target, method, args)
            .await
    }

    /// Configuration call during a unit's setup; reverts become deployment errors.
    pub async fn configure(
        &self,
        unit: UnitKind,
        target: Address,
        method: &str,
        args: Vec<Value>,
    ) -> ProvisionResult<Value> {
        self.invoke(target, method, args)
            .await
            .map_err(|e| ProvisionError::deployment(unit, format!("{method}: {}", e.reason())))
    }

    /// Reads an address-valued getter.
    pub async fn read_address(
        &self,
        unit: UnitKind,
        target: Address,
        method: &str,
    ) -> ProvisionResult<Address> {
        let value = self.configure(unit, target, method, Vec::new()).await?;
        value.as_address().ok_or_else(|| {
            ProvisionError::deployment(
                unit,
                format!("{method} returned {} instead of an address", value.type_name()),
            )
        })
    }

    /// Calls `start()`; reverts become activation errors.
    pub async fn activate(&self, unit: UnitKind, target: Address) -> ProvisionResult<()> {
        self.invoke(target, "start", Vec::new())
            .await
            .map_err(|e| ProvisionError::activation(unit, e.reason()))?;
        info!(run_id = %self.run_id, %unit, address = %target, "unit started");
        Ok(())
    }
}
