//! Permission registrar: scheme registration and controller-proxied calls.
//!
//! The registrar acts as one registered scheme (the operator). Registrations
//! are issued one call per entry, in order, and are not transactional: if
//! entry `i` is rejected, entries `0..i` stay registered.

use tracing::{debug, info};

use crate::context::DeployContext;
use crate::error::{ProvisionError, ProvisionResult};
use crate::gateway::CapabilityGateway;
use crate::model::{Organization, ReserveTokenConfig, Scheme};
use crate::types::{Address, EncodedCall, ParamsHash, PermissionFlags, Value};

/// Registers schemes on, and forwards calls through, an organization's controller.
#[derive(Debug)]
pub struct PermissionRegistrar<'a, G> {
    ctx: &'a DeployContext<G>,
    organization: Organization,
    operator: Address,
}

impl<'a, G: CapabilityGateway> PermissionRegistrar<'a, G> {
    /// Creates a registrar acting as the context's operator signer.
    #[must_use]
    pub fn new(ctx: &'a DeployContext<G>, organization: Organization) -> Self {
        Self {
            ctx,
            organization,
            operator: ctx.signers().operator,
        }
    }

    /// Returns a registrar acting through another registered scheme.
    #[must_use]
    pub fn as_operator(&self, operator: Address) -> Self {
        Self {
            ctx: self.ctx,
            organization: self.organization,
            operator,
        }
    }

    /// The scheme this registrar acts as.
    #[must_use]
    pub const fn operator(&self) -> Address {
        self.operator
    }

    /// The organization whose controller this registrar calls.
    #[must_use]
    pub const fn organization(&self) -> &Organization {
        &self.organization
    }

    /// Registers each address as a scheme with `mask`; the controller adds `REGISTERED`.
    ///
    /// `params_hashes` may be shorter than `addresses`; missing entries use
    /// the zero hash.
    ///
    /// # Errors
    ///
    /// Returns a permission error on the first rejected entry. Earlier
    /// entries remain registered.
    pub async fn register_schemes(
        &self,
        addresses: &[Address],
        params_hashes: &[ParamsHash],
        mask: PermissionFlags,
    ) -> ProvisionResult<Vec<Scheme>> {
        if params_hashes.len() > addresses.len() {
            return Err(ProvisionError::permission(
                self.organization.controller,
                format!(
                    "{} parameter hashes given for {} schemes",
                    params_hashes.len(),
                    addresses.len()
                ),
            ));
        }

        let mut registered = Vec::with_capacity(addresses.len());
        for (index, address) in addresses.iter().enumerate() {
            let params_hash = params_hashes.get(index).copied().unwrap_or(ParamsHash::ZERO);
            self.ctx
                .gateway()
                .call(
                    self.operator,
                    self.organization.controller,
                    "registerScheme",
                    vec![
                        Value::Address(*address),
                        Value::Hash(params_hash),
                        Value::Flags(mask),
                        Value::Address(self.organization.avatar),
                    ],
                )
                .await
                .map_err(|e| ProvisionError::permission(address, e.reason()))?;
            info!(
                run_id = %self.ctx.run_id(),
                scheme = %address,
                params = %params_hash,
                permissions = %mask,
                "scheme registered"
            );
            registered.push(Scheme {
                address: *address,
                params_hash,
                permissions: mask | PermissionFlags::REGISTERED,
            });
        }
        Ok(registered)
    }

    /// Forwards already-encoded call bytes through the controller's generic call.
    ///
    /// # Errors
    ///
    /// Returns a permission error if the controller rejects the call.
    pub async fn proxy_call(&self, target: Address, encoded_call: &[u8]) -> ProvisionResult<Value> {
        debug!(
            run_id = %self.ctx.run_id(),
            operator = %self.operator,
            %target,
            bytes = encoded_call.len(),
            "forwarding generic call"
        );
        self.ctx
            .gateway()
            .call(
                self.operator,
                self.organization.controller,
                "genericCall",
                vec![
                    Value::Address(target),
                    Value::Bytes(encoded_call.to_vec()),
                    Value::Address(self.organization.avatar),
                    Value::Uint(0),
                ],
            )
            .await
            .map_err(|e| ProvisionError::permission(target, e.reason()))
    }

    /// Encodes `call` and forwards it.
    ///
    /// # Errors
    ///
    /// Returns a permission error if the controller rejects the call.
    pub async fn forward(&self, target: Address, call: &EncodedCall) -> ProvisionResult<Value> {
        let encoded = call.encode()?;
        self.proxy_call(target, &encoded).await
    }

    /// Mints native token (or any controller-gated token) to `to`.
    pub async fn mint(&self, token: Address, to: Address, amount: u128) -> ProvisionResult<()> {
        self.forward(
            token,
            &EncodedCall::new("mint", vec![Value::Address(to), Value::Uint(amount)]),
        )
        .await?;
        info!(run_id = %self.ctx.run_id(), %token, %to, amount, "minted through controller");
        Ok(())
    }

    /// Grants mint authority on `token` to `minter`.
    pub async fn add_minter(&self, token: Address, minter: Address) -> ProvisionResult<()> {
        self.forward(token, &EncodedCall::new("addMinter", vec![Value::Address(minter)]))
            .await?;
        info!(run_id = %self.ctx.run_id(), %token, %minter, "minter added");
        Ok(())
    }

    /// Whitelists `account` on the organization's identity registry.
    ///
    /// Contracts are added as DAO contracts and carry no DID; other accounts
    /// are whitelisted under `did`.
    pub async fn add_whitelisted(
        &self,
        account: Address,
        did: &str,
        is_contract: bool,
    ) -> ProvisionResult<()> {
        let call = if is_contract {
            EncodedCall::new("addContract", vec![Value::Address(account)])
        } else {
            EncodedCall::new(
                "addWhitelistedWithDID",
                vec![Value::Address(account), Value::from(did)],
            )
        };
        self.forward(self.organization.identity, &call).await?;
        info!(run_id = %self.ctx.run_id(), %account, is_contract, "account whitelisted");
        Ok(())
    }

    /// Registers the reserve-token configuration on the market maker.
    pub async fn initialize_reserve_token(
        &self,
        market_maker: Address,
        config: &ReserveTokenConfig,
    ) -> ProvisionResult<()> {
        self.forward(
            market_maker,
            &EncodedCall::new(
                "initializeToken",
                vec![
                    Value::Address(config.token),
                    Value::Uint(config.gd_reserve_amount),
                    Value::Uint(config.token_reserve_amount),
                    Value::Uint(u128::from(config.reserve_ratio)),
                ],
            ),
        )
        .await?;
        info!(
            run_id = %self.ctx.run_id(),
            %market_maker,
            token = %config.token,
            reserve_ratio = config.reserve_ratio,
            "reserve token initialized"
        );
        Ok(())
    }

    /// True if `scheme` is registered on the controller.
    pub async fn is_registered(&self, scheme: Address) -> ProvisionResult<bool> {
        let value = self.read_controller("isSchemeRegistered", scheme).await?;
        value.as_bool().ok_or_else(|| {
            ProvisionError::permission(scheme, format!("isSchemeRegistered returned {value:?}"))
        })
    }

    /// Permission mask of `scheme`; empty if unregistered.
    pub async fn permissions_of(&self, scheme: Address) -> ProvisionResult<PermissionFlags> {
        let value = self.read_controller("getSchemePermissions", scheme).await?;
        value.as_flags().ok_or_else(|| {
            ProvisionError::permission(scheme, format!("getSchemePermissions returned {value:?}"))
        })
    }

    async fn read_controller(&self, method: &str, scheme: Address) -> ProvisionResult<Value> {
        self.ctx
            .gateway()
            .call(
                self.operator,
                self.organization.controller,
                method,
                vec![Value::Address(scheme), Value::Address(self.organization.avatar)],
            )
            .await
            .map_err(|e| ProvisionError::permission(scheme, e.reason()))
    }
}
