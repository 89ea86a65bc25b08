//! Organization core: tokens, identity, factory, avatar and controller.

use std::collections::{HashMap, HashSet};

use super::{Args, Call, ChainState, Unit, require};
use crate::gateway::{GatewayError, GatewayResult};
use crate::types::{Address, EncodedCall, ParamsHash, PermissionFlags, Value};

/// Who may mint a token.
#[derive(Debug)]
enum MintGate {
    /// Anyone (test collateral)
    Open,
    /// Listed minters; `admin` may add more
    Minters {
        admin: Address,
        minters: HashSet<Address>,
    },
}

/// Fungible token: collateral mocks and the native token.
#[derive(Debug)]
pub(super) struct Token {
    symbol: String,
    underlying: Option<Address>,
    balances: HashMap<Address, u128>,
    total_supply: u128,
    gate: MintGate,
}

impl Token {
    /// Mock with open minting.
    pub(super) fn open(symbol: &str, underlying: Option<Address>) -> Self {
        Self {
            symbol: symbol.to_string(),
            underlying,
            balances: HashMap::new(),
            total_supply: 0,
            gate: MintGate::Open,
        }
    }

    /// Native token; `admin` is its only minter until it adds others.
    fn native(symbol: &str, admin: Address) -> Self {
        Self {
            symbol: symbol.to_string(),
            underlying: None,
            balances: HashMap::new(),
            total_supply: 0,
            gate: MintGate::Minters {
                admin,
                minters: HashSet::from([admin]),
            },
        }
    }

    pub(super) fn balance_of(&self, account: Address) -> u128 {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    pub(super) fn is_minter(&self, account: Address) -> bool {
        match &self.gate {
            MintGate::Open => true,
            MintGate::Minters { minters, .. } => minters.contains(&account),
        }
    }

    pub(super) fn credit(&mut self, to: Address, amount: u128) -> GatewayResult<()> {
        self.total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or_else(|| GatewayError::revert(format!("{}: supply overflow", self.symbol)))?;
        *self.balances.entry(to).or_insert(0) += amount;
        Ok(())
    }

    fn move_balance(&mut self, from: Address, to: Address, amount: u128) -> GatewayResult<()> {
        let balance = self.balance_of(from);
        require(
            balance >= amount,
            format!("{}: transfer amount exceeds balance", self.symbol),
        )?;
        self.balances.insert(from, balance - amount);
        *self.balances.entry(to).or_insert(0) += amount;
        Ok(())
    }
}

pub(super) fn token_call(state: &mut ChainState, call: &Call<'_>) -> GatewayResult<Value> {
    let args = call.args;
    let token = state.token_mut(call.this)?;
    match call.method {
        "mint" => {
            require(token.is_minter(call.sender), "caller does not have the minter role")?;
            token.credit(args.address(0)?, args.uint(1)?)?;
            Ok(Value::Bool(true))
        }
        "addMinter" => match &mut token.gate {
            MintGate::Open => Err(GatewayError::revert("minting is unrestricted")),
            MintGate::Minters { admin, minters } => {
                require(call.sender == *admin, "caller is not the token admin")?;
                minters.insert(args.address(0)?);
                Ok(Value::Unit)
            }
        },
        "isMinter" => Ok(Value::Bool(token.is_minter(args.address(0)?))),
        "balanceOf" => Ok(Value::Uint(token.balance_of(args.address(0)?))),
        "totalSupply" => Ok(Value::Uint(token.total_supply)),
        "transfer" => {
            token.move_balance(call.sender, args.address(0)?, args.uint(1)?)?;
            Ok(Value::Bool(true))
        }
        "symbol" => Ok(Value::Str(token.symbol.clone())),
        "underlying" => token
            .underlying
            .map(Value::Address)
            .ok_or_else(|| GatewayError::revert(format!("{} has no underlying", token.symbol))),
        _ => Err(call.unknown("Token")),
    }
}

/// Identity / whitelist registry.
#[derive(Debug)]
pub(super) struct Identity {
    owner: Address,
    avatar: Option<Address>,
    authentication_period_days: u128,
    whitelisted: HashSet<Address>,
    contracts: HashSet<Address>,
}

impl Identity {
    pub(super) fn new(owner: Address) -> Self {
        Self {
            owner,
            avatar: None,
            authentication_period_days: 0,
            whitelisted: HashSet::new(),
            contracts: HashSet::new(),
        }
    }

    pub(super) fn is_whitelisted(&self, account: Address) -> bool {
        self.whitelisted.contains(&account) || self.contracts.contains(&account)
    }

    fn require_admin(&self, sender: Address) -> GatewayResult<()> {
        require(
            sender == self.owner || Some(sender) == self.avatar,
            "caller is not an identity admin",
        )
    }
}

pub(super) fn identity_call(state: &mut ChainState, call: &Call<'_>) -> GatewayResult<Value> {
    let args = call.args;
    if call.method == "setAvatar" {
        let avatar = args.address(0)?;
        state.avatar(avatar)?;
        let identity = state.identity_mut(call.this)?;
        require(call.sender == identity.owner, "caller is not the identity owner")?;
        identity.avatar = Some(avatar);
        return Ok(Value::Unit);
    }

    if call.method == "addContract" {
        require(state.is_unit(args.address(0)?), "address is not a contract")?;
    }

    let identity = state.identity_mut(call.this)?;
    match call.method {
        "setAuthenticationPeriod" => {
            identity.require_admin(call.sender)?;
            identity.authentication_period_days = args.uint(0)?;
            Ok(Value::Unit)
        }
        "authenticationPeriod" => Ok(Value::Uint(identity.authentication_period_days)),
        "avatar" => Ok(Value::Address(identity.avatar.unwrap_or(Address::ZERO))),
        "addWhitelistedWithDID" => {
            require(identity.avatar.is_some(), "identity has no avatar")?;
            identity.require_admin(call.sender)?;
            args.string(1)?;
            identity.whitelisted.insert(args.address(0)?);
            Ok(Value::Unit)
        }
        "addContract" => {
            require(identity.avatar.is_some(), "identity has no avatar")?;
            identity.require_admin(call.sender)?;
            identity.contracts.insert(args.address(0)?);
            Ok(Value::Unit)
        }
        "isWhitelisted" => Ok(Value::Bool(identity.is_whitelisted(args.address(0)?))),
        "isDAOContract" => Ok(Value::Bool(identity.contracts.contains(&args.address(0)?))),
        _ => Err(call.unknown("Identity")),
    }
}

/// Transfer fee formula.
#[derive(Debug)]
pub(super) struct FeeFormula {
    pub(super) fee: u128,
}

pub(super) fn fee_formula_call(state: &mut ChainState, call: &Call<'_>) -> GatewayResult<Value> {
    let Some(Unit::FeeFormula(formula)) = state.units.get(&call.this) else {
        return Err(GatewayError::revert(format!("no fee formula at {}", call.this)));
    };
    match call.method {
        "fee" => Ok(Value::Uint(formula.fee)),
        "getTxFees" => {
            let value = call.args.uint(0)?;
            Ok(Value::Uint(value.saturating_mul(formula.fee) / 100))
        }
        _ => Err(call.unknown("FeeFormula")),
    }
}

/// One-shot organization factory.
#[derive(Debug)]
pub(super) struct Factory {
    founders_helper: Address,
    creator: Option<Address>,
    avatar: Option<Address>,
    schemes_set: bool,
}

impl Factory {
    pub(super) fn construct(state: &ChainState, args: Args<'_>) -> GatewayResult<Self> {
        let founders_helper = args.address(0)?;
        require(
            matches!(state.units.get(&founders_helper), Some(Unit::FoundersHelper)),
            format!("{founders_helper} is not a founders helper"),
        )?;
        Ok(Self {
            founders_helper,
            creator: None,
            avatar: None,
            schemes_set: false,
        })
    }
}

pub(super) fn factory_call(state: &mut ChainState, call: &Call<'_>) -> GatewayResult<Value> {
    match call.method {
        "forgeOrg" => forge_org(state, call),
        "setSchemes" => set_schemes(state, call),
        "avatar" => {
            let factory = state.factory(call.this)?;
            Ok(Value::Address(factory.avatar.unwrap_or(Address::ZERO)))
        }
        "foundersHelper" => Ok(Value::Address(state.factory(call.this)?.founders_helper)),
        _ => Err(call.unknown("DaoCreator")),
    }
}

fn forge_org(state: &mut ChainState, call: &Call<'_>) -> GatewayResult<Value> {
    let args = call.args;
    let name = args.string(0)?;
    let symbol = args.string(1)?;
    let _cap = args.uint(2)?;
    let fee_formula = args.address(3)?;
    let identity = args.address(4)?;
    let founders = args.addresses(5)?;
    let reputation_supply = args.uint(6)?;
    let allocations = args.uints(7)?;

    require(state.factory(call.this)?.avatar.is_none(), "organization already forged")?;
    require(
        matches!(state.units.get(&fee_formula), Some(Unit::FeeFormula(_))),
        format!("{fee_formula} is not a fee formula"),
    )?;
    state.identity(identity)?;
    require(!founders.is_empty(), "at least one founder is required")?;
    require(
        founders.len() == allocations.len(),
        "founders and allocations differ in length",
    )?;

    let avatar = state.create_address(call.this);
    let native_token = state.create_address(call.this);
    let controller = state.create_address(call.this);

    let mut token = Token::native(symbol, avatar);
    for (founder, amount) in founders.iter().zip(allocations) {
        token.credit(*founder, *amount)?;
    }

    state.units.insert(native_token, Unit::Token(token));
    state.units.insert(
        avatar,
        Unit::Avatar(Avatar {
            name: name.to_string(),
            owner: controller,
            native_token,
            reputation_supply,
        }),
    );
    state.units.insert(
        controller,
        Unit::Controller(Controller {
            avatar,
            schemes: HashMap::from([(
                call.this,
                SchemeEntry {
                    params: ParamsHash::ZERO,
                    permissions: PermissionFlags::ALL,
                },
            )]),
        }),
    );

    let factory = state.factory_mut(call.this)?;
    factory.creator = Some(call.sender);
    factory.avatar = Some(avatar);
    Ok(Value::Address(avatar))
}

fn set_schemes(state: &mut ChainState, call: &Call<'_>) -> GatewayResult<Value> {
    let args = call.args;
    let avatar = args.address(0)?;
    let schemes = args.addresses(1)?;
    let params = args.hashes(2)?;
    let permissions = args.uints(3)?;
    args.string(4)?;

    let factory = state.factory(call.this)?;
    require(factory.avatar == Some(avatar), "avatar was not forged by this factory")?;
    require(factory.creator == Some(call.sender), "caller did not forge the organization")?;
    require(!factory.schemes_set, "schemes already set")?;
    require(
        schemes.len() == params.len() && schemes.len() == permissions.len(),
        "schemes, params and permissions differ in length",
    )?;

    let controller_address = state.avatar(avatar)?.owner;
    let controller = state.controller_mut(controller_address)?;
    for ((scheme, params), bits) in schemes.iter().zip(params).zip(permissions) {
        let bits = u32::try_from(*bits)
            .map_err(|_| GatewayError::revert("permission mask overflows u32"))?;
        controller.schemes.insert(
            *scheme,
            SchemeEntry {
                params: *params,
                permissions: PermissionFlags::from_bits_truncate(bits) | PermissionFlags::REGISTERED,
            },
        );
    }
    controller.schemes.remove(&call.this);

    state.factory_mut(call.this)?.schemes_set = true;
    Ok(Value::Unit)
}

/// Identity/treasury proxy owned by the controller.
#[derive(Debug)]
pub(super) struct Avatar {
    name: String,
    pub(super) owner: Address,
    pub(super) native_token: Address,
    reputation_supply: u128,
}

pub(super) fn avatar_call(state: &mut ChainState, call: &Call<'_>) -> GatewayResult<Value> {
    let avatar = state.avatar(call.this)?;
    match call.method {
        "owner" => Ok(Value::Address(avatar.owner)),
        "nativeToken" => Ok(Value::Address(avatar.native_token)),
        "orgName" => Ok(Value::Str(avatar.name.clone())),
        "reputationSupply" => Ok(Value::Uint(avatar.reputation_supply)),
        _ => Err(call.unknown("Avatar")),
    }
}

#[derive(Debug, Clone, Copy)]
struct SchemeEntry {
    params: ParamsHash,
    permissions: PermissionFlags,
}

/// Scheme table of one organization.
#[derive(Debug)]
pub(super) struct Controller {
    avatar: Address,
    schemes: HashMap<Address, SchemeEntry>,
}

impl Controller {
    fn require_avatar(&self, avatar: Address) -> GatewayResult<()> {
        require(avatar == self.avatar, "controller does not own this avatar")
    }

    fn require_permission(&self, caller: Address, needed: PermissionFlags) -> GatewayResult<PermissionFlags> {
        let granted = self
            .schemes
            .get(&caller)
            .map_or(PermissionFlags::NONE, |entry| entry.permissions);
        require(
            granted.contains(needed),
            format!("caller {caller} lacks permission {needed}"),
        )?;
        Ok(granted)
    }
}

pub(super) fn controller_call(state: &mut ChainState, call: &Call<'_>) -> GatewayResult<Value> {
    let args = call.args;
    if call.method == "genericCall" {
        return generic_call(state, call);
    }

    let controller = state.controller_mut(call.this)?;
    match call.method {
        "registerScheme" => {
            let scheme = args.address(0)?;
            let params = args.hash(1)?;
            let requested = args.flags(2)? | PermissionFlags::REGISTERED;
            controller.require_avatar(args.address(3)?)?;
            let granted = controller.require_permission(call.sender, PermissionFlags::REGISTER_SCHEMES)?;
            let grantable = granted | PermissionFlags::REGISTERED;
            require(
                requested & grantable == requested,
                format!("cannot grant {requested} with {granted}"),
            )?;
            controller.schemes.insert(
                scheme,
                SchemeEntry {
                    params,
                    permissions: requested,
                },
            );
            Ok(Value::Bool(true))
        }
        "unregisterScheme" => {
            let scheme = args.address(0)?;
            controller.require_avatar(args.address(1)?)?;
            controller.require_permission(call.sender, PermissionFlags::REGISTER_SCHEMES)?;
            require(controller.schemes.remove(&scheme).is_some(), "scheme is not registered")?;
            Ok(Value::Bool(true))
        }
        "isSchemeRegistered" => {
            let scheme = args.address(0)?;
            controller.require_avatar(args.address(1)?)?;
            Ok(Value::Bool(controller.schemes.contains_key(&scheme)))
        }
        "getSchemePermissions" => {
            let scheme = args.address(0)?;
            controller.require_avatar(args.address(1)?)?;
            Ok(Value::Flags(
                controller
                    .schemes
                    .get(&scheme)
                    .map_or(PermissionFlags::NONE, |entry| entry.permissions),
            ))
        }
        "getSchemeParameters" => {
            let scheme = args.address(0)?;
            controller.require_avatar(args.address(1)?)?;
            Ok(Value::Hash(
                controller
                    .schemes
                    .get(&scheme)
                    .map_or(ParamsHash::ZERO, |entry| entry.params),
            ))
        }
        _ => Err(call.unknown("Controller")),
    }
}

fn generic_call(state: &mut ChainState, call: &Call<'_>) -> GatewayResult<Value> {
    let args = call.args;
    let target = args.address(0)?;
    let payload = args.bytes(1)?;
    let avatar = args.address(2)?;
    let _value = args.uint(3)?;

    let controller = state.controller(call.this)?;
    controller.require_avatar(avatar)?;
    controller.require_permission(call.sender, PermissionFlags::GENERIC_CALL)?;

    let inner = EncodedCall::decode(payload)
        .map_err(|e| GatewayError::revert(format!("malformed call payload: {e}")))?;
    state
        .execute(avatar, target, &inner.method, &inner.args)
        .map_err(|e| GatewayError::revert(format!("generic call failed: {}", e.reason())))
}

impl ChainState {
    /// Permissions of `scheme` on the organization owning `avatar`.
    pub(super) fn scheme_permissions(&self, avatar: Address, scheme: Address) -> Option<PermissionFlags> {
        let controller = self.avatar(avatar).ok()?.owner;
        self.controller(controller)
            .ok()?
            .schemes
            .get(&scheme)
            .map(|entry| entry.permissions)
    }

    /// Reverts unless `scheme` is registered on `avatar`'s controller.
    pub(super) fn require_scheme(&self, avatar: Address, scheme: Address) -> GatewayResult<()> {
        require(
            self.scheme_permissions(avatar, scheme).is_some(),
            "not a registered scheme",
        )
    }

    /// Native token of the organization owning `avatar`.
    pub(super) fn native_token_of(&self, avatar: Address) -> GatewayResult<Address> {
        Ok(self.avatar(avatar)?.native_token)
    }

    /// Moves `amount` of `token` between two accounts.
    pub(super) fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> GatewayResult<()> {
        self.token_mut(token)?.move_balance(from, to, amount)
    }
}
