//! Economic units: contribution, fund manager, market maker, reserve, staking.

use std::collections::HashMap;

use super::{Args, Call, ChainState, Unit, require};
use crate::config::FULL_RESERVE_RATIO;
use crate::gateway::{GatewayError, GatewayResult};
use crate::types::{Address, Value};

fn require_unit(state: &ChainState, address: Address, label: &str) -> GatewayResult<()> {
    match state.units.get(&address) {
        Some(unit) if unit.label() == label => Ok(()),
        Some(unit) => Err(GatewayError::revert(format!(
            "{address} is a {}, not a {label}",
            unit.label()
        ))),
        None => Err(GatewayError::revert(format!("no unit at {address}"))),
    }
}

/// Contribution calculation.
#[derive(Debug)]
pub(super) struct Contribution {
    avatar: Address,
    numerator: u128,
    denominator: u128,
}

impl Contribution {
    pub(super) fn construct(state: &ChainState, args: Args<'_>) -> GatewayResult<Self> {
        let avatar = args.address(0)?;
        state.avatar(avatar)?;
        let denominator = args.uint(2)?;
        require(denominator > 0, "contribution denominator is zero")?;
        Ok(Self {
            avatar,
            numerator: args.uint(1)?,
            denominator,
        })
    }
}

pub(super) fn contribution_call(state: &mut ChainState, call: &Call<'_>) -> GatewayResult<Value> {
    let Some(Unit::Contribution(contribution)) = state.units.get(&call.this) else {
        return Err(GatewayError::revert(format!("no contribution unit at {}", call.this)));
    };
    match call.method {
        "avatar" => Ok(Value::Address(contribution.avatar)),
        "calculateContribution" => {
            let amount = call.args.uint(0)?;
            Ok(Value::Uint(
                amount.saturating_mul(contribution.numerator) / contribution.denominator,
            ))
        }
        _ => Err(call.unknown("ContributionCalculation")),
    }
}

/// Yield-harvesting fund manager.
#[derive(Debug)]
pub(super) struct FundManager {
    avatar: Address,
    yield_token: Address,
    ubi_recipient: Address,
    started: bool,
}

impl FundManager {
    pub(super) fn construct(state: &ChainState, args: Args<'_>) -> GatewayResult<Self> {
        let avatar = args.address(0)?;
        state.avatar(avatar)?;
        state.identity(args.address(1)?)?;
        let yield_token = args.address(2)?;
        state.token(yield_token)?;
        let _bridge = args.address(3)?;
        let ubi_recipient = args.address(4)?;
        let _block_interval = args.uint(5)?;
        Ok(Self {
            avatar,
            yield_token,
            ubi_recipient,
            started: false,
        })
    }
}

pub(super) fn fund_manager_call(state: &mut ChainState, call: &Call<'_>) -> GatewayResult<Value> {
    match call.method {
        "start" => {
            let avatar = state.fund_manager(call.this)?.avatar;
            state.require_scheme(avatar, call.this)?;
            let manager = state.fund_manager_mut(call.this)?;
            require(!manager.started, "fund manager already started")?;
            manager.started = true;
            Ok(Value::Unit)
        }
        "isStarted" => Ok(Value::Bool(state.fund_manager(call.this)?.started)),
        "avatar" => Ok(Value::Address(state.fund_manager(call.this)?.avatar)),
        "cDai" => Ok(Value::Address(state.fund_manager(call.this)?.yield_token)),
        "ubiRecipient" => Ok(Value::Address(state.fund_manager(call.this)?.ubi_recipient)),
        _ => Err(call.unknown("FundManager")),
    }
}

/// Curve state of one reserve token.
#[derive(Debug, Clone, Copy)]
struct Curve {
    gd_supply: u128,
    reserve_supply: u128,
    reserve_ratio: u128,
}

impl Curve {
    /// Native token returned for `amount` of reserve token.
    fn buy_return(&self, amount: u128) -> GatewayResult<u128> {
        let overflow = || GatewayError::revert("curve arithmetic overflow");
        let numerator = amount
            .checked_mul(self.gd_supply)
            .and_then(|v| v.checked_mul(u128::from(FULL_RESERVE_RATIO)))
            .ok_or_else(overflow)?;
        let denominator = self
            .reserve_supply
            .checked_mul(self.reserve_ratio)
            .ok_or_else(overflow)?;
        require(denominator > 0, "empty reserve")?;
        Ok(numerator / denominator)
    }
}

/// Bonding-curve pricing state.
#[derive(Debug)]
pub(super) struct MarketMaker {
    avatar: Address,
    owner: Address,
    curves: HashMap<Address, Curve>,
}

impl MarketMaker {
    pub(super) fn construct(state: &ChainState, from: Address, args: Args<'_>) -> GatewayResult<Self> {
        let avatar = args.address(0)?;
        state.avatar(avatar)?;
        let _numerator = args.uint(1)?;
        require(args.uint(2)? > 0, "market maker denominator is zero")?;
        Ok(Self {
            avatar,
            owner: from,
            curves: HashMap::new(),
        })
    }

    pub(super) fn is_initialized(&self, token: Address) -> bool {
        self.curves.contains_key(&token)
    }
}

pub(super) fn market_maker_call(state: &mut ChainState, call: &Call<'_>) -> GatewayResult<Value> {
    let args = call.args;
    if call.method == "initializeToken" {
        let maker = state.market_maker(call.this)?;
        require(call.sender == maker.avatar, "only the avatar can initialize tokens")?;
        let owned_by_reserve = state
            .reserve(maker.owner)
            .is_ok_and(|reserve| reserve.market_maker == call.this);
        require(owned_by_reserve, "ownership not transferred to reserve")?;

        let token = args.address(0)?;
        let gd_supply = args.uint(1)?;
        let reserve_supply = args.uint(2)?;
        let reserve_ratio = args.uint(3)?;
        require(
            (1..=u128::from(FULL_RESERVE_RATIO)).contains(&reserve_ratio),
            "reserve ratio out of range",
        )?;
        require(gd_supply > 0 && reserve_supply > 0, "reserve supplies must be non-zero")?;
        state.token(token)?;

        state.market_maker_mut(call.this)?.curves.insert(
            token,
            Curve {
                gd_supply,
                reserve_supply,
                reserve_ratio,
            },
        );
        return Ok(Value::Unit);
    }

    let maker = state.market_maker_mut(call.this)?;
    match call.method {
        "owner" => Ok(Value::Address(maker.owner)),
        "avatar" => Ok(Value::Address(maker.avatar)),
        "transferOwnership" => {
            require(call.sender == maker.owner, "caller is not the owner")?;
            let new_owner = args.address(0)?;
            require(!new_owner.is_zero(), "new owner is the zero address")?;
            maker.owner = new_owner;
            Ok(Value::Unit)
        }
        "isInitialized" => Ok(Value::Bool(maker.is_initialized(args.address(0)?))),
        "reserveRatio" => {
            let token = args.address(0)?;
            maker
                .curves
                .get(&token)
                .map(|curve| Value::Uint(curve.reserve_ratio))
                .ok_or_else(|| GatewayError::revert("reserve token not initialized"))
        }
        "buyReturn" => {
            let curve = maker
                .curves
                .get(&args.address(0)?)
                .ok_or_else(|| GatewayError::revert("reserve token not initialized"))?;
            Ok(Value::Uint(curve.buy_return(args.uint(1)?)?))
        }
        "buy" => {
            require(call.sender == maker.owner, "caller is not the owner")?;
            let token = args.address(0)?;
            let amount = args.uint(1)?;
            let curve = maker
                .curves
                .get_mut(&token)
                .ok_or_else(|| GatewayError::revert("reserve token not initialized"))?;
            let returned = curve.buy_return(amount)?;
            curve.reserve_supply = curve.reserve_supply.saturating_add(amount);
            curve.gd_supply = curve.gd_supply.saturating_add(returned);
            Ok(Value::Uint(returned))
        }
        _ => Err(call.unknown("MarketMaker")),
    }
}

/// Bonding-curve reserve.
#[derive(Debug)]
pub(super) struct Reserve {
    yield_token: Address,
    avatar: Address,
    market_maker: Address,
    contribution: Address,
    started: bool,
}

impl Reserve {
    pub(super) fn construct(state: &ChainState, args: Args<'_>) -> GatewayResult<Self> {
        state.token(args.address(0)?)?;
        let yield_token = args.address(1)?;
        state.token(yield_token)?;
        state.fund_manager(args.address(2)?)?;
        let avatar = args.address(3)?;
        state.avatar(avatar)?;
        state.identity(args.address(4)?)?;
        let market_maker = args.address(5)?;
        state.market_maker(market_maker)?;
        let contribution = args.address(6)?;
        require_unit(state, contribution, "ContributionCalculation")?;
        let _block_interval = args.uint(7)?;
        Ok(Self {
            yield_token,
            avatar,
            market_maker,
            contribution,
            started: false,
        })
    }
}

pub(super) fn reserve_call(state: &mut ChainState, call: &Call<'_>) -> GatewayResult<Value> {
    match call.method {
        "start" => {
            let reserve = state.reserve(call.this)?;
            require(!reserve.started, "reserve already started")?;
            let (avatar, yield_token, market_maker) =
                (reserve.avatar, reserve.yield_token, reserve.market_maker);
            state.require_scheme(avatar, call.this)?;
            let maker = state.market_maker(market_maker)?;
            require(maker.owner == call.this, "reserve does not own the market maker")?;
            require(
                maker.is_initialized(yield_token),
                "reserve token not initialized on the market maker",
            )?;
            let native = state.native_token_of(avatar)?;
            require(
                state.token(native)?.is_minter(call.this),
                "reserve is not a native token minter",
            )?;
            state.reserve_mut(call.this)?.started = true;
            Ok(Value::Unit)
        }
        "buy" => reserve_buy(state, call),
        "isStarted" => Ok(Value::Bool(state.reserve(call.this)?.started)),
        "avatar" => Ok(Value::Address(state.reserve(call.this)?.avatar)),
        "marketMaker" => Ok(Value::Address(state.reserve(call.this)?.market_maker)),
        "contribution" => Ok(Value::Address(state.reserve(call.this)?.contribution)),
        _ => Err(call.unknown("Reserve")),
    }
}

/// Exchanges yield token for freshly minted native token along the curve.
fn reserve_buy(state: &mut ChainState, call: &Call<'_>) -> GatewayResult<Value> {
    let args = call.args;
    let token = args.address(0)?;
    let amount = args.uint(1)?;
    let min_return = args.uint(2)?;

    let reserve = state.reserve(call.this)?;
    require(reserve.started, "reserve is not started")?;
    require(token == reserve.yield_token, "unsupported reserve token")?;
    require(amount > 0, "buy amount is zero")?;
    let (avatar, market_maker) = (reserve.avatar, reserve.market_maker);
    require(
        state.token(token)?.balance_of(call.sender) >= amount,
        "buy amount exceeds balance",
    )?;

    let quote = state
        .market_maker(market_maker)?
        .curves
        .get(&token)
        .ok_or_else(|| GatewayError::revert("reserve token not initialized"))?
        .buy_return(amount)?;
    require(quote >= min_return, "buy return below minimum")?;

    let returned = market_maker_call(
        state,
        &Call {
            sender: call.this,
            this: market_maker,
            method: "buy",
            args: Args::new("buy", &[Value::Address(token), Value::Uint(amount)]),
        },
    )?
    .as_uint()
    .unwrap_or(quote);

    state.transfer(token, call.sender, call.this, amount)?;
    let native = state.native_token_of(avatar)?;
    state.token_mut(native)?.credit(call.sender, returned)?;
    Ok(Value::Uint(returned))
}

/// Collateral staking.
#[derive(Debug)]
pub(super) struct Staking {
    avatar: Address,
    fund_manager: Address,
    started: bool,
}

impl Staking {
    pub(super) fn construct(state: &ChainState, args: Args<'_>) -> GatewayResult<Self> {
        state.token(args.address(0)?)?;
        state.token(args.address(1)?)?;
        let fund_manager = args.address(2)?;
        state.fund_manager(fund_manager)?;
        let _block_interval = args.uint(3)?;
        let avatar = args.address(4)?;
        state.avatar(avatar)?;
        state.identity(args.address(5)?)?;
        Ok(Self {
            avatar,
            fund_manager,
            started: false,
        })
    }
}

pub(super) fn staking_call(state: &mut ChainState, call: &Call<'_>) -> GatewayResult<Value> {
    match call.method {
        "start" => {
            let avatar = state.staking(call.this)?.avatar;
            state.require_scheme(avatar, call.this)?;
            let staking = state.staking_mut(call.this)?;
            require(!staking.started, "staking already started")?;
            staking.started = true;
            Ok(Value::Unit)
        }
        "isStarted" => Ok(Value::Bool(state.staking(call.this)?.started)),
        "fundManager" => Ok(Value::Address(state.staking(call.this)?.fund_manager)),
        _ => Err(call.unknown("Staking")),
    }
}
