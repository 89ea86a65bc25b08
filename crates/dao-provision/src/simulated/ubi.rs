//! First-claim pool and UBI scheme.

use std::collections::HashMap;

use super::{Args, Call, ChainState, SECONDS_PER_DAY, require};
use crate::gateway::{GatewayError, GatewayResult};
use crate::types::{Address, Value};

/// One-time bonus pool.
#[derive(Debug)]
pub(super) struct FirstClaimPool {
    avatar: Address,
    claim_amount: u128,
    started: bool,
}

impl FirstClaimPool {
    pub(super) fn construct(state: &ChainState, args: Args<'_>) -> GatewayResult<Self> {
        let avatar = args.address(0)?;
        state.avatar(avatar)?;
        state.identity(args.address(1)?)?;
        Ok(Self {
            avatar,
            claim_amount: args.uint(2)?,
            started: false,
        })
    }
}

impl ChainState {
    fn native_balance(&self, avatar: Address, account: Address) -> GatewayResult<u128> {
        let native = self.native_token_of(avatar)?;
        Ok(self.token(native)?.balance_of(account))
    }
}

pub(super) fn first_claim_pool_call(state: &mut ChainState, call: &Call<'_>) -> GatewayResult<Value> {
    match call.method {
        "start" => {
            let pool = state.first_claim_pool(call.this)?;
            require(!pool.started, "pool already started")?;
            let avatar = pool.avatar;
            state.require_scheme(avatar, call.this)?;
            require(
                state.native_balance(avatar, call.this)? > 0,
                "pool has no funds",
            )?;
            state.first_claim_pool_mut(call.this)?.started = true;
            Ok(Value::Unit)
        }
        "isStarted" => Ok(Value::Bool(state.first_claim_pool(call.this)?.started)),
        "claimAmount" => Ok(Value::Uint(state.first_claim_pool(call.this)?.claim_amount)),
        _ => Err(call.unknown("FirstClaimPool")),
    }
}

/// Periodic claim scheme.
#[derive(Debug)]
pub(super) struct UbiScheme {
    avatar: Address,
    identity: Address,
    first_claim_pool: Address,
    period_start: u64,
    period_end: u64,
    cycle_length_days: u128,
    claim_distribution_fraction: u128,
    started: bool,
    /// Day index (since period start) of each account's last claim
    last_claim_day: HashMap<Address, u64>,
}

impl UbiScheme {
    pub(super) fn construct(state: &ChainState, args: Args<'_>) -> GatewayResult<Self> {
        let avatar = args.address(0)?;
        state.avatar(avatar)?;
        let identity = args.address(1)?;
        state.identity(identity)?;
        let first_claim_pool = args.address(2)?;
        state.first_claim_pool(first_claim_pool)?;
        let period_start = args.u64(3)?;
        let period_end = args.u64(4)?;
        require(period_end >= period_start, "period end precedes period start")?;
        let cycle_length_days = args.uint(5)?;
        let claim_distribution_fraction = args.uint(6)?;
        require(
            cycle_length_days > 0 && claim_distribution_fraction > 0,
            "cycle length and distribution fraction must be non-zero",
        )?;
        let scheme = Self {
            avatar,
            identity,
            first_claim_pool,
            period_start,
            period_end,
            cycle_length_days,
            claim_distribution_fraction,
            started: false,
            last_claim_day: HashMap::new(),
        };
        scheme.claim_divisor()?;
        Ok(scheme)
    }

    /// Share of the scheme balance paid per daily claim, as a divisor.
    fn claim_divisor(&self) -> GatewayResult<u128> {
        self.cycle_length_days
            .checked_mul(self.claim_distribution_fraction)
            .ok_or_else(|| {
                GatewayError::revert("cycle length times distribution fraction overflows")
            })
    }

    fn day(&self, now: u64) -> u64 {
        now.saturating_sub(self.period_start) / SECONDS_PER_DAY
    }
}

/// Amount `account` may claim now, and whether it comes from the first-claim pool.
fn entitlement(state: &ChainState, this: Address, account: Address) -> GatewayResult<(u128, bool)> {
    let scheme = state.ubi_scheme(this)?;
    match scheme.last_claim_day.get(&account) {
        None => {
            let pool = state.first_claim_pool(scheme.first_claim_pool)?;
            let balance = state.native_balance(scheme.avatar, scheme.first_claim_pool)?;
            Ok((pool.claim_amount.min(balance), true))
        }
        Some(day) if *day >= scheme.day(state.now) => Ok((0, false)),
        Some(_) => {
            let cap = state.first_claim_pool(scheme.first_claim_pool)?.claim_amount;
            let balance = state.native_balance(scheme.avatar, this)?;
            let per_claim = balance / scheme.claim_divisor()?;
            Ok((per_claim.min(cap), false))
        }
    }
}

pub(super) fn ubi_scheme_call(state: &mut ChainState, call: &Call<'_>) -> GatewayResult<Value> {
    match call.method {
        "start" => {
            let scheme = state.ubi_scheme(call.this)?;
            require(!scheme.started, "ubi scheme already started")?;
            let avatar = scheme.avatar;
            state.require_scheme(avatar, call.this)?;
            require(
                state.native_balance(avatar, call.this)? > 0,
                "ubi scheme has no funds",
            )?;
            state.ubi_scheme_mut(call.this)?.started = true;
            Ok(Value::Unit)
        }
        "claim" => claim(state, call),
        "checkEntitlement" => {
            let account = call.args.address(0)?;
            Ok(Value::Uint(entitlement(state, call.this, account)?.0))
        }
        "isStarted" => Ok(Value::Bool(state.ubi_scheme(call.this)?.started)),
        "periodStart" => Ok(Value::Uint(u128::from(state.ubi_scheme(call.this)?.period_start))),
        "periodEnd" => Ok(Value::Uint(u128::from(state.ubi_scheme(call.this)?.period_end))),
        _ => Err(call.unknown("UBIScheme")),
    }
}

fn claim(state: &mut ChainState, call: &Call<'_>) -> GatewayResult<Value> {
    let scheme = state.ubi_scheme(call.this)?;
    require(scheme.started, "ubi scheme is not started")?;
    require(
        (scheme.period_start..=scheme.period_end).contains(&state.now),
        "not in claim period",
    )?;
    require(
        state.identity(scheme.identity)?.is_whitelisted(call.sender),
        "caller is not whitelisted",
    )?;
    let (avatar, pool, day) = (scheme.avatar, scheme.first_claim_pool, scheme.day(state.now));

    if let Some(last) = scheme.last_claim_day.get(&call.sender) {
        require(*last < day, "already claimed today")?;
    }
    let (amount, first) = entitlement(state, call.this, call.sender)?;
    if first {
        require(
            state.first_claim_pool(pool)?.started,
            "first claim pool is not started",
        )?;
    }

    let native = state.native_token_of(avatar)?;
    let source = if first { pool } else { call.this };
    state.transfer(native, source, call.sender, amount)?;
    state
        .ubi_scheme_mut(call.this)?
        .last_claim_day
        .insert(call.sender, day);
    Ok(Value::Uint(amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_index_counts_from_period_start() {
        let scheme = UbiScheme {
            avatar: Address::ZERO,
            identity: Address::ZERO,
            first_claim_pool: Address::ZERO,
            period_start: 1_000,
            period_end: 1_000 + 10 * SECONDS_PER_DAY,
            cycle_length_days: 14,
            claim_distribution_fraction: 7,
            started: true,
            last_claim_day: HashMap::new(),
        };
        assert_eq!(scheme.day(500), 0);
        assert_eq!(scheme.day(1_000 + SECONDS_PER_DAY - 1), 0);
        assert_eq!(scheme.day(1_000 + SECONDS_PER_DAY), 1);
    }

    #[test]
    fn overflowing_claim_divisor_reverts() {
        let scheme = UbiScheme {
            avatar: Address::ZERO,
            identity: Address::ZERO,
            first_claim_pool: Address::ZERO,
            period_start: 0,
            period_end: SECONDS_PER_DAY,
            cycle_length_days: 1 << 64,
            claim_distribution_fraction: 1 << 64,
            started: true,
            last_claim_day: HashMap::new(),
        };
        assert!(matches!(scheme.claim_divisor(), Err(GatewayError::Revert { .. })));
    }

    #[test]
    fn unknown_pool_is_rejected_at_construction() {
        let state = ChainState {
            now: 0,
            nonces: HashMap::new(),
            units: HashMap::new(),
        };
        let values = [Value::Address(Address::ZERO)];
        let result = UbiScheme::construct(&state, Args::new("UBIScheme", &values));
        assert!(matches!(result, Err(GatewayError::Revert { .. })));
    }
}
