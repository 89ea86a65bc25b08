//! Voting machine and proposal schemes.

use std::collections::HashMap;

use super::{Call, ChainState, require};
use crate::gateway::{GatewayError, GatewayResult};
use crate::params::{
    scheme_registrar_parameters_hash, upgrade_parameters_hash, vote_parameters_hash,
};
use crate::types::{Address, ParamsHash, Value};

#[derive(Debug, Clone, Copy)]
struct VoteParameters {
    quorum_percent: u32,
}

/// Absolute-vote voting machine.
#[derive(Debug, Default)]
pub(super) struct VotingMachine {
    parameters: HashMap<ParamsHash, VoteParameters>,
}

impl VotingMachine {
    fn has_parameters(&self, hash: ParamsHash) -> bool {
        self.parameters.contains_key(&hash)
    }
}

pub(super) fn voting_machine_call(state: &mut ChainState, call: &Call<'_>) -> GatewayResult<Value> {
    let args = call.args;
    match call.method {
        "getParametersHash" => Ok(Value::Hash(vote_parameters_hash(
            args.u32(0)?,
            args.address(1)?,
        ))),
        "setParameters" => {
            let quorum_percent = args.u32(0)?;
            let reputation = args.address(1)?;
            require(
                (1..=100).contains(&quorum_percent),
                "quorum must be between 1 and 100",
            )?;
            require(
                reputation.is_zero() || state.is_unit(reputation),
                format!("reputation system {reputation} is not deployed"),
            )?;
            let hash = vote_parameters_hash(quorum_percent, reputation);
            state
                .voting_machine_mut(call.this)?
                .parameters
                .insert(hash, VoteParameters { quorum_percent });
            Ok(Value::Hash(hash))
        }
        "quorum" => state
            .voting_machine(call.this)?
            .parameters
            .get(&args.hash(0)?)
            .map(|p| Value::Uint(u128::from(p.quorum_percent)))
            .ok_or_else(|| GatewayError::revert("unknown vote parameters")),
        "hasParameters" => Ok(Value::Bool(
            state.voting_machine(call.this)?.has_parameters(args.hash(0)?),
        )),
        _ => Err(call.unknown("AbsoluteVote")),
    }
}

#[derive(Debug, Clone, Copy)]
struct ProposalParameters {
    vote_params: ParamsHash,
}

/// Parameter table shared by the scheme registrar and the upgrade scheme.
#[derive(Debug, Default)]
pub(super) struct ProposalScheme {
    parameters: HashMap<ParamsHash, ProposalParameters>,
}

fn proposal_lookup(state: &ChainState, this: Address, hash: ParamsHash) -> GatewayResult<Value> {
    let table = match state.units.get(&this) {
        Some(super::Unit::SchemeRegistrar(s) | super::Unit::UpgradeScheme(s)) => s,
        _ => return Err(GatewayError::revert(format!("no proposal scheme at {this}"))),
    };
    table
        .parameters
        .get(&hash)
        .map(|p| Value::Hash(p.vote_params))
        .ok_or_else(|| GatewayError::revert("unknown scheme parameters"))
}

fn proposal_store(state: &mut ChainState, this: Address, hash: ParamsHash, vote_params: ParamsHash) {
    if let Some(super::Unit::SchemeRegistrar(s) | super::Unit::UpgradeScheme(s)) =
        state.units.get_mut(&this)
    {
        s.parameters.insert(hash, ProposalParameters { vote_params });
    }
}

pub(super) fn scheme_registrar_call(state: &mut ChainState, call: &Call<'_>) -> GatewayResult<Value> {
    let args = call.args;
    match call.method {
        "getParametersHash" => Ok(Value::Hash(scheme_registrar_parameters_hash(
            args.hash(0)?,
            args.hash(1)?,
            args.address(2)?,
        ))),
        "setParameters" => {
            let register = args.hash(0)?;
            let remove = args.hash(1)?;
            let voting_machine = args.address(2)?;
            state.voting_machine(voting_machine)?;
            let hash = scheme_registrar_parameters_hash(register, remove, voting_machine);
            proposal_store(state, call.this, hash, register);
            Ok(Value::Hash(hash))
        }
        "votingParameters" => proposal_lookup(state, call.this, args.hash(0)?),
        _ => Err(call.unknown("SchemeRegistrar")),
    }
}

pub(super) fn upgrade_scheme_call(state: &mut ChainState, call: &Call<'_>) -> GatewayResult<Value> {
    let args = call.args;
    match call.method {
        "getParametersHash" => Ok(Value::Hash(upgrade_parameters_hash(
            args.hash(0)?,
            args.address(1)?,
        ))),
        "setParameters" => {
            let vote_params = args.hash(0)?;
            let voting_machine = args.address(1)?;
            state.voting_machine(voting_machine)?;
            let hash = upgrade_parameters_hash(vote_params, voting_machine);
            proposal_store(state, call.this, hash, vote_params);
            Ok(Value::Hash(hash))
        }
        "votingParameters" => proposal_lookup(state, call.this, args.hash(0)?),
        _ => Err(call.unknown("UpgradeScheme")),
    }
}
