//! Parameter hashes used as configuration lookup keys by voting units.
//!
//! Each function is pure. The voting machine and both proposal schemes
//! recompute the same hashes when queried, so these encodings are part of the
//! contract with those units: integers are 32-byte big-endian words, addresses
//! are their 20 raw bytes, hashes their 32 raw bytes.

use crate::types::{Address, ParamsHash};

fn word(value: u128) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[16..].copy_from_slice(&value.to_be_bytes());
    out
}

/// Hash of the voting machine's quorum configuration.
#[must_use]
pub fn vote_parameters_hash(quorum_percent: u32, reputation_system: Address) -> ParamsHash {
    ParamsHash::digest(&[
        &word(u128::from(quorum_percent)),
        reputation_system.as_bytes(),
    ])
}

/// Hash an upgrade scheme computes over its vote parameters and voting machine.
#[must_use]
pub fn upgrade_parameters_hash(vote_params: ParamsHash, voting_machine: Address) -> ParamsHash {
    ParamsHash::digest(&[vote_params.as_bytes(), voting_machine.as_bytes()])
}

/// Hash a scheme registrar computes over its register/remove vote parameters
/// and voting machine.
#[must_use]
pub fn scheme_registrar_parameters_hash(
    register_params: ParamsHash,
    remove_params: ParamsHash,
    voting_machine: Address,
) -> ParamsHash {
    ParamsHash::digest(&[
        register_params.as_bytes(),
        remove_params.as_bytes(),
        voting_machine.as_bytes(),
    ])
}
