//! Core identifiers and amounts.

use alloy::primitives::{Address, B256, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One unit of the staking asset (1 ETH) in its base denomination.
pub const UNIT: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Number of units funding a single validator.
pub const ALLOTMENT_UNITS: u64 = 32;

/// Exactly 32 ETH, the amount forwarded to the deposit contract per validator.
pub const ALLOTMENT: U256 = U256::from_limbs([0xbc16_d674_ec80_0000, 1, 0, 0]);

/// Returns `n` whole units in base denomination.
pub fn units(n: u64) -> U256 {
    U256::from(n) * UNIT
}

/// Identifier of a sub-pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(pub u8);

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u8> for PoolId {
    fn from(id: u8) -> Self {
        Self(id)
    }
}

/// Identifier of a validator candidate, assigned sequentially by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub u64);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Deposit data for one validator, produced by the node operator.
///
/// The engine treats it as opaque and hands it to the deposit contract unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorCredentials {
    /// BLS public key (48 bytes).
    pub pubkey: Bytes,
    pub withdrawal_credentials: B256,
    /// BLS signature over the deposit message (96 bytes).
    pub signature: Bytes,
    pub deposit_data_root: B256,
}

/// A single credit to one pool, recorded by the deposit router.
///
/// A staker deposit split across several pools yields one record per pool, all sharing the
/// same `sequence`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    pub sequence: u64,
    pub staker: Address,
    pub pool: PoolId,
    pub amount: U256,
}
