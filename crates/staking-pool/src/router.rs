//! Splits staker deposits across pools according to the active weights.

use alloy::primitives::{Address, U256};
use std::collections::HashMap;
use tracing::debug;

use crate::{
    error::{Result, StakingPoolError},
    ledger::{MAX_TOTAL_WEIGHT, PoolLedger, WeightDistribution},
    types::{Deposit, PoolId},
};

/// Computes each pool's share of `amount`.
///
/// Every weighted pool receives `amount * weight / 100`, rounded down. Rounding dust and the
/// share left unassigned when weights total less than 100 go to the
/// [primary](WeightDistribution::primary) pool, so the shares always add up to `amount`.
/// Pools whose share rounds to zero are omitted.
pub fn allocate(weights: &WeightDistribution, amount: U256) -> Result<Vec<(PoolId, U256)>> {
    if amount.is_zero() {
        return Err(StakingPoolError::InvalidAmount(amount));
    }
    let primary = weights.primary().ok_or(StakingPoolError::NoRoutablePool)?;
    let denominator = U256::from(MAX_TOTAL_WEIGHT);

    let mut shares = Vec::new();
    let mut allocated = U256::ZERO;
    for (pool, weight) in weights.iter().filter(|(_, weight)| *weight > 0) {
        let share = amount
            .checked_mul(U256::from(weight))
            .ok_or(StakingPoolError::InvalidAmount(amount))?
            / denominator;
        allocated += share;
        shares.push((pool, share));
    }

    let remainder = amount - allocated;
    if let Some((_, share)) = shares.iter_mut().find(|(pool, _)| *pool == primary) {
        *share += remainder;
    }
    shares.retain(|(_, share)| !share.is_zero());
    Ok(shares)
}

/// Records every deposit and the running contribution of each staker.
#[derive(Debug, Default)]
pub struct DepositRouter {
    deposits: Vec<Deposit>,
    contributions: HashMap<Address, U256>,
    total_deposited: U256,
    next_sequence: u64,
}

impl DepositRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes a staker deposit into the ledger.
    ///
    /// The split is computed and checked against every pool before any is credited; a rejected
    /// deposit changes nothing.
    pub fn deposit(
        &mut self,
        ledger: &mut PoolLedger,
        staker: Address,
        amount: U256,
    ) -> Result<Vec<Deposit>> {
        let shares = allocate(ledger.weights(), amount)?;
        for (pool, share) in &shares {
            ledger.ensure_creditable(*pool, *share)?;
        }
        let total_deposited = self
            .total_deposited
            .checked_add(amount)
            .ok_or(StakingPoolError::InvalidAmount(amount))?;

        let sequence = self.next_sequence;
        let mut recorded = Vec::with_capacity(shares.len());
        for (pool, share) in shares {
            ledger.credit(pool, share)?;
            recorded.push(Deposit {
                sequence,
                staker,
                pool,
                amount: share,
            });
        }

        self.next_sequence += 1;
        self.total_deposited = total_deposited;
        *self.contributions.entry(staker).or_default() += amount;
        self.deposits.extend(recorded.iter().cloned());

        debug!(%staker, %amount, sequence, pools = recorded.len(), "Deposit routed");
        Ok(recorded)
    }

    pub fn deposits(&self) -> &[Deposit] {
        &self.deposits
    }

    pub fn contribution(&self, staker: Address) -> U256 {
        self.contributions.get(&staker).copied().unwrap_or_default()
    }

    pub const fn total_deposited(&self) -> U256 {
        self.total_deposited
    }
}
