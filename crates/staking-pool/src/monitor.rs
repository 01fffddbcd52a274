//! Read-only view of how many validators each pool can fund.

use alloy::primitives::U256;

use crate::{
    error::Result,
    ledger::PoolLedger,
    types::{ALLOTMENT, PoolId},
};

/// Number of complete allotments in `balance`.
pub fn allotments_in(balance: U256) -> u64 {
    (balance / ALLOTMENT).saturating_to()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FundingMonitor;

impl FundingMonitor {
    /// `floor(balance / 32 ETH)` for the spendable balance of `pool`.
    ///
    /// Funds reserved for in-flight deposits are not counted.
    pub fn available_allotments(ledger: &PoolLedger, pool: PoolId) -> Result<u64> {
        Ok(allotments_in(ledger.balance(pool)?))
    }

    /// Pools with at least one allotment available, in id order.
    pub fn funded_pools(ledger: &PoolLedger) -> Vec<(PoolId, u64)> {
        ledger
            .pools()
            .map(|pool| (pool.id, allotments_in(pool.balance())))
            .filter(|(_, allotments)| *allotments > 0)
            .collect()
    }
}
