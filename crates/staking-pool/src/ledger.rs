//! Per-pool balances, the active weight distribution and in-flight reservations.
//!
//! Funds leave a pool in two steps. [`PoolLedger::reserve`] moves an allotment out of the
//! spendable balance into a reservation keyed by the candidate it funds; the reservation is then
//! either [forwarded](PoolLedger::forward) once the deposit contract accepted it or
//! [released](PoolLedger::release) back into the pool.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::{
    error::{Result, StakingPoolError},
    types::{CandidateId, PoolId},
};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Percentage of each deposit routed to a pool.
pub const MAX_TOTAL_WEIGHT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEventKind {
    /// A deposit share was added to the pool.
    Credited,
    /// An allotment was set aside for a validator deposit.
    Reserved,
    /// A reservation went back into the pool after a failed or cancelled deposit.
    Released,
    /// A reservation was sent to the deposit contract.
    Forwarded,
}

/// Balance change published to ledger subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub pool: PoolId,
    pub kind: LedgerEventKind,
    pub amount: U256,
    /// Spendable balance of the pool after the change.
    pub balance: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool {
    pub id: PoolId,
    pub name: String,
    /// On-chain identity the pool uses when calling the validator registry.
    pub address: Address,
    balance: U256,
    reserved: U256,
}

impl Pool {
    pub fn new(id: PoolId, name: impl Into<String>, address: Address) -> Self {
        Self {
            id,
            name: name.into(),
            address,
            balance: U256::ZERO,
            reserved: U256::ZERO,
        }
    }

    /// Spendable balance.
    pub const fn balance(&self) -> U256 {
        self.balance
    }

    /// Amount held back for deposits still in flight.
    pub const fn reserved(&self) -> U256 {
        self.reserved
    }
}

/// Validated mapping of pool to percentage. Pools missing from the map have weight zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeightDistribution(BTreeMap<PoolId, u8>);

impl WeightDistribution {
    /// Builds a distribution, rejecting repeated pools and totals above 100.
    pub fn new(entries: impl IntoIterator<Item = (PoolId, u8)>) -> Result<Self> {
        let mut weights = BTreeMap::new();
        let mut total = 0u32;
        let mut repeated = false;
        for (pool, weight) in entries {
            total += u32::from(weight);
            repeated |= weights.insert(pool, weight).is_some();
        }

        if repeated || total > MAX_TOTAL_WEIGHT {
            return Err(StakingPoolError::InvalidWeight { total });
        }
        Ok(Self(weights))
    }

    pub fn total(&self) -> u32 {
        self.0.values().map(|w| u32::from(*w)).sum()
    }

    pub fn weight(&self, pool: PoolId) -> u8 {
        self.0.get(&pool).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PoolId, u8)> + '_ {
        self.0.iter().map(|(pool, weight)| (*pool, *weight))
    }

    /// Pool receiving rounding dust and any unweighted share: highest weight, lowest id on ties.
    pub fn primary(&self) -> Option<PoolId> {
        self.iter()
            .filter(|(_, weight)| *weight > 0)
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(pool, _)| pool)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Reservation {
    pool: PoolId,
    amount: U256,
}

#[derive(Debug)]
pub struct PoolLedger {
    pools: BTreeMap<PoolId, Pool>,
    weights: WeightDistribution,
    reservations: HashMap<CandidateId, Reservation>,
    forwarded: U256,
    events: broadcast::Sender<LedgerEvent>,
}

impl PoolLedger {
    pub fn new(pools: impl IntoIterator<Item = Pool>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            pools: pools.into_iter().map(|pool| (pool.id, pool)).collect(),
            weights: WeightDistribution::default(),
            reservations: HashMap::new(),
            forwarded: U256::ZERO,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    pub fn pool(&self, id: PoolId) -> Result<&Pool> {
        self.pools.get(&id).ok_or(StakingPoolError::UnknownPool(id))
    }

    fn pool_mut(&mut self, id: PoolId) -> Result<&mut Pool> {
        self.pools.get_mut(&id).ok_or(StakingPoolError::UnknownPool(id))
    }

    pub fn pools(&self) -> impl Iterator<Item = &Pool> {
        self.pools.values()
    }

    pub const fn weights(&self) -> &WeightDistribution {
        &self.weights
    }

    /// Replaces the active distribution. Nothing changes if any pool is unknown.
    pub fn set_weights(&mut self, weights: WeightDistribution) -> Result<()> {
        if let Some((pool, _)) = weights.iter().find(|(pool, _)| !self.pools.contains_key(pool)) {
            return Err(StakingPoolError::UnknownPool(pool));
        }
        debug!(total = weights.total(), "Pool weights replaced");
        self.weights = weights;
        Ok(())
    }

    pub fn balance(&self, id: PoolId) -> Result<U256> {
        Ok(self.pool(id)?.balance)
    }

    pub fn reserved(&self, id: PoolId) -> Result<U256> {
        Ok(self.pool(id)?.reserved)
    }

    /// Spendable plus reserved funds across all pools.
    pub fn total_pooled(&self) -> U256 {
        self.pools
            .values()
            .fold(U256::ZERO, |acc, pool| acc + pool.balance + pool.reserved)
    }

    /// Total sent to the deposit contract so far.
    pub const fn forwarded(&self) -> U256 {
        self.forwarded
    }

    /// Fails exactly when [`credit`](Self::credit) would, without changing anything.
    pub fn ensure_creditable(&self, id: PoolId, amount: U256) -> Result<()> {
        if amount.is_zero() {
            return Err(StakingPoolError::InvalidAmount(amount));
        }
        self.pool(id)?
            .balance
            .checked_add(amount)
            .map(|_| ())
            .ok_or(StakingPoolError::InvalidAmount(amount))
    }

    pub fn credit(&mut self, id: PoolId, amount: U256) -> Result<U256> {
        if amount.is_zero() {
            return Err(StakingPoolError::InvalidAmount(amount));
        }
        let pool = self.pool_mut(id)?;
        pool.balance = pool
            .balance
            .checked_add(amount)
            .ok_or(StakingPoolError::InvalidAmount(amount))?;
        let balance = pool.balance;

        trace!(pool = %id, %amount, %balance, "Pool credited");
        self.publish(id, LedgerEventKind::Credited, amount, balance);
        Ok(balance)
    }

    pub fn debit(&mut self, id: PoolId, amount: U256) -> Result<U256> {
        let pool = self.pool_mut(id)?;
        if amount > pool.balance {
            return Err(StakingPoolError::InsufficientBalance {
                pool: id,
                available: pool.balance,
                required: amount,
            });
        }
        pool.balance -= amount;
        Ok(pool.balance)
    }

    /// Debits `amount` from the pool and holds it for `candidate` until forwarded or released.
    pub fn reserve(&mut self, id: PoolId, candidate: CandidateId, amount: U256) -> Result<U256> {
        if self.reservations.contains_key(&candidate) {
            return Err(StakingPoolError::InvalidTransition(candidate));
        }
        let balance = self.debit(id, amount)?;
        self.pool_mut(id)?.reserved += amount;
        self.reservations
            .insert(candidate, Reservation { pool: id, amount });

        debug!(pool = %id, %candidate, %amount, %balance, "Allotment reserved");
        self.publish(id, LedgerEventKind::Reserved, amount, balance);
        Ok(balance)
    }

    pub fn is_reserved(&self, candidate: CandidateId) -> bool {
        self.reservations.contains_key(&candidate)
    }

    /// Settles a reservation whose deposit succeeded. The funds leave the ledger.
    pub fn forward(&mut self, candidate: CandidateId) -> Result<U256> {
        let Reservation { pool, amount } = self
            .reservations
            .remove(&candidate)
            .ok_or(StakingPoolError::CandidateNotFound(candidate))?;

        let entry = self.pool_mut(pool)?;
        entry.reserved -= amount;
        let balance = entry.balance;
        self.forwarded += amount;

        debug!(%pool, %candidate, %amount, "Allotment forwarded");
        self.publish(pool, LedgerEventKind::Forwarded, amount, balance);
        Ok(amount)
    }

    /// Returns a reservation to the spendable balance of its pool.
    pub fn release(&mut self, candidate: CandidateId) -> Result<U256> {
        let Reservation { pool, amount } = self
            .reservations
            .remove(&candidate)
            .ok_or(StakingPoolError::CandidateNotFound(candidate))?;

        let entry = self.pool_mut(pool)?;
        entry.reserved -= amount;
        entry.balance += amount;
        let balance = entry.balance;

        debug!(%pool, %candidate, %amount, %balance, "Reservation released");
        self.publish(pool, LedgerEventKind::Released, amount, balance);
        Ok(balance)
    }

    fn publish(&self, pool: PoolId, kind: LedgerEventKind, amount: U256, balance: U256) {
        // No receivers is fine.
        let _ = self.events.send(LedgerEvent {
            pool,
            kind,
            amount,
            balance,
        });
    }
}
