//! Serializable point-in-time view of the engine.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::{
    orchestrator::EngineState,
    registry::ValidatorCandidate,
    types::PoolId,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSnapshot {
    pub id: PoolId,
    pub name: String,
    pub weight: u8,
    pub balance: U256,
    pub reserved: U256,
    pub queued_keys: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub pools: Vec<PoolSnapshot>,
    pub validator_count: u64,
    pub registered_validator_count: u64,
    pub total_deposited: U256,
    pub total_forwarded: U256,
    pub candidates: Vec<ValidatorCandidate>,
}

impl EngineSnapshot {
    pub(crate) fn capture(state: &EngineState) -> Self {
        let weights = state.ledger.weights();
        let pools = state
            .ledger
            .pools()
            .map(|pool| PoolSnapshot {
                id: pool.id,
                name: pool.name.clone(),
                weight: weights.weight(pool.id),
                balance: pool.balance(),
                reserved: pool.reserved(),
                queued_keys: state.registry.queued_keys(pool.id),
            })
            .collect();

        Self {
            pools,
            validator_count: state.registry.validator_count(),
            registered_validator_count: state.registry.registered_validator_count(),
            total_deposited: state.router.total_deposited(),
            total_forwarded: state.ledger.forwarded(),
            candidates: state.registry.candidates().cloned().collect(),
        }
    }

    /// Spendable plus reserved funds across all pools.
    pub fn total_pooled(&self) -> U256 {
        self.pools
            .iter()
            .fold(U256::ZERO, |acc, pool| acc + pool.balance + pool.reserved)
    }

    pub fn pool(&self, id: PoolId) -> Option<&PoolSnapshot> {
        self.pools.iter().find(|pool| pool.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_manager;
    use crate::types::units;
    use alloy::primitives::Address;

    #[test]
    fn test_snapshot_accounts_for_every_deposit() {
        let (manager, _) = test_manager();
        manager.deposit(Address::repeat_byte(1), units(10)).unwrap();
        manager.deposit(Address::repeat_byte(2), units(3)).unwrap();

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.total_deposited, units(13));
        assert_eq!(snapshot.total_pooled(), units(13));
        assert_eq!(snapshot.pool(PoolId(0)).unwrap().weight, 50);
        assert_eq!(snapshot.pool(PoolId(1)).unwrap().balance, units(13) / U256::from(2));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("registeredValidatorCount").is_some());
    }
}
