//! Helpers for tests, shared with downstream crates through the `test-utils` feature.

use alloy::primitives::{B256, Bytes, U256, keccak256};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};

use crate::{
    config::StakingConfig, deposit_contract::DepositContract, orchestrator::PoolManager,
    types::ValidatorCredentials,
};

/// Deterministic deposit data for validator number `n`.
pub fn credentials(n: u8) -> ValidatorCredentials {
    ValidatorCredentials {
        pubkey: Bytes::from(vec![n; 48]),
        withdrawal_credentials: B256::left_padding_from(&[0x01, n]),
        signature: Bytes::from(vec![n; 96]),
        deposit_data_root: keccak256([n]),
    }
}

/// Builds a manager from [`StakingConfig::default_test_config`] backed by a succeeding mock.
pub fn test_manager() -> (PoolManager, StakingConfig) {
    let config = StakingConfig::default_test_config();
    let manager = PoolManager::from_config(&config, Arc::new(MockDepositContract::new()))
        .expect("test config is valid");
    (manager, config)
}

#[derive(Debug, Default)]
struct MockState {
    failures: usize,
    calls: Vec<(ValidatorCredentials, U256)>,
}

/// Deposit contract with scripted failures and an optional response delay.
///
/// Every call is recorded, including the ones that fail.
#[derive(Debug, Default)]
pub struct MockDepositContract {
    state: Mutex<MockState>,
    delay: Option<Duration>,
}

impl MockDepositContract {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Makes the next `count` calls fail.
    pub fn fail_next(&self, count: usize) {
        self.state.lock().failures += count;
    }

    pub fn calls(&self) -> Vec<(ValidatorCredentials, U256)> {
        self.state.lock().calls.clone()
    }
}

#[async_trait]
impl DepositContract for MockDepositContract {
    async fn deposit(&self, credentials: &ValidatorCredentials, amount: U256) -> eyre::Result<B256> {
        let (index, fail) = {
            let mut state = self.state.lock();
            state.calls.push((credentials.clone(), amount));
            let fail = state.failures > 0;
            if fail {
                state.failures -= 1;
            }
            (state.calls.len(), fail)
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            eyre::bail!("deposit contract rejected call {index}");
        }
        Ok(keccak256(
            [&credentials.pubkey[..], index.to_be_bytes().as_slice()].concat(),
        ))
    }
}
