//! TOML configuration.

use alloy::{
    primitives::{Address, B256, address},
    signers::local::PrivateKeySigner,
};
use eyre::{Result, WrapErr, ensure};
use otter_staking_contracts::NETWORK_POOL_ROLE;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path, sync::Arc, time::Duration};

use crate::{
    deposit_contract::{DepositContract, DryRunDepositContract, RpcDepositContract},
    ledger::{MAX_TOTAL_WEIGHT, Pool},
    types::PoolId,
};

const DEFAULT_DEPOSIT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 60;
const DEFAULT_SIGNER_KEY_ENV: &str = "DEPOSIT_SIGNER_KEY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingConfig {
    /// Identity allowed to update weights, grant roles and queue validator keys.
    pub admin: Address,
    /// Emitter address for pool manager events.
    pub manager_address: Address,
    /// Emitter address for validator registry events.
    pub registry_address: Address,
    /// Role a pool needs (for its own scope) to onboard validators.
    #[serde(default = "default_onboarding_role")]
    pub onboarding_role: B256,
    pub pools: Vec<PoolConfig>,
    #[serde(default)]
    pub deposit_contract: DepositContractConfig,
    #[serde(default = "default_deposit_timeout_secs")]
    pub deposit_timeout_secs: u64,
    /// How often the onboarding service retries pools whose last cycle failed.
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub id: PoolId,
    pub name: String,
    pub address: Address,
    /// Initial routing weight in percent.
    #[serde(default)]
    pub weight: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum DepositContractConfig {
    /// Accept every deposit locally.
    #[default]
    DryRun,
    Rpc {
        rpc_url: String,
        address: Address,
        /// Environment variable holding the hex private key that funds deposits.
        #[serde(default = "default_signer_key_env")]
        signer_key_env: String,
    },
}

fn default_onboarding_role() -> B256 {
    *NETWORK_POOL_ROLE
}

const fn default_deposit_timeout_secs() -> u64 {
    DEFAULT_DEPOSIT_TIMEOUT_SECS
}

const fn default_retry_interval_secs() -> u64 {
    DEFAULT_RETRY_INTERVAL_SECS
}

fn default_signer_key_env() -> String {
    DEFAULT_SIGNER_KEY_ENV.to_string()
}

impl StakingConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .wrap_err_with(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.pools.is_empty(), "at least one pool must be configured");

        let mut ids = HashSet::new();
        for pool in &self.pools {
            ensure!(ids.insert(pool.id), "pool {} is configured twice", pool.id);
        }

        let total: u32 = self.pools.iter().map(|p| u32::from(p.weight)).sum();
        ensure!(
            total <= MAX_TOTAL_WEIGHT,
            "initial pool weights sum to {total}%, more than {MAX_TOTAL_WEIGHT}%"
        );
        ensure!(self.deposit_timeout_secs > 0, "deposit_timeout_secs must be positive");
        ensure!(self.retry_interval_secs > 0, "retry_interval_secs must be positive");
        Ok(())
    }

    /// Two pools, split evenly, deposits accepted by the dry-run contract.
    pub fn default_test_config() -> Self {
        Self {
            admin: address!("0xad00000000000000000000000000000000000000"),
            manager_address: address!("0x5a00000000000000000000000000000000000001"),
            registry_address: address!("0x5a00000000000000000000000000000000000002"),
            onboarding_role: default_onboarding_role(),
            pools: vec![
                PoolConfig {
                    id: PoolId(0),
                    name: "ssv".to_string(),
                    address: address!("0x5500000000000000000000000000000000000000"),
                    weight: 50,
                },
                PoolConfig {
                    id: PoolId(1),
                    name: "permissioned".to_string(),
                    address: address!("0x5700000000000000000000000000000000000000"),
                    weight: 50,
                },
            ],
            deposit_contract: DepositContractConfig::DryRun,
            deposit_timeout_secs: DEFAULT_DEPOSIT_TIMEOUT_SECS,
            retry_interval_secs: DEFAULT_RETRY_INTERVAL_SECS,
        }
    }

    pub const fn deposit_timeout(&self) -> Duration {
        Duration::from_secs(self.deposit_timeout_secs)
    }

    pub const fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn pools(&self) -> impl Iterator<Item = Pool> + '_ {
        self.pools
            .iter()
            .map(|p| Pool::new(p.id, p.name.clone(), p.address))
    }

    pub fn initial_weights(&self) -> impl Iterator<Item = (PoolId, u8)> + '_ {
        self.pools.iter().map(|p| (p.id, p.weight))
    }
}

impl DepositContractConfig {
    /// Builds the configured deposit contract client.
    pub async fn connect(&self) -> Result<Arc<dyn DepositContract>> {
        match self {
            Self::DryRun => Ok(Arc::new(DryRunDepositContract::new())),
            Self::Rpc {
                rpc_url,
                address,
                signer_key_env,
            } => {
                let key = std::env::var(signer_key_env)
                    .wrap_err_with(|| format!("{signer_key_env} is not set"))?;
                let signer: PrivateKeySigner = key
                    .trim()
                    .parse()
                    .wrap_err_with(|| format!("{signer_key_env} is not a valid private key"))?;
                let contract = RpcDepositContract::connect(rpc_url, signer, *address).await?;
                Ok(Arc::new(contract))
            }
        }
    }
}
