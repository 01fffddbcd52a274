//! Deposit pooling and validator onboarding for a liquid-staking pool.
//!
//! Staker deposits are split across weighted sub-pools by the [`router`], accumulated in the
//! [`ledger`], and once a pool holds a full 32 ETH [allotment](types::ALLOTMENT) the
//! [`orchestrator`] onboards a permissioned validator through the [`registry`] and forwards the
//! allotment to the beacon-chain [deposit contract](deposit_contract).

pub mod config;
pub mod deposit_contract;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod monitor;
pub mod orchestrator;
pub mod registry;
pub mod retry;
pub mod roles;
pub mod router;
pub mod service;
pub mod snapshot;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

#[cfg(test)]
mod tests;

pub use config::StakingConfig;
pub use deposit_contract::{DepositContract, DryRunDepositContract, RpcDepositContract};
pub use error::{Result, StakingPoolError};
pub use orchestrator::{CycleOutcome, PoolManager};
pub use service::OnboardingService;
pub use snapshot::EngineSnapshot;
pub use types::{ALLOTMENT, CandidateId, PoolId, UNIT, ValidatorCredentials, units};
