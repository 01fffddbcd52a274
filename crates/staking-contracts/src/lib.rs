//! Contract bindings for the liquid-staking pool manager.
//!
//! The engine in `otter-staking-pool` mirrors these interfaces: its errors map onto
//! [`StakingPoolManagerError`], its event log is made of the events declared here, and the
//! beacon-chain deposit is sent through [`IDepositContract`].
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod deposit_contract;
pub mod pool_manager;
pub mod roles;
pub mod validator_registry;

pub use deposit_contract::IDepositContract;
pub use pool_manager::{IStakingPoolManager, StakingPoolManagerError, StakingPoolManagerEvent};
pub use roles::{DEFAULT_ADMIN_ROLE, NETWORK_POOL_ROLE};
pub use validator_registry::{IValidatorRegistry, ValidatorRegistryEvent};
