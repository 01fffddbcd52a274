use alloy::{
    primitives::{Address, B256, Bytes, U256},
    sol_types::SolInterface,
};
use otter_staking_contracts::StakingPoolManagerError;

use crate::types::{CandidateId, PoolId};

/// Result alias for pool manager operations.
pub type Result<T, E = StakingPoolError> = std::result::Result<T, E>;

/// Errors surfaced by the pool manager.
///
/// Every variant except [`StakingPoolError::ExternalCallFailed`] is raised before any state is
/// touched, so a rejected operation leaves the ledger and registry unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StakingPoolError {
    #[error("invalid amount: {0}")]
    InvalidAmount(U256),

    #[error("invalid weight distribution: total {total}% exceeds 100% or repeats a pool")]
    InvalidWeight { total: u32 },

    #[error("insufficient balance in pool {pool}: available {available}, required {required}")]
    InsufficientBalance {
        pool: PoolId,
        available: U256,
        required: U256,
    },

    #[error("{caller} lacks role {role}")]
    Unauthorized { caller: Address, role: B256 },

    #[error("invalid state transition for candidate {0}")]
    InvalidTransition(CandidateId),

    #[error("candidate {0} is already registered")]
    AlreadyRegistered(CandidateId),

    #[error("deposit contract call failed for candidate {candidate}: {reason}")]
    ExternalCallFailed {
        candidate: CandidateId,
        reason: String,
    },

    #[error("unknown pool {0}")]
    UnknownPool(PoolId),

    #[error("no pool has a positive weight")]
    NoRoutablePool,

    #[error("unknown validator candidate {0}")]
    CandidateNotFound(CandidateId),

    #[error("no validator keys queued for pool {0}")]
    NoValidatorKeys(PoolId),
}

impl StakingPoolError {
    /// Returns `true` if the caller may retry the same operation later without changes.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ExternalCallFailed { .. })
    }

    /// ABI-encoded revert data matching the `IStakingPoolManager` custom errors.
    pub fn to_revert(&self) -> Bytes {
        let err = match self {
            Self::InvalidAmount(amount) => StakingPoolManagerError::invalid_amount(*amount),
            Self::InvalidWeight { total } => {
                StakingPoolManagerError::invalid_weight(U256::from(*total))
            }
            Self::InsufficientBalance {
                pool,
                available,
                required,
            } => StakingPoolManagerError::insufficient_balance(pool.0, *available, *required),
            Self::Unauthorized { caller, role } => {
                StakingPoolManagerError::unauthorized(*caller, *role)
            }
            Self::InvalidTransition(id) => StakingPoolManagerError::invalid_transition(id.0),
            Self::AlreadyRegistered(id) => StakingPoolManagerError::already_registered(id.0),
            Self::ExternalCallFailed { candidate, .. } => {
                StakingPoolManagerError::external_call_failed(candidate.0)
            }
            Self::UnknownPool(pool) => StakingPoolManagerError::unknown_pool(pool.0),
            Self::NoValidatorKeys(pool) => StakingPoolManagerError::no_validator_keys(pool.0),
            Self::NoRoutablePool => StakingPoolManagerError::no_routable_pool(),
            Self::CandidateNotFound(id) => StakingPoolManagerError::candidate_not_found(id.0),
        };
        err.abi_encode().into()
    }
}
