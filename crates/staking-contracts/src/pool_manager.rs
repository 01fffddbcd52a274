use alloy_primitives::{Address, B256, U256};

pub use IStakingPoolManager::{
    IStakingPoolManagerErrors as StakingPoolManagerError,
    IStakingPoolManagerEvents as StakingPoolManagerEvent,
};

alloy_sol_types::sol! {
    /// Staker-facing pool manager.
    ///
    /// Deposits are split across sub-pools according to the active weight distribution.
    /// Weights are whole percentages and apply only to deposits made after the update.
    #[derive(Debug, PartialEq, Eq)]
    interface IStakingPoolManager {
        /// Deposit the attached value on behalf of `receiver`
        function deposit(address receiver) external payable returns (uint256 amount);

        /// Replace the weight distribution. Admin only.
        ///
        /// @param poolIds Pools receiving a weight
        /// @param weights Percentage per pool, summing to at most 100
        function updatePoolWeights(uint8[] calldata poolIds, uint8[] calldata weights) external;

        function poolBalance(uint8 poolId) external view returns (uint256 balance);
        function poolWeight(uint8 poolId) external view returns (uint8 weight);

        // Events
        event Deposited(address indexed staker, uint8 indexed poolId, uint256 amount);
        event PoolWeightsUpdated(uint8[] poolIds, uint8[] weights);
        event PoolBalanceUpdated(uint8 indexed poolId, uint256 balance);

        // Errors
        error InvalidAmount(uint256 amount);
        error InvalidWeight(uint256 total);
        error InsufficientBalance(uint8 poolId, uint256 available, uint256 required);
        error Unauthorized(address caller, bytes32 role);
        error InvalidTransition(uint64 candidateId);
        error AlreadyRegistered(uint64 candidateId);
        error ExternalCallFailed(uint64 candidateId);
        error UnknownPool(uint8 poolId);
        error NoRoutablePool();
        error CandidateNotFound(uint64 candidateId);
        error NoValidatorKeys(uint8 poolId);
    }
}

impl StakingPoolManagerError {
    pub const fn invalid_amount(amount: U256) -> Self {
        Self::InvalidAmount(IStakingPoolManager::InvalidAmount { amount })
    }

    pub const fn invalid_weight(total: U256) -> Self {
        Self::InvalidWeight(IStakingPoolManager::InvalidWeight { total })
    }

    pub const fn insufficient_balance(pool_id: u8, available: U256, required: U256) -> Self {
        Self::InsufficientBalance(IStakingPoolManager::InsufficientBalance {
            poolId: pool_id,
            available,
            required,
        })
    }

    pub const fn unauthorized(caller: Address, role: B256) -> Self {
        Self::Unauthorized(IStakingPoolManager::Unauthorized { caller, role })
    }

    pub const fn invalid_transition(candidate_id: u64) -> Self {
        Self::InvalidTransition(IStakingPoolManager::InvalidTransition {
            candidateId: candidate_id,
        })
    }

    pub const fn already_registered(candidate_id: u64) -> Self {
        Self::AlreadyRegistered(IStakingPoolManager::AlreadyRegistered {
            candidateId: candidate_id,
        })
    }

    pub const fn external_call_failed(candidate_id: u64) -> Self {
        Self::ExternalCallFailed(IStakingPoolManager::ExternalCallFailed {
            candidateId: candidate_id,
        })
    }

    pub const fn unknown_pool(pool_id: u8) -> Self {
        Self::UnknownPool(IStakingPoolManager::UnknownPool { poolId: pool_id })
    }

    pub const fn no_routable_pool() -> Self {
        Self::NoRoutablePool(IStakingPoolManager::NoRoutablePool {})
    }

    pub const fn candidate_not_found(candidate_id: u64) -> Self {
        Self::CandidateNotFound(IStakingPoolManager::CandidateNotFound {
            candidateId: candidate_id,
        })
    }

    pub const fn no_validator_keys(pool_id: u8) -> Self {
        Self::NoValidatorKeys(IStakingPoolManager::NoValidatorKeys { poolId: pool_id })
    }
}

impl StakingPoolManagerEvent {
    pub const fn deposited(staker: Address, pool_id: u8, amount: U256) -> Self {
        Self::Deposited(IStakingPoolManager::Deposited {
            staker,
            poolId: pool_id,
            amount,
        })
    }

    pub fn pool_weights_updated(pool_ids: Vec<u8>, weights: Vec<u8>) -> Self {
        Self::PoolWeightsUpdated(IStakingPoolManager::PoolWeightsUpdated {
            poolIds: pool_ids,
            weights,
        })
    }

    pub const fn pool_balance_updated(pool_id: u8, balance: U256) -> Self {
        Self::PoolBalanceUpdated(IStakingPoolManager::PoolBalanceUpdated {
            poolId: pool_id,
            balance,
        })
    }
}
