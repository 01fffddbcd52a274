use alloy_primitives::{Address, B256, Bytes};

pub use IValidatorRegistry::IValidatorRegistryEvents as ValidatorRegistryEvent;

alloy_sol_types::sol! {
    /// Registry of permissioned validators.
    ///
    /// Roles are scoped per pool. A pool must hold `STADER_NETWORK_POOL` for its own scope to
    /// onboard validators; the validator is registered once its 32 ETH deposit has landed.
    #[derive(Debug, PartialEq, Eq)]
    interface IValidatorRegistry {
        function grantRole(bytes32 role, uint8 poolId, address account) external;
        function revokeRole(bytes32 role, uint8 poolId, address account) external;
        function hasRole(bytes32 role, uint8 poolId, address account) external view returns (bool);

        function validatorCount() external view returns (uint256);
        function registeredValidatorCount() external view returns (uint256);

        // Events
        event RoleGranted(bytes32 indexed role, uint8 indexed poolId, address indexed account, address sender);
        event RoleRevoked(bytes32 indexed role, uint8 indexed poolId, address indexed account, address sender);
        event ValidatorOnboarded(uint64 indexed candidateId, uint8 indexed poolId, bytes pubkey);
        event ValidatorRegistered(uint64 indexed candidateId, uint8 indexed poolId, bytes32 depositTx);
    }
}

impl ValidatorRegistryEvent {
    pub const fn role_granted(role: B256, pool_id: u8, account: Address, sender: Address) -> Self {
        Self::RoleGranted(IValidatorRegistry::RoleGranted {
            role,
            poolId: pool_id,
            account,
            sender,
        })
    }

    pub const fn role_revoked(role: B256, pool_id: u8, account: Address, sender: Address) -> Self {
        Self::RoleRevoked(IValidatorRegistry::RoleRevoked {
            role,
            poolId: pool_id,
            account,
            sender,
        })
    }

    pub fn validator_onboarded(candidate_id: u64, pool_id: u8, pubkey: Bytes) -> Self {
        Self::ValidatorOnboarded(IValidatorRegistry::ValidatorOnboarded {
            candidateId: candidate_id,
            poolId: pool_id,
            pubkey,
        })
    }

    pub const fn validator_registered(candidate_id: u64, pool_id: u8, deposit_tx: B256) -> Self {
        Self::ValidatorRegistered(IValidatorRegistry::ValidatorRegistered {
            candidateId: candidate_id,
            poolId: pool_id,
            depositTx: deposit_tx,
        })
    }
}
