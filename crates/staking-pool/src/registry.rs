//! Permissioned validator registry.
//!
//! Candidates move `Pending -> Onboarded -> Registered` and never skip a stage. Onboarding is
//! gated by a pool-scoped role; registration happens once the candidate's deposit has been
//! accepted by the deposit contract.

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::info;

use crate::{
    error::{Result, StakingPoolError},
    roles::RolesAuth,
    types::{CandidateId, PoolId, ValidatorCredentials},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CandidateStatus {
    Pending,
    Onboarded {
        /// Deposit calls made for this candidate so far, failed ones included.
        deposit_attempts: u32,
    },
    Registered {
        deposit_tx: B256,
    },
}

impl CandidateStatus {
    /// `Pending -> Onboarded`.
    pub fn onboard(&self, id: CandidateId) -> Result<Self> {
        match self {
            Self::Pending => Ok(Self::Onboarded {
                deposit_attempts: 0,
            }),
            Self::Onboarded { .. } | Self::Registered { .. } => {
                Err(StakingPoolError::InvalidTransition(id))
            }
        }
    }

    /// `Onboarded -> Registered`.
    pub fn register(&self, id: CandidateId, deposit_tx: B256) -> Result<Self> {
        match self {
            Self::Onboarded { .. } => Ok(Self::Registered { deposit_tx }),
            Self::Registered { .. } => Err(StakingPoolError::AlreadyRegistered(id)),
            Self::Pending => Err(StakingPoolError::InvalidTransition(id)),
        }
    }

    pub const fn is_onboarded(&self) -> bool {
        matches!(self, Self::Onboarded { .. })
    }

    pub const fn is_registered(&self) -> bool {
        matches!(self, Self::Registered { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorCandidate {
    pub id: CandidateId,
    pub pool: PoolId,
    pub credentials: ValidatorCredentials,
    pub status: CandidateStatus,
}

#[derive(Debug)]
pub struct ValidatorRegistry {
    roles: RolesAuth,
    candidates: BTreeMap<CandidateId, ValidatorCandidate>,
    /// Operator-supplied deposit data waiting to be onboarded, per pool.
    keys: HashMap<PoolId, VecDeque<ValidatorCredentials>>,
    next_id: u64,
    validator_count: u64,
    registered_count: u64,
}

impl ValidatorRegistry {
    pub fn new(admin: Address) -> Self {
        Self {
            roles: RolesAuth::new(admin),
            candidates: BTreeMap::new(),
            keys: HashMap::new(),
            next_id: 0,
            validator_count: 0,
            registered_count: 0,
        }
    }

    pub const fn roles(&self) -> &RolesAuth {
        &self.roles
    }

    pub fn grant_role(
        &mut self,
        caller: Address,
        pool: PoolId,
        role: B256,
        account: Address,
    ) -> Result<bool> {
        self.roles.grant_role(caller, pool, role, account)
    }

    pub fn revoke_role(
        &mut self,
        caller: Address,
        pool: PoolId,
        role: B256,
        account: Address,
    ) -> Result<bool> {
        self.roles.revoke_role(caller, pool, role, account)
    }

    /// Queues validator deposit data for `pool`. Admin only.
    pub fn add_validator_keys(
        &mut self,
        caller: Address,
        pool: PoolId,
        keys: impl IntoIterator<Item = ValidatorCredentials>,
    ) -> Result<usize> {
        self.roles.ensure_admin(caller)?;
        let queue = self.keys.entry(pool).or_default();
        queue.extend(keys);
        Ok(queue.len())
    }

    pub fn queued_keys(&self, pool: PoolId) -> usize {
        self.keys.get(&pool).map_or(0, VecDeque::len)
    }

    /// Onboards the next queued validator of `pool`.
    ///
    /// `caller` must hold `role` for `pool`. The candidate is created `Pending` and approved to
    /// `Onboarded` in the same step, bumping the validator count.
    pub fn onboard_validator(
        &mut self,
        caller: Address,
        pool: PoolId,
        role: B256,
    ) -> Result<CandidateId> {
        self.roles.ensure_role(caller, pool, role)?;
        let id = CandidateId(self.next_id);
        let status = CandidateStatus::Pending.onboard(id)?;
        let credentials = self
            .keys
            .get_mut(&pool)
            .and_then(VecDeque::pop_front)
            .ok_or(StakingPoolError::NoValidatorKeys(pool))?;

        self.next_id += 1;
        self.validator_count += 1;
        info!(candidate = %id, %pool, pubkey = %credentials.pubkey, "Validator onboarded");
        self.candidates.insert(
            id,
            ValidatorCandidate {
                id,
                pool,
                credentials,
                status,
            },
        );
        Ok(id)
    }

    /// Counts a deposit call against an onboarded candidate.
    pub fn record_deposit_attempt(&mut self, id: CandidateId) -> Result<u32> {
        let candidate = self.candidate_mut(id)?;
        match &mut candidate.status {
            CandidateStatus::Onboarded { deposit_attempts } => {
                *deposit_attempts += 1;
                Ok(*deposit_attempts)
            }
            CandidateStatus::Registered { .. } => Err(StakingPoolError::AlreadyRegistered(id)),
            CandidateStatus::Pending => Err(StakingPoolError::InvalidTransition(id)),
        }
    }

    /// Marks the candidate registered after its deposit landed.
    pub fn register_validator(&mut self, id: CandidateId, deposit_tx: B256) -> Result<()> {
        let candidate = self.candidate_mut(id)?;
        candidate.status = candidate.status.register(id, deposit_tx)?;
        let pool = candidate.pool;
        self.registered_count += 1;
        info!(candidate = %id, %pool, %deposit_tx, "Validator registered");
        Ok(())
    }

    /// Oldest onboarded, unregistered candidate of `pool` for which `skip` is false.
    pub fn next_unfunded(
        &self,
        pool: PoolId,
        skip: impl Fn(CandidateId) -> bool,
    ) -> Option<CandidateId> {
        self.candidates
            .values()
            .find(|c| c.pool == pool && c.status.is_onboarded() && !skip(c.id))
            .map(|c| c.id)
    }

    pub fn candidate(&self, id: CandidateId) -> Result<&ValidatorCandidate> {
        self.candidates
            .get(&id)
            .ok_or(StakingPoolError::CandidateNotFound(id))
    }

    fn candidate_mut(&mut self, id: CandidateId) -> Result<&mut ValidatorCandidate> {
        self.candidates
            .get_mut(&id)
            .ok_or(StakingPoolError::CandidateNotFound(id))
    }

    pub fn candidates(&self) -> impl Iterator<Item = &ValidatorCandidate> {
        self.candidates.values()
    }

    pub const fn validator_count(&self) -> u64 {
        self.validator_count
    }

    pub const fn registered_validator_count(&self) -> u64 {
        self.registered_count
    }
}
