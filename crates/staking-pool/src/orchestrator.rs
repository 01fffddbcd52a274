//! Pool manager: owns the ledger, router and registry and drives onboarding cycles.
//!
//! All state sits behind one mutex. Every public operation takes the lock once, validates, then
//! mutates, so a rejected call has no side effects and no caller observes a half-applied update.
//! The only suspension point is the deposit contract call of an onboarding cycle, and the lock is
//! not held across it: the allotment is moved into a reservation first, which keeps concurrent
//! cycles from spending it twice.

use alloy::primitives::{Address, B256, IntoLogData, Log, U256};
use otter_staking_contracts::{StakingPoolManagerEvent, ValidatorRegistryEvent};
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::{sync::broadcast, time::Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    config::StakingConfig,
    deposit_contract::DepositContract,
    error::{Result, StakingPoolError},
    ledger::{LedgerEvent, Pool, PoolLedger, WeightDistribution},
    metrics::StakingPoolMetrics,
    monitor::FundingMonitor,
    registry::{ValidatorCandidate, ValidatorRegistry},
    router::DepositRouter,
    snapshot::EngineSnapshot,
    types::{ALLOTMENT, CandidateId, Deposit, PoolId, ValidatorCredentials},
};

#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub manager_address: Address,
    pub registry_address: Address,
    pub onboarding_role: B256,
    pub deposit_timeout: Duration,
}

impl From<&StakingConfig> for ManagerSettings {
    fn from(config: &StakingConfig) -> Self {
        Self {
            manager_address: config.manager_address,
            registry_address: config.registry_address,
            onboarding_role: config.onboarding_role,
            deposit_timeout: config.deposit_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The pool holds less than one allotment.
    Idle,
    Registered {
        candidate: CandidateId,
        pool: PoolId,
        deposit_tx: B256,
    },
}

#[derive(Debug)]
pub(crate) struct EngineState {
    pub(crate) ledger: PoolLedger,
    pub(crate) router: DepositRouter,
    pub(crate) registry: ValidatorRegistry,
    pub(crate) logs: Vec<Log>,
}

impl EngineState {
    fn emit(&mut self, address: Address, event: impl IntoLogData) {
        self.logs.push(Log {
            address,
            data: event.into_log_data(),
        });
    }
}

#[derive(Clone)]
pub struct PoolManager {
    state: Arc<Mutex<EngineState>>,
    deposit_contract: Arc<dyn DepositContract>,
    settings: Arc<ManagerSettings>,
    metrics: StakingPoolMetrics,
}

impl PoolManager {
    pub fn new(
        admin: Address,
        pools: impl IntoIterator<Item = Pool>,
        deposit_contract: Arc<dyn DepositContract>,
        settings: ManagerSettings,
    ) -> Self {
        let state = EngineState {
            ledger: PoolLedger::new(pools),
            router: DepositRouter::new(),
            registry: ValidatorRegistry::new(admin),
            logs: Vec::new(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            deposit_contract,
            settings: Arc::new(settings),
            metrics: StakingPoolMetrics::default(),
        }
    }

    /// Builds a manager from config and applies the configured initial weights.
    pub fn from_config(
        config: &StakingConfig,
        deposit_contract: Arc<dyn DepositContract>,
    ) -> Result<Self> {
        let manager = Self::new(
            config.admin,
            config.pools(),
            deposit_contract,
            ManagerSettings::from(config),
        );
        manager.set_weights(config.admin, config.initial_weights())?;
        Ok(manager)
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// Staker-facing entry point. Splits `amount` across pools by the current weights.
    pub fn deposit(&self, staker: Address, amount: U256) -> Result<Vec<Deposit>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let recorded = match state.router.deposit(&mut state.ledger, staker, amount) {
            Ok(recorded) => recorded,
            Err(err) => {
                self.metrics.record_deposit(false);
                debug!(%staker, %amount, %err, "Deposit rejected");
                return Err(err);
            }
        };

        for deposit in &recorded {
            let balance = state.ledger.balance(deposit.pool)?;
            let manager = self.settings.manager_address;
            state.emit(
                manager,
                StakingPoolManagerEvent::deposited(staker, deposit.pool.0, deposit.amount),
            );
            state.emit(
                manager,
                StakingPoolManagerEvent::pool_balance_updated(deposit.pool.0, balance),
            );
        }
        self.metrics.record_deposit(true);
        info!(%staker, %amount, pools = recorded.len(), "Deposit accepted");
        Ok(recorded)
    }

    /// Replaces the weight distribution. Admin only; all-or-nothing.
    pub fn set_weights(
        &self,
        caller: Address,
        weights: impl IntoIterator<Item = (PoolId, u8)>,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.registry.roles().ensure_admin(caller)?;
        let weights = WeightDistribution::new(weights)?;
        state.ledger.set_weights(weights.clone())?;

        let (pool_ids, values) = weights.iter().map(|(pool, w)| (pool.0, w)).unzip();
        state.emit(
            self.settings.manager_address,
            StakingPoolManagerEvent::pool_weights_updated(pool_ids, values),
        );
        info!(total = weights.total(), "Pool weights updated");
        Ok(())
    }

    /// Grants a pool-scoped role. Admin only.
    pub fn grant_role(
        &self,
        caller: Address,
        pool: PoolId,
        role: B256,
        account: Address,
    ) -> Result<bool> {
        let mut state = self.state.lock();
        state.ledger.pool(pool)?;
        let granted = state.registry.grant_role(caller, pool, role, account)?;
        if granted {
            state.emit(
                self.settings.registry_address,
                ValidatorRegistryEvent::role_granted(role, pool.0, account, caller),
            );
        }
        Ok(granted)
    }

    pub fn revoke_role(
        &self,
        caller: Address,
        pool: PoolId,
        role: B256,
        account: Address,
    ) -> Result<bool> {
        let mut state = self.state.lock();
        state.ledger.pool(pool)?;
        let revoked = state.registry.revoke_role(caller, pool, role, account)?;
        if revoked {
            state.emit(
                self.settings.registry_address,
                ValidatorRegistryEvent::role_revoked(role, pool.0, account, caller),
            );
        }
        Ok(revoked)
    }

    /// Queues operator deposit data for future validators of `pool`. Admin only.
    pub fn add_validator_keys(
        &self,
        caller: Address,
        pool: PoolId,
        keys: impl IntoIterator<Item = ValidatorCredentials>,
    ) -> Result<usize> {
        let mut state = self.state.lock();
        state.ledger.pool(pool)?;
        state.registry.add_validator_keys(caller, pool, keys)
    }

    /// Runs one onboarding cycle for `pool`.
    ///
    /// 1. Returns [`CycleOutcome::Idle`] if the pool cannot fund a validator.
    /// 2. Checks that the pool's identity holds the onboarding role, then picks the oldest
    ///    onboarded candidate still waiting for its deposit or onboards a new one. A failure
    ///    aborts before any funds move.
    /// 3. Reserves exactly one allotment.
    /// 4. Calls the deposit contract under the configured timeout. On failure, timeout or
    ///    cancellation the allotment goes back to the pool and the candidate stays onboarded.
    /// 5. On success the allotment leaves the ledger and the candidate is registered.
    #[instrument(skip_all, fields(%pool))]
    pub async fn run_onboarding_cycle(&self, pool: PoolId) -> Result<CycleOutcome> {
        let Some((reservation, credentials)) = self.reserve_allotment(pool)? else {
            return Ok(CycleOutcome::Idle);
        };
        let candidate = reservation.candidate;

        let started = Instant::now();
        let outcome = tokio::time::timeout(
            self.settings.deposit_timeout,
            self.deposit_contract.deposit(&credentials, ALLOTMENT),
        )
        .await;
        let result = match outcome {
            Ok(Ok(deposit_tx)) => Ok(deposit_tx),
            Ok(Err(err)) => Err(format!("{err:#}")),
            Err(_) => Err(format!(
                "no response within {:?}",
                self.settings.deposit_timeout
            )),
        };
        self.metrics
            .record_deposit_call(started.elapsed().as_secs_f64(), result.is_ok());

        match result {
            Ok(deposit_tx) => {
                reservation.commit(deposit_tx)?;
                Ok(CycleOutcome::Registered {
                    candidate,
                    pool,
                    deposit_tx,
                })
            }
            Err(reason) => {
                reservation.compensate();
                warn!(%candidate, %reason, "Deposit failed, allotment returned to pool");
                Err(StakingPoolError::ExternalCallFailed { candidate, reason })
            }
        }
    }

    /// Phase one of a cycle, atomic under the state lock.
    fn reserve_allotment(
        &self,
        pool: PoolId,
    ) -> Result<Option<(Reservation, ValidatorCredentials)>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let pool_address = state.ledger.pool(pool)?.address;
        let allotments = FundingMonitor::available_allotments(&state.ledger, pool)?;
        if allotments == 0 {
            debug!("Pool cannot fund a validator yet");
            return Ok(None);
        }
        // Reused candidates go through the same check as fresh ones.
        state
            .registry
            .roles()
            .ensure_role(pool_address, pool, self.settings.onboarding_role)?;

        let ledger = &state.ledger;
        let candidate = match state.registry.next_unfunded(pool, |id| ledger.is_reserved(id)) {
            Some(candidate) => {
                debug!(%candidate, "Retrying deposit for onboarded candidate");
                candidate
            }
            None => {
                let candidate = state.registry.onboard_validator(
                    pool_address,
                    pool,
                    self.settings.onboarding_role,
                )?;
                let pubkey = state.registry.candidate(candidate)?.credentials.pubkey.clone();
                state.emit(
                    self.settings.registry_address,
                    ValidatorRegistryEvent::validator_onboarded(candidate.0, pool.0, pubkey),
                );
                self.metrics.record_onboarded();
                candidate
            }
        };

        let balance = state.ledger.reserve(pool, candidate, ALLOTMENT)?;
        let attempt = state.registry.record_deposit_attempt(candidate)?;
        let credentials = state.registry.candidate(candidate)?.credentials.clone();
        state.emit(
            self.settings.manager_address,
            StakingPoolManagerEvent::pool_balance_updated(pool.0, balance),
        );
        info!(%candidate, attempt, allotments, %balance, "Allotment reserved for deposit");

        let reservation = Reservation {
            state: Arc::clone(&self.state),
            settings: Arc::clone(&self.settings),
            metrics: self.metrics.clone(),
            candidate,
            pool,
            settled: false,
        };
        Ok(Some((reservation, credentials)))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.state.lock().ledger.subscribe()
    }

    pub fn pool_ids(&self) -> Vec<PoolId> {
        self.state.lock().ledger.pools().map(|pool| pool.id).collect()
    }

    pub fn pool_balance(&self, pool: PoolId) -> Result<U256> {
        self.state.lock().ledger.balance(pool)
    }

    pub fn reserved_balance(&self, pool: PoolId) -> Result<U256> {
        self.state.lock().ledger.reserved(pool)
    }

    pub fn available_allotments(&self, pool: PoolId) -> Result<u64> {
        FundingMonitor::available_allotments(&self.state.lock().ledger, pool)
    }

    pub fn weights(&self) -> WeightDistribution {
        self.state.lock().ledger.weights().clone()
    }

    pub fn validator_count(&self) -> u64 {
        self.state.lock().registry.validator_count()
    }

    pub fn registered_validator_count(&self) -> u64 {
        self.state.lock().registry.registered_validator_count()
    }

    pub fn candidate(&self, id: CandidateId) -> Result<ValidatorCandidate> {
        self.state.lock().registry.candidate(id).cloned()
    }

    pub fn has_role(&self, pool: PoolId, role: B256, account: Address) -> bool {
        self.state.lock().registry.roles().has_role(pool, role, account)
    }

    pub fn deposits(&self) -> Vec<Deposit> {
        self.state.lock().router.deposits().to_vec()
    }

    pub fn staker_contribution(&self, staker: Address) -> U256 {
        self.state.lock().router.contribution(staker)
    }

    pub fn total_deposited(&self) -> U256 {
        self.state.lock().router.total_deposited()
    }

    pub fn total_forwarded(&self) -> U256 {
        self.state.lock().ledger.forwarded()
    }

    /// Spendable plus reserved funds across all pools.
    pub fn total_pooled(&self) -> U256 {
        self.state.lock().ledger.total_pooled()
    }

    /// Contract event logs emitted so far, oldest first.
    pub fn events(&self) -> Vec<Log> {
        self.state.lock().logs.clone()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot::capture(&self.state.lock())
    }
}

/// One reserved allotment awaiting the deposit contract's answer.
///
/// Exactly one of [`commit`](Self::commit) or [`compensate`](Self::compensate) settles it.
/// Dropping it unsettled, e.g. when the cycle future is cancelled, compensates.
struct Reservation {
    state: Arc<Mutex<EngineState>>,
    settings: Arc<ManagerSettings>,
    metrics: StakingPoolMetrics,
    candidate: CandidateId,
    pool: PoolId,
    settled: bool,
}

impl Reservation {
    fn commit(mut self, deposit_tx: B256) -> Result<()> {
        self.settled = true;
        let mut state = self.state.lock();
        state.ledger.forward(self.candidate)?;
        state.registry.register_validator(self.candidate, deposit_tx)?;
        state.emit(
            self.settings.registry_address,
            ValidatorRegistryEvent::validator_registered(self.candidate.0, self.pool.0, deposit_tx),
        );
        self.metrics.record_registered();
        Ok(())
    }

    fn compensate(mut self) {
        self.settled = true;
        self.release();
    }

    fn release(&self) {
        let mut state = self.state.lock();
        match state.ledger.release(self.candidate) {
            Ok(balance) => {
                state.emit(
                    self.settings.manager_address,
                    StakingPoolManagerEvent::pool_balance_updated(self.pool.0, balance),
                );
                self.metrics.record_compensation();
            }
            Err(err) => {
                error!(candidate = %self.candidate, %err, "Failed to release reservation");
            }
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.settled {
            warn!(
                candidate = %self.candidate,
                pool = %self.pool,
                "Onboarding cycle cancelled, returning allotment to pool"
            );
            self.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockDepositContract, credentials, test_manager};
    use crate::types::units;
    use otter_staking_contracts::{DEFAULT_ADMIN_ROLE, NETWORK_POOL_ROLE};

    const PERMISSIONED: PoolId = PoolId(1);

    #[test]
    fn test_set_weights_admin_only() {
        let (manager, _) = test_manager();
        let stranger = Address::repeat_byte(0x99);

        let err = manager
            .set_weights(stranger, [(PoolId(0), 0), (PERMISSIONED, 100)])
            .unwrap_err();
        assert_eq!(
            err,
            StakingPoolError::Unauthorized {
                caller: stranger,
                role: DEFAULT_ADMIN_ROLE,
            }
        );
        assert_eq!(manager.weights().weight(PERMISSIONED), 50);
    }

    #[test]
    fn test_grant_role_unknown_pool() {
        let (manager, config) = test_manager();
        assert_eq!(
            manager.grant_role(config.admin, PoolId(9), *NETWORK_POOL_ROLE, Address::ZERO),
            Err(StakingPoolError::UnknownPool(PoolId(9)))
        );
    }

    #[tokio::test]
    async fn test_idle_when_underfunded() {
        let (manager, config) = test_manager();
        manager
            .set_weights(config.admin, [(PERMISSIONED, 100)])
            .unwrap();
        manager
            .deposit(Address::repeat_byte(1), units(31))
            .unwrap();

        assert_eq!(
            manager.run_onboarding_cycle(PERMISSIONED).await.unwrap(),
            CycleOutcome::Idle
        );
        assert_eq!(manager.validator_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_compensates() {
        let mut config = StakingConfig::default_test_config();
        config.deposit_timeout_secs = 1;
        let contract = Arc::new(MockDepositContract::new().with_delay(Duration::from_secs(5)));
        let manager = PoolManager::from_config(&config, contract.clone()).unwrap();
        manager
            .set_weights(config.admin, [(PERMISSIONED, 100)])
            .unwrap();
        manager
            .add_validator_keys(config.admin, PERMISSIONED, [credentials(1)])
            .unwrap();
        manager
            .grant_role(
                config.admin,
                PERMISSIONED,
                *NETWORK_POOL_ROLE,
                config.pools[1].address,
            )
            .unwrap();
        manager.deposit(Address::repeat_byte(1), units(40)).unwrap();

        let err = manager.run_onboarding_cycle(PERMISSIONED).await.unwrap_err();
        assert!(matches!(err, StakingPoolError::ExternalCallFailed { .. }));
        assert_eq!(manager.pool_balance(PERMISSIONED).unwrap(), units(40));
        assert_eq!(manager.reserved_balance(PERMISSIONED).unwrap(), U256::ZERO);
        assert_eq!(manager.registered_validator_count(), 0);
    }
}
