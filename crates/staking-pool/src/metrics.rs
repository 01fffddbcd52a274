//! Prometheus metrics for the pool manager.

use reth_metrics::{
    Metrics,
    metrics::{Counter, Histogram},
};

#[derive(Metrics, Clone)]
#[metrics(scope = "staking_pool")]
pub struct StakingPoolMetrics {
    /// Staker deposits accepted
    pub deposits_accepted: Counter,

    /// Staker deposits rejected by validation
    pub deposits_rejected: Counter,

    /// Validators onboarded in the registry
    pub validators_onboarded: Counter,

    /// Validators registered after a successful deposit
    pub validators_registered: Counter,

    /// Deposit contract calls that failed or timed out
    pub deposit_call_failures: Counter,

    /// Reservations returned to their pool
    pub compensations: Counter,

    /// Deposit contract call latency in seconds
    pub deposit_call_duration_seconds: Histogram,
}

impl StakingPoolMetrics {
    #[inline]
    pub fn record_deposit(&self, accepted: bool) {
        if accepted {
            self.deposits_accepted.increment(1);
        } else {
            self.deposits_rejected.increment(1);
        }
    }

    #[inline]
    pub fn record_onboarded(&self) {
        self.validators_onboarded.increment(1);
    }

    #[inline]
    pub fn record_registered(&self) {
        self.validators_registered.increment(1);
    }

    #[inline]
    pub fn record_deposit_call(&self, duration_secs: f64, success: bool) {
        self.deposit_call_duration_seconds.record(duration_secs);
        if !success {
            self.deposit_call_failures.increment(1);
        }
    }

    #[inline]
    pub fn record_compensation(&self) {
        self.compensations.increment(1);
    }
}
