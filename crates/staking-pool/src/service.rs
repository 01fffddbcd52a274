//! Background task that runs onboarding cycles as pools fill up.
//!
//! The service reacts to [`LedgerEventKind::Credited`] events and, on a fixed interval, retries
//! every pool so that allotments returned after a failed deposit are picked up again.

use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    ledger::{LedgerEvent, LedgerEventKind},
    orchestrator::{CycleOutcome, PoolManager},
    types::PoolId,
};

pub struct OnboardingService {
    manager: PoolManager,
    events: broadcast::Receiver<LedgerEvent>,
    retry_interval: Duration,
    cancel: CancellationToken,
}

impl OnboardingService {
    pub fn new(manager: PoolManager, retry_interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            events: manager.subscribe(),
            manager,
            retry_interval,
            cancel,
        }
    }

    /// Runs until the cancellation token fires. A cycle in flight at that point is dropped and
    /// its reservation returned to the pool.
    pub async fn run(mut self) {
        let mut retry = tokio::time::interval(self.retry_interval);
        retry.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(retry_interval = ?self.retry_interval, "Onboarding service started");
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                event = self.events.recv() => match event {
                    Ok(event) if event.kind == LedgerEventKind::Credited => {
                        self.drain(event.pool).await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Ledger events lagged, checking every pool");
                        self.drain_all().await;
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = retry.tick() => self.drain_all().await,
            }
        }
        info!("Onboarding service stopped");
    }

    async fn drain_all(&self) {
        for pool in self.manager.pool_ids() {
            self.drain(pool).await;
        }
    }

    /// Onboards validators for `pool` until it runs out of allotments or a cycle fails.
    async fn drain(&self, pool: PoolId) {
        loop {
            let cycle = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                cycle = self.manager.run_onboarding_cycle(pool) => cycle,
            };
            match cycle {
                Ok(CycleOutcome::Idle) => return,
                Ok(CycleOutcome::Registered {
                    candidate,
                    deposit_tx,
                    ..
                }) => {
                    debug!(%pool, %candidate, %deposit_tx, "Cycle completed");
                }
                Err(err) if err.is_retryable() => {
                    warn!(%pool, %err, "Onboarding cycle failed, retrying later");
                    return;
                }
                Err(err) => {
                    warn!(%pool, %err, "Onboarding cycle rejected");
                    return;
                }
            }
        }
    }
}
