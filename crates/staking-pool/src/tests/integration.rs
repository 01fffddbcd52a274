//! End-to-end flows through the pool manager: deposits, weight updates and onboarding cycles
//! against a scripted deposit contract.

use super::fixtures::*;
use crate::{
    error::StakingPoolError,
    orchestrator::CycleOutcome,
    registry::CandidateStatus,
    types::{ALLOTMENT, CandidateId, PoolId, units},
};
use alloy::{
    primitives::{Address, U256},
    sol_types::{SolError, SolEvent, SolInterface},
};
use otter_staking_contracts::{
    IStakingPoolManager, IValidatorRegistry, NETWORK_POOL_ROLE, StakingPoolManagerError,
};
use proptest::prelude::*;
use std::time::Duration;

#[tokio::test]
async fn test_pooled_deposits_fund_one_validator() {
    let harness = Harness::new().permissioned_only(1).grant_onboarding_role();
    harness.deposit_eth(5, 10);
    let manager = &harness.manager;
    assert_eq!(manager.pool_balance(PERMISSIONED).unwrap(), units(50));
    assert_eq!(manager.available_allotments(PERMISSIONED).unwrap(), 1);

    let outcome = manager.run_onboarding_cycle(PERMISSIONED).await.unwrap();
    let CycleOutcome::Registered {
        candidate,
        pool,
        deposit_tx,
    } = outcome
    else {
        panic!("expected a registered validator, got {outcome:?}");
    };
    assert_eq!(pool, PERMISSIONED);
    assert_eq!(manager.pool_balance(PERMISSIONED).unwrap(), units(18));
    assert_eq!(manager.reserved_balance(PERMISSIONED).unwrap(), U256::ZERO);
    assert_eq!(manager.validator_count(), 1);
    assert_eq!(manager.registered_validator_count(), 1);
    assert_eq!(manager.total_forwarded(), ALLOTMENT);
    assert_eq!(
        manager.candidate(candidate).unwrap().status,
        CandidateStatus::Registered { deposit_tx }
    );

    let calls = harness.contract.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, ALLOTMENT);

    // Leftover funds are below one allotment.
    assert_eq!(
        manager.run_onboarding_cycle(PERMISSIONED).await.unwrap(),
        CycleOutcome::Idle
    );
}

#[tokio::test]
async fn test_onboarding_without_role_leaves_funds_untouched() {
    let harness = Harness::new().permissioned_only(1);
    harness.deposit_eth(5, 10);
    let manager = &harness.manager;

    let err = manager.run_onboarding_cycle(PERMISSIONED).await.unwrap_err();
    assert_eq!(
        err,
        StakingPoolError::Unauthorized {
            caller: harness.permissioned_address(),
            role: *NETWORK_POOL_ROLE,
        }
    );
    assert_eq!(manager.pool_balance(PERMISSIONED).unwrap(), units(50));
    assert_eq!(manager.validator_count(), 0);
    assert!(harness.contract.calls().is_empty());
    assert_eq!(manager.snapshot().pool(PERMISSIONED).unwrap().queued_keys, 1);
}

#[tokio::test]
async fn test_role_granted_to_other_pool_does_not_authorize() {
    let harness = Harness::new().permissioned_only(1);
    let manager = &harness.manager;
    manager
        .grant_role(
            harness.admin(),
            SSV,
            *NETWORK_POOL_ROLE,
            harness.permissioned_address(),
        )
        .unwrap();
    harness.deposit_eth(4, 10);

    assert!(matches!(
        manager.run_onboarding_cycle(PERMISSIONED).await,
        Err(StakingPoolError::Unauthorized { .. })
    ));
}

#[tokio::test]
async fn test_revoked_role_stops_onboarding() {
    let harness = Harness::new().permissioned_only(2).grant_onboarding_role();
    harness.deposit_eth(4, 20);
    let manager = &harness.manager;

    manager.run_onboarding_cycle(PERMISSIONED).await.unwrap();
    assert!(
        manager
            .revoke_role(
                harness.admin(),
                PERMISSIONED,
                *NETWORK_POOL_ROLE,
                harness.permissioned_address(),
            )
            .unwrap()
    );

    assert!(matches!(
        manager.run_onboarding_cycle(PERMISSIONED).await,
        Err(StakingPoolError::Unauthorized { .. })
    ));
    assert_eq!(manager.pool_balance(PERMISSIONED).unwrap(), units(48));
}

#[tokio::test]
async fn test_failed_deposit_is_compensated_and_retried() {
    let harness = Harness::new().permissioned_only(1).grant_onboarding_role();
    harness.deposit_eth(5, 10);
    harness.contract.fail_next(1);
    let manager = &harness.manager;

    let err = manager.run_onboarding_cycle(PERMISSIONED).await.unwrap_err();
    let StakingPoolError::ExternalCallFailed { candidate, .. } = err else {
        panic!("expected an external call failure, got {err:?}");
    };
    assert!(err.is_retryable());
    assert_eq!(manager.pool_balance(PERMISSIONED).unwrap(), units(50));
    assert_eq!(manager.reserved_balance(PERMISSIONED).unwrap(), U256::ZERO);
    assert_eq!(
        manager.candidate(candidate).unwrap().status,
        CandidateStatus::Onboarded { deposit_attempts: 1 }
    );
    assert_eq!(manager.validator_count(), 1);
    assert_eq!(manager.registered_validator_count(), 0);

    // The retry reuses the onboarded candidate instead of consuming another key.
    let outcome = manager.run_onboarding_cycle(PERMISSIONED).await.unwrap();
    assert!(matches!(
        outcome,
        CycleOutcome::Registered { candidate: c, .. } if c == candidate
    ));
    assert_eq!(manager.pool_balance(PERMISSIONED).unwrap(), units(18));
    assert_eq!(manager.validator_count(), 1);
    assert_eq!(manager.registered_validator_count(), 1);
    assert_eq!(manager.total_forwarded(), ALLOTMENT);
    assert_eq!(harness.contract.calls().len(), 2);
}

#[tokio::test]
async fn test_revoked_role_blocks_retry_of_onboarded_candidate() {
    let harness = Harness::new().permissioned_only(1).grant_onboarding_role();
    harness.deposit_eth(5, 10);
    harness.contract.fail_next(1);
    let manager = &harness.manager;

    let StakingPoolError::ExternalCallFailed { candidate, .. } =
        manager.run_onboarding_cycle(PERMISSIONED).await.unwrap_err()
    else {
        panic!("expected an external call failure");
    };
    manager
        .revoke_role(
            harness.admin(),
            PERMISSIONED,
            *NETWORK_POOL_ROLE,
            harness.permissioned_address(),
        )
        .unwrap();

    let err = manager.run_onboarding_cycle(PERMISSIONED).await.unwrap_err();
    assert!(matches!(err, StakingPoolError::Unauthorized { .. }), "{err:?}");
    assert_eq!(manager.pool_balance(PERMISSIONED).unwrap(), units(50));
    assert_eq!(manager.reserved_balance(PERMISSIONED).unwrap(), U256::ZERO);
    assert_eq!(manager.registered_validator_count(), 0);
    assert_eq!(
        manager.candidate(candidate).unwrap().status,
        CandidateStatus::Onboarded { deposit_attempts: 1 }
    );
    assert_eq!(harness.contract.calls().len(), 1);
}

#[tokio::test]
async fn test_missing_validator_keys_abort_before_reserving() {
    let harness = Harness::new().permissioned_only(1).grant_onboarding_role();
    harness.deposit_eth(2, 32);
    let manager = &harness.manager;
    manager.run_onboarding_cycle(PERMISSIONED).await.unwrap();

    assert_eq!(
        manager.run_onboarding_cycle(PERMISSIONED).await,
        Err(StakingPoolError::NoValidatorKeys(PERMISSIONED))
    );
    assert_eq!(manager.pool_balance(PERMISSIONED).unwrap(), units(32));
    assert_eq!(manager.validator_count(), 1);

    manager
        .add_validator_keys(harness.admin(), PERMISSIONED, [crate::test_utils::credentials(9)])
        .unwrap();
    assert!(matches!(
        manager.run_onboarding_cycle(PERMISSIONED).await,
        Ok(CycleOutcome::Registered { candidate: CandidateId(1), .. })
    ));
    assert_eq!(manager.registered_validator_count(), 2);
}

#[test]
fn test_invalid_weights_keep_previous_distribution() {
    let harness = Harness::new();
    let manager = &harness.manager;
    let before = manager.weights();

    let err = manager
        .set_weights(harness.admin(), [(SSV, 100), (PERMISSIONED, 50)])
        .unwrap_err();
    assert_eq!(err, StakingPoolError::InvalidWeight { total: 150 });
    assert_eq!(manager.weights(), before);

    let revert = err.to_revert();
    let decoded = IStakingPoolManager::InvalidWeight::abi_decode(&revert).unwrap();
    assert_eq!(decoded.total, U256::from(150));
}

#[test]
fn test_weight_update_is_not_retroactive() {
    let harness = Harness::new();
    let manager = &harness.manager;
    manager.deposit(ALICE, units(10)).unwrap();

    manager
        .set_weights(harness.admin(), [(SSV, 0), (PERMISSIONED, 100)])
        .unwrap();
    manager.deposit(BOB, units(10)).unwrap();

    assert_eq!(manager.pool_balance(SSV).unwrap(), units(5));
    assert_eq!(manager.pool_balance(PERMISSIONED).unwrap(), units(15));
    assert_eq!(manager.staker_contribution(ALICE), units(10));
    assert_eq!(manager.staker_contribution(BOB), units(10));
}

#[test]
fn test_weight_update_with_unknown_pool_is_rejected() {
    let harness = Harness::new();
    let before = harness.manager.weights();
    assert_eq!(
        harness
            .manager
            .set_weights(harness.admin(), [(PoolId(7), 100)]),
        Err(StakingPoolError::UnknownPool(PoolId(7)))
    );
    assert_eq!(harness.manager.weights(), before);
}

#[test]
fn test_deposit_emits_contract_events() {
    let harness = Harness::new();
    harness.manager.deposit(ALICE, units(3)).unwrap();

    let deposited: Vec<_> = harness
        .manager
        .events()
        .iter()
        .filter_map(|log| IStakingPoolManager::Deposited::decode_log_data(&log.data).ok())
        .collect();
    assert_eq!(deposited.len(), 2);
    assert!(deposited.iter().all(|event| event.staker == ALICE));
    assert_eq!(
        deposited.iter().fold(U256::ZERO, |acc, event| acc + event.amount),
        units(3)
    );
}

#[tokio::test]
async fn test_registration_event_carries_deposit_tx() {
    let harness = Harness::new().permissioned_only(1).grant_onboarding_role();
    harness.deposit_eth(1, 32);
    let CycleOutcome::Registered { deposit_tx, .. } = harness
        .manager
        .run_onboarding_cycle(PERMISSIONED)
        .await
        .unwrap()
    else {
        panic!("expected a registered validator");
    };

    let registered: Vec<_> = harness
        .manager
        .events()
        .iter()
        .filter(|log| log.address == harness.config.registry_address)
        .filter_map(|log| IValidatorRegistry::ValidatorRegistered::decode_log_data(&log.data).ok())
        .collect();
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0].depositTx, deposit_tx);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_cycles_do_not_double_spend() {
    let harness = Harness::with_delay(Duration::from_secs(1))
        .permissioned_only(2)
        .grant_onboarding_role();
    harness.deposit_eth(1, 40);
    let manager = &harness.manager;

    let (first, second) = tokio::join!(
        manager.run_onboarding_cycle(PERMISSIONED),
        manager.run_onboarding_cycle(PERMISSIONED),
    );
    let outcomes = [first.unwrap(), second.unwrap()];
    assert_eq!(
        outcomes
            .iter()
            .filter(|outcome| matches!(outcome, CycleOutcome::Registered { .. }))
            .count(),
        1
    );
    assert!(outcomes.contains(&CycleOutcome::Idle));
    assert_eq!(manager.pool_balance(PERMISSIONED).unwrap(), units(8));
    assert_eq!(manager.validator_count(), 1);
    assert_eq!(harness.contract.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_cycles_fund_distinct_candidates() {
    let harness = Harness::with_delay(Duration::from_secs(1))
        .permissioned_only(2)
        .grant_onboarding_role();
    harness.deposit_eth(2, 32);
    harness.contract.fail_next(1);
    let manager = &harness.manager;

    // Leaves candidate 0 onboarded but unfunded.
    manager.run_onboarding_cycle(PERMISSIONED).await.unwrap_err();

    let (first, second) = tokio::join!(
        manager.run_onboarding_cycle(PERMISSIONED),
        manager.run_onboarding_cycle(PERMISSIONED),
    );
    let mut funded = [first.unwrap(), second.unwrap()]
        .into_iter()
        .map(|outcome| match outcome {
            CycleOutcome::Registered { candidate, .. } => candidate,
            CycleOutcome::Idle => panic!("both cycles should find an allotment"),
        })
        .collect::<Vec<_>>();
    funded.sort();
    assert_eq!(funded, [CandidateId(0), CandidateId(1)]);
    assert_eq!(manager.pool_balance(PERMISSIONED).unwrap(), U256::ZERO);
    assert_eq!(manager.total_forwarded(), units(64));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_cycle_returns_allotment() {
    let harness = Harness::with_delay(Duration::from_secs(30))
        .permissioned_only(1)
        .grant_onboarding_role();
    harness.deposit_eth(1, 33);
    let manager = &harness.manager;

    let cancelled = tokio::time::timeout(
        Duration::from_secs(1),
        manager.run_onboarding_cycle(PERMISSIONED),
    )
    .await;
    assert!(cancelled.is_err());

    assert_eq!(manager.pool_balance(PERMISSIONED).unwrap(), units(33));
    assert_eq!(manager.reserved_balance(PERMISSIONED).unwrap(), U256::ZERO);
    assert_eq!(
        manager.candidate(CandidateId(0)).unwrap().status,
        CandidateStatus::Onboarded { deposit_attempts: 1 }
    );
    assert_eq!(manager.registered_validator_count(), 0);
}

#[test]
fn test_zero_deposit_rejected() {
    let harness = Harness::new();
    assert_eq!(
        harness.manager.deposit(ALICE, U256::ZERO),
        Err(StakingPoolError::InvalidAmount(U256::ZERO))
    );
    assert!(harness.manager.deposits().is_empty());
}

#[test]
fn test_all_zero_weights_reject_deposits() {
    let harness = Harness::new();
    harness
        .manager
        .set_weights(harness.admin(), [(SSV, 0), (PERMISSIONED, 0)])
        .unwrap();
    assert_eq!(
        harness.manager.deposit(ALICE, units(1)),
        Err(StakingPoolError::NoRoutablePool)
    );
    assert_eq!(
        StakingPoolManagerError::abi_decode(&StakingPoolError::NoRoutablePool.to_revert()).unwrap(),
        StakingPoolManagerError::no_routable_pool()
    );
}

#[derive(Debug, Clone)]
enum Op {
    Deposit { staker: u8, milli_eth: u64 },
    Cycle { fail: bool },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u8..4, 1u64..40_000).prop_map(|(staker, milli_eth)| Op::Deposit { staker, milli_eth }),
        1 => any::<bool>().prop_map(|fail| Op::Cycle { fail }),
    ]
}

proptest! {
    #[test]
    fn prop_funds_are_conserved(ops in proptest::collection::vec(op(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let harness = Harness::new().permissioned_only(40).grant_onboarding_role();
        harness
            .manager
            .set_weights(harness.admin(), [(SSV, 30), (PERMISSIONED, 70)])
            .unwrap();
        let manager = &harness.manager;

        for op in ops {
            match op {
                Op::Deposit { staker, milli_eth } => {
                    let amount = U256::from(milli_eth) * U256::from(1_000_000_000_000_000u64);
                    manager.deposit(Address::repeat_byte(staker), amount).unwrap();
                }
                Op::Cycle { fail } => {
                    if fail {
                        harness.contract.fail_next(1);
                    }
                    let _ = runtime.block_on(manager.run_onboarding_cycle(PERMISSIONED));
                }
            }

            prop_assert_eq!(
                manager.total_pooled() + manager.total_forwarded(),
                manager.total_deposited()
            );
            prop_assert_eq!(
                manager.total_forwarded(),
                ALLOTMENT * U256::from(manager.registered_validator_count())
            );
            prop_assert_eq!(manager.reserved_balance(PERMISSIONED).unwrap(), U256::ZERO);
        }
    }
}
