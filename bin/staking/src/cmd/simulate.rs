use alloy_primitives::{Address, B256, U256, utils::format_ether, utils::parse_ether};
use clap::{Parser, ValueEnum};
use eyre::{Result, WrapErr};
use otter_staking_pool::{
    CycleOutcome, EngineSnapshot, PoolId, PoolManager, StakingConfig, ValidatorCredentials,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Path to staking config file. Uses the built-in test config when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the scenario JSON file
    #[arg(short, long)]
    scenario: PathBuf,

    /// Output format for the final state
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Stop at the first step that fails
    #[arg(long)]
    fail_fast: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Ordered list of actions replayed against a fresh engine.
#[derive(Debug, Deserialize)]
pub struct Scenario {
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Staker deposit, `amount` in ether (e.g. `"10"` or `"0.5"`).
    Deposit {
        staker: Address,
        #[serde(deserialize_with = "ether")]
        amount: U256,
    },
    /// Weight update. The caller defaults to the configured admin.
    SetWeights {
        weights: Vec<PoolWeight>,
        #[serde(default)]
        caller: Option<Address>,
    },
    /// Grants `role` (default: the onboarding role) for `pool` to `account` (default: the pool's
    /// own address).
    GrantRole {
        pool: PoolId,
        #[serde(default)]
        role: Option<B256>,
        #[serde(default)]
        account: Option<Address>,
        #[serde(default)]
        caller: Option<Address>,
    },
    RevokeRole {
        pool: PoolId,
        #[serde(default)]
        role: Option<B256>,
        #[serde(default)]
        account: Option<Address>,
        #[serde(default)]
        caller: Option<Address>,
    },
    AddValidatorKeys {
        pool: PoolId,
        keys: Vec<ValidatorCredentials>,
    },
    /// Runs one onboarding cycle for `pool`.
    Onboard { pool: PoolId },
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PoolWeight {
    pub pool: PoolId,
    pub weight: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StepReport {
    index: usize,
    action: &'static str,
    result: String,
    /// ABI-encoded revert data when the step failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    revert: Option<String>,
}

#[derive(Debug, Serialize)]
struct Report {
    steps: Vec<StepReport>,
    state: EngineSnapshot,
}

impl SimulateArgs {
    pub async fn run(self) -> Result<()> {
        let config = match &self.config {
            Some(path) => StakingConfig::load(path)?,
            None => StakingConfig::default_test_config(),
        };
        let scenario = load_scenario(&self.scenario)?;
        let deposit_contract = config.deposit_contract.connect().await?;
        let manager = PoolManager::from_config(&config, deposit_contract)
            .wrap_err("failed to initialise pool manager")?;

        let mut steps = Vec::with_capacity(scenario.steps.len());
        for (index, step) in scenario.steps.into_iter().enumerate() {
            let action = step.action();
            let report = match apply(&manager, &config, step).await {
                Ok(result) => {
                    info!(index, action, %result, "Step applied");
                    StepReport {
                        index,
                        action,
                        result,
                        revert: None,
                    }
                }
                Err(err) => {
                    warn!(index, action, %err, "Step failed");
                    let report = StepReport {
                        index,
                        action,
                        result: err.to_string(),
                        revert: Some(err.to_revert().to_string()),
                    };
                    if self.fail_fast {
                        return Err(eyre::eyre!("step {index} ({action}) failed: {err}"));
                    }
                    report
                }
            };
            steps.push(report);
        }

        let report = Report {
            steps,
            state: manager.snapshot(),
        };
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Table => print_table(&report),
        }
        Ok(())
    }
}

impl Step {
    const fn action(&self) -> &'static str {
        match self {
            Self::Deposit { .. } => "deposit",
            Self::SetWeights { .. } => "set_weights",
            Self::GrantRole { .. } => "grant_role",
            Self::RevokeRole { .. } => "revoke_role",
            Self::AddValidatorKeys { .. } => "add_validator_keys",
            Self::Onboard { .. } => "onboard",
        }
    }
}

fn ether<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_ether(&raw).map_err(serde::de::Error::custom)
}

fn load_scenario(path: &Path) -> Result<Scenario> {
    let raw = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read scenario {}", path.display()))?;
    serde_json::from_str(&raw)
        .wrap_err_with(|| format!("failed to parse scenario {}", path.display()))
}

async fn apply(
    manager: &PoolManager,
    config: &StakingConfig,
    step: Step,
) -> otter_staking_pool::Result<String> {
    let account_for = |pool: PoolId| {
        config
            .pools
            .iter()
            .find(|p| p.id == pool)
            .map_or(Address::ZERO, |p| p.address)
    };

    match step {
        Step::Deposit { staker, amount } => {
            let deposits = manager.deposit(staker, amount)?;
            let shares = deposits
                .iter()
                .map(|d| format!("pool {}: {} ETH", d.pool, format_ether(d.amount)))
                .collect::<Vec<_>>()
                .join(", ");
            Ok(format!("{} ETH from {staker} ({shares})", format_ether(amount)))
        }
        Step::SetWeights { weights, caller } => {
            manager.set_weights(
                caller.unwrap_or(config.admin),
                weights.iter().map(|w| (w.pool, w.weight)),
            )?;
            Ok(format!("{} pool weights set", weights.len()))
        }
        Step::GrantRole {
            pool,
            role,
            account,
            caller,
        } => {
            let account = account.unwrap_or_else(|| account_for(pool));
            let role = role.unwrap_or(config.onboarding_role);
            let granted =
                manager.grant_role(caller.unwrap_or(config.admin), pool, role, account)?;
            Ok(if granted {
                format!("granted {role} on pool {pool} to {account}")
            } else {
                format!("{account} already holds {role} on pool {pool}")
            })
        }
        Step::RevokeRole {
            pool,
            role,
            account,
            caller,
        } => {
            let account = account.unwrap_or_else(|| account_for(pool));
            let role = role.unwrap_or(config.onboarding_role);
            let revoked =
                manager.revoke_role(caller.unwrap_or(config.admin), pool, role, account)?;
            Ok(if revoked {
                format!("revoked {role} on pool {pool} from {account}")
            } else {
                format!("{account} does not hold {role} on pool {pool}")
            })
        }
        Step::AddValidatorKeys { pool, keys } => {
            let queued = manager.add_validator_keys(config.admin, pool, keys)?;
            Ok(format!("{queued} keys queued for pool {pool}"))
        }
        Step::Onboard { pool } => match manager.run_onboarding_cycle(pool).await? {
            CycleOutcome::Idle => Ok(format!("pool {pool} cannot fund a validator")),
            CycleOutcome::Registered {
                candidate,
                deposit_tx,
                ..
            } => Ok(format!(
                "validator {candidate} registered from pool {pool} (deposit {deposit_tx})"
            )),
        },
    }
}

fn print_table(report: &Report) {
    println!("Steps");
    println!("=====");
    for step in &report.steps {
        let marker = if step.revert.is_some() { "x" } else { "+" };
        println!("  [{marker}] {:>3} {:<20} {}", step.index, step.action, step.result);
    }
    println!();

    let state = &report.state;
    println!("Pools");
    println!("=====");
    println!(
        "  {:>3}  {:<16} {:>7} {:>24} {:>24} {:>5}",
        "id", "name", "weight", "balance (ETH)", "reserved (ETH)", "keys"
    );
    for pool in &state.pools {
        println!(
            "  {:>3}  {:<16} {:>6}% {:>24} {:>24} {:>5}",
            pool.id,
            pool.name,
            pool.weight,
            format_ether(pool.balance),
            format_ether(pool.reserved),
            pool.queued_keys
        );
    }
    println!();
    println!("Totals");
    println!("======");
    println!("  Deposited:             {} ETH", format_ether(state.total_deposited));
    println!("  Pooled:                {} ETH", format_ether(state.total_pooled()));
    println!("  Forwarded:             {} ETH", format_ether(state.total_forwarded));
    println!("  Validators onboarded:  {}", state.validator_count);
    println!("  Validators registered: {}", state.registered_validator_count);
}

#[cfg(test)]
mod tests {
    use super::*;
    use otter_staking_pool::units;
    use std::io::Write;

    const SCENARIO: &str = r#"{
        "steps": [
            { "action": "set_weights", "weights": [{ "pool": 0, "weight": 0 }, { "pool": 1, "weight": 100 }] },
            { "action": "onboard", "pool": 1 },
            { "action": "grant_role", "pool": 1 },
            { "action": "add_validator_keys", "pool": 1, "keys": [{
                "pubkey": "0x010101010101010101010101010101010101010101010101010101010101010101010101010101010101010101010101",
                "withdrawalCredentials": "0x0100000000000000000000000000000000000000000000000000000000000001",
                "signature": "0x02",
                "depositDataRoot": "0x0000000000000000000000000000000000000000000000000000000000000003"
            }] },
            { "action": "deposit", "staker": "0x00000000000000000000000000000000000000a1", "amount": "10" },
            { "action": "deposit", "staker": "0x00000000000000000000000000000000000000a2", "amount": "10" },
            { "action": "deposit", "staker": "0x00000000000000000000000000000000000000a1", "amount": "10" },
            { "action": "deposit", "staker": "0x00000000000000000000000000000000000000a2", "amount": "10" },
            { "action": "deposit", "staker": "0x00000000000000000000000000000000000000a1", "amount": "10" },
            { "action": "onboard", "pool": 1 }
        ]
    }"#;

    #[tokio::test]
    async fn test_scenario_replay() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SCENARIO.as_bytes()).unwrap();
        let scenario = load_scenario(file.path()).unwrap();
        assert_eq!(scenario.steps.len(), 10);

        let config = StakingConfig::default_test_config();
        let manager = PoolManager::from_config(
            &config,
            std::sync::Arc::new(otter_staking_pool::DryRunDepositContract::new()),
        )
        .unwrap();

        let mut failures = 0;
        for step in scenario.steps {
            if apply(&manager, &config, step).await.is_err() {
                failures += 1;
            }
        }

        // Onboarding before funding is idle, not an error.
        assert_eq!(failures, 0);
        let state = manager.snapshot();
        assert_eq!(state.registered_validator_count, 1);
        assert_eq!(state.pool(PoolId(1)).unwrap().balance, units(18));
        assert_eq!(state.total_forwarded, units(32));
    }

    #[test]
    fn test_deposit_amounts_are_parsed_as_ether() {
        let step: Step = serde_json::from_str(
            r#"{ "action": "deposit", "staker": "0x00000000000000000000000000000000000000a1", "amount": "1.5" }"#,
        )
        .unwrap();
        let Step::Deposit { amount, .. } = step else {
            panic!("expected a deposit step");
        };
        assert_eq!(amount, units(3) / U256::from(2));

        assert!(
            serde_json::from_str::<Step>(
                r#"{ "action": "deposit", "staker": "0x00000000000000000000000000000000000000a1", "amount": "ten" }"#,
            )
            .is_err()
        );
    }

    #[tokio::test]
    async fn test_unauthorized_weight_update_is_reported() {
        let config = StakingConfig::default_test_config();
        let manager = PoolManager::from_config(
            &config,
            std::sync::Arc::new(otter_staking_pool::DryRunDepositContract::new()),
        )
        .unwrap();
        let step = Step::SetWeights {
            weights: vec![PoolWeight {
                pool: PoolId(1),
                weight: 100,
            }],
            caller: Some(Address::repeat_byte(0x42)),
        };

        let err = apply(&manager, &config, step).await.unwrap_err();
        assert!(matches!(
            err,
            otter_staking_pool::StakingPoolError::Unauthorized { .. }
        ));
        assert!(!err.to_revert().is_empty());
    }
}
