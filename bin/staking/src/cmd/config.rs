use clap::Parser;
use eyre::Result;
use otter_staking_pool::{RpcDepositContract, StakingConfig, config::DepositContractConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Path to staking config file. Uses the built-in test config when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip querying the deposit contract in rpc mode.
    #[arg(long)]
    offline: bool,
}

impl ConfigArgs {
    pub async fn run(self) -> Result<()> {
        let config = match &self.config {
            Some(path) => StakingConfig::load(path)?,
            None => StakingConfig::default_test_config(),
        };

        println!("Staking Config");
        println!("==============");
        println!();
        println!("  Admin:             {}", config.admin);
        println!("  Pool manager:      {}", config.manager_address);
        println!("  Registry:          {}", config.registry_address);
        println!("  Onboarding role:   {}", config.onboarding_role);
        println!("  Deposit contract:  {:?}", config.deposit_contract);
        println!("  Deposit timeout:   {}s", config.deposit_timeout_secs);
        println!("  Retry interval:    {}s", config.retry_interval_secs);
        if let DepositContractConfig::Rpc { rpc_url, address, .. } = &config.deposit_contract &&
            !self.offline
        {
            match deposit_count(rpc_url, *address).await {
                Ok(count) => println!("  Deposits accepted: {count}"),
                Err(err) => println!("  Deposits accepted: unavailable ({err:#})"),
            }
        }
        println!();
        println!("Pools:");
        for pool in &config.pools {
            println!(
                "  {:>3}  {:<16} {}  weight {:>3}%",
                pool.id, pool.name, pool.address, pool.weight
            );
        }

        Ok(())
    }
}

async fn deposit_count(rpc_url: &str, address: alloy_primitives::Address) -> Result<u64> {
    RpcDepositContract::connect_read_only(rpc_url, address).await?.deposit_count().await
}
