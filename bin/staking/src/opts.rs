use crate::cmd::{config::ConfigArgs, simulate::SimulateArgs};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "staking")]
#[command(version, about = "Liquid-staking deposit pooling and validator onboarding", long_about = None)]
pub struct StakingCli {
    #[command(subcommand)]
    pub cmd: StakingSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum StakingSubcommand {
    /// Replay a scenario of deposits, weight updates and onboarding cycles
    Simulate(SimulateArgs),

    /// Validate a config file and print the effective settings
    Config(ConfigArgs),
}
