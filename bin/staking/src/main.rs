use clap::Parser;
use opts::{StakingCli, StakingSubcommand};

mod cmd;
mod opts;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = StakingCli::parse();

    match args.cmd {
        StakingSubcommand::Simulate(cmd) => cmd.run().await,
        StakingSubcommand::Config(cmd) => cmd.run().await,
    }
}
