mod cmd;
mod config;

use anyhow::Result;
use clap::Parser;
use mgmt_agent::{agent::Agent, utils::tracing::init_tracing};
use tracing::info;

use crate::{cmd::Cli, config::Config};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let cli = Cli::parse();
    let config = Config::load(cli.config_path.clone()).await?.apply_cli(&cli);
    let agent_config = config.agent_config();

    let agent = Agent::start(&agent_config).await?;
    println!("{}", agent.service_url());

    tokio::signal::ctrl_c().await?;
    info!("shutting down management agent");
    agent.shutdown().await;

    Ok(())
}
