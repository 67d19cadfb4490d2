//! toolhub - personal automation hub
//!
//! Credential broker + protocol gateway for a personal automation stack.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use toolhub::{
    broker::Broker,
    cli::{Cli, Command},
    config::Config,
    gateway::Gateway,
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env before config so TOOLHUB_* variables resolve
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Some(Command::Broker) => run_broker(&config).await,
        Some(Command::Gateway) => run_gateway(&config).await,
        Some(Command::Serve) | None => run_both(&config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Fatal");
            ExitCode::FAILURE
        }
    }
}

async fn run_broker(config: &Config) -> anyhow::Result<()> {
    let broker = Broker::new(config)?;
    broker.run().await?;
    Ok(())
}

async fn run_gateway(config: &Config) -> anyhow::Result<()> {
    // Standalone gateway: no in-process broker binding; the resolver uses
    // its network tier (and static fallback) instead.
    let gateway = Gateway::new(config, None)?;
    gateway.run().await?;
    Ok(())
}

async fn run_both(config: &Config) -> anyhow::Result<()> {
    let broker = Broker::new(config)?;
    // Direct binding: the gateway's resolver issues tokens in-process.
    let gateway = Gateway::new(config, Some(broker.issuer()))?;

    tokio::try_join!(broker.run(), gateway.run())?;
    Ok(())
}
