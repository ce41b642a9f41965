//! Vault Token Broker
//!
//! Issue short-lived, group-scoped Vault tokens to proxy-authenticated callers.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use vault_token_broker::{cli::Cli, config::Config, server::BrokerServer, setup_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(mut config) => {
            config.apply_cli(&cli);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        vault = %config.vault.address,
        port = config.server.port,
        redirect = config.delivery.redirect,
        "Starting Vault token broker"
    );

    let server = match BrokerServer::new(config).await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create broker: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run().await {
        error!("Broker error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Broker shutdown complete");
    ExitCode::SUCCESS
}
