//! notype Server: application entry point.

use std::time::Duration;

use clap::Parser;
use notype_server::{Config, Services};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("notype=info".parse()?))
        .json()
        .init();

    let config = Config::parse();
    info!("Starting notype server...");

    let services = Services::build(&config).await?;
    sweep_sessions(&services, config.sweep_interval()).await;

    info!("notype server stopped.");
    Ok(())
}

/// Purge expired sessions every `period` until Ctrl-C.
async fn sweep_sessions(services: &Services, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = services.sessions.purge_expired().await {
                    error!(error = %e, "Session sweep failed");
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }
}
