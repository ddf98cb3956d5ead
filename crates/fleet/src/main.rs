// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::error;

use fleetd::config::FleetConfig;

#[derive(Parser)]
#[command(name = "fleetd", version, about = "Building AV/power device orchestrator.")]
struct Cli {
    #[command(flatten)]
    config: FleetConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let shutdown = CancellationToken::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        signal_shutdown.cancel();
    });

    if let Err(e) = fleetd::run(cli.config, shutdown).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
