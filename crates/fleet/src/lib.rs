// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! fleetd: orchestrates building AV/power devices (computers, projectors,
//! TVs, PDUs, BrightSign players, network switches) over an MQTT bus,
//! synced against an inventory HTTP API.

pub mod adapter;
pub mod bus;
pub mod config;
pub mod device;
pub mod error;
pub mod group;
pub mod manager;
pub mod scheduling;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::FleetConfig;
use crate::manager::ManagerState;

/// Runs the manager until `shutdown` fires: performs the initial inventory
/// sync, then drives the update tick and bus-message router concurrently.
pub async fn run(config: FleetConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let (bus, mut inbound) = bus::mqtt::spawn(&config, "fleetd");

    let manager = ManagerState::new(config.clone(), bus).await?;
    tracing::info!("starting initial inventory sync");
    manager.setup(true).await;

    let tick_manager = manager.clone();
    let tick_shutdown = shutdown.clone();
    let tick_handle = tokio::spawn(async move { tick_manager.run_update_tick(tick_shutdown).await });

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            message = inbound.recv() => {
                match message {
                    Some(message) => {
                        let manager = manager.clone();
                        tokio::spawn(async move { manager::router::route(&manager, message).await });
                    }
                    None => {
                        tracing::warn!("bus inbound channel closed, shutting down");
                        break;
                    }
                }
            }
        }
    }

    shutdown.cancel();
    let _ = tick_handle.await;
    Ok(())
}
