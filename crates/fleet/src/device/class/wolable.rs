// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use crate::adapter::{IcmpProbe, WolSender};
use crate::device::{Action, Device};
use crate::error::AdapterError;

use super::icmpable;

pub const ACTION_INTERVAL: Duration = Duration::from_secs(60);

pub struct WolableState {
    pub icmp: Arc<dyn IcmpProbe>,
    pub wol: Arc<dyn WolSender>,
}

impl WolableState {
    pub fn new(icmp: Arc<dyn IcmpProbe>, wol: Arc<dyn WolSender>) -> Self {
        Self { icmp, wol }
    }
}

pub async fn update(device: &Arc<Device>, state: &WolableState) {
    icmpable::watch(device, &state.icmp).await;
}

pub async fn attempt(device: &Arc<Device>, state: &WolableState, action: Action) -> Result<(), AdapterError> {
    match action {
        Action::Wake => wake_via_wol(device, &state.wol).await,
        _ => Err(AdapterError::unsupported("wolable devices only support wake")),
    }
}

/// If the device has power feeds, switches them on first and waits a
/// staggered 5-10s before sending the magic packet, matching the
/// "power feeds before WOL" ordering every wake-capable class shares.
pub async fn wake_via_wol(device: &Device, wol: &Arc<dyn WolSender>) -> Result<(), AdapterError> {
    if device.identity.read().await.has_power_feeds() {
        device.set_power(true).await?;
        let stagger = Duration::from_millis(5000 + (rand::random::<u64>() % 5000));
        tokio::time::sleep(stagger).await;
    }

    let macs = device.identity.read().await.interfaces.clone();
    if macs.is_empty() {
        return Err(AdapterError::unsupported("device has no network interfaces to wake"));
    }
    for mac in &macs {
        wol.send_magic_packet(mac).await?;
    }
    Ok(())
}
