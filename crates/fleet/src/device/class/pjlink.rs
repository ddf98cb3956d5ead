// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::adapter::{IcmpProbe, PjlinkPower, PjlinkSession};
use crate::device::{Action, Device, OnlineState};
use crate::error::AdapterError;

const POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const ACTION_INTERVAL: Duration = Duration::from_secs(10);
const FEED_POWER_OFF_DELAY: Duration = Duration::from_secs(300);

pub struct PjlinkState {
    pub icmp: Arc<dyn IcmpProbe>,
    pub pjlink: Arc<dyn PjlinkSession>,
}

impl PjlinkState {
    pub fn new(icmp: Arc<dyn IcmpProbe>, pjlink: Arc<dyn PjlinkSession>) -> Self {
        Self { icmp, pjlink }
    }
}

pub async fn update(device: &Arc<Device>, state: &PjlinkState) {
    let immediate = !device.online.read().await.is_initialized();
    let memo = device.memoized("pjlink_poll", POLL_INTERVAL).await;
    if !memo.should_run(immediate).await {
        return;
    }

    let result = poll(device, state).await;
    memo.finish();
    if let Err(err) = result {
        device.emit_error("pjlink_poll", &err).await;
    }
}

async fn poll(device: &Arc<Device>, state: &PjlinkState) -> Result<(), AdapterError> {
    let ip = match device.identity.read().await.primary_ip {
        Some(ip) => ip,
        None => return Err(AdapterError::unreachable("device has no primary ip")),
    };

    if !state.icmp.ping(ip).await? {
        device.set_is_online(OnlineState::Off).await;
        reset_transient_fields(device).await;
        return Ok(());
    }

    let password = device.config.pjlink_password.clone();
    let status = {
        let _guard = device.adapter_lock.lock().await;
        state.pjlink.query(ip, &password).await?
    };

    // OFF is reported only when the projector is unreachable (above); a
    // pingable projector that reports a PJLink power state of "off" is
    // still PARTIAL, since it answers queries and can still be woken.
    let online = match status.power {
        Some(PjlinkPower::On) => OnlineState::On,
        _ => OnlineState::Partial,
    };
    device.set_is_online(online).await;
    device.event("lamps", json!(status.lamps)).await;
    device.event("errors", json!(status.errors)).await;
    if let Some(resolution) = status.resolution {
        device.event("resolution", json!(resolution)).await;
    }
    Ok(())
}

async fn reset_transient_fields(device: &Device) {
    device.event("lamps", json!(Vec::<(bool, u32)>::new())).await;
    device.event("errors", json!({})).await;
}

pub async fn attempt(device: &Arc<Device>, state: &PjlinkState, action: Action) -> Result<(), AdapterError> {
    let ip = device
        .identity
        .read()
        .await
        .primary_ip
        .ok_or_else(|| AdapterError::unreachable("device has no primary ip"))?;
    let password = device.config.pjlink_password.clone();

    match action {
        Action::Wake => {
            let _guard = device.adapter_lock.lock().await;
            state.pjlink.set_power(ip, &password, true).await
        }
        Action::Shutdown => {
            let _guard = device.adapter_lock.lock().await;
            state.pjlink.set_power(ip, &password, false).await
        }
        _ => Err(AdapterError::unsupported("pjlink devices only support wake/shutdown")),
    }
}

/// After a shutdown loop reaches its target, the feed is powered off 300s
/// later to let the projector finish its cooling cycle first.
pub async fn on_action_complete(device: &Arc<Device>, _state: &PjlinkState, action: Action) {
    if action != Action::Shutdown {
        return;
    }
    let device = device.clone();
    tokio::spawn(async move {
        tokio::time::sleep(FEED_POWER_OFF_DELAY).await;
        let _ = device.set_power(false).await;
    });
}
