// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use serde_json::json;

use crate::adapter::IcmpProbe;
use crate::device::{Device, OnlineState};

pub struct IcmpableState {
    pub icmp: Arc<dyn IcmpProbe>,
}

impl IcmpableState {
    pub fn new(icmp: Arc<dyn IcmpProbe>) -> Self {
        Self { icmp }
    }
}

/// Shared ICMP watch loop: ping on `config.icmp_interval()`, set `is_online`
/// to ON or OFF. Reused directly by `Wolable`'s update via [`watch`].
pub async fn update(device: &Arc<Device>, state: &IcmpableState) {
    watch(device, &state.icmp).await;
}

pub async fn watch(device: &Arc<Device>, icmp: &Arc<dyn IcmpProbe>) {
    let interval = device.config.icmp_interval();
    let immediate = !device.online.read().await.is_initialized();
    let memo = device.memoized("icmp", interval).await;
    if !memo.should_run(immediate).await {
        return;
    }

    let ip = device.identity.read().await.primary_ip;
    let result = match ip {
        Some(ip) => icmp.ping(ip).await,
        None => Ok(false),
    };
    memo.finish();

    match result {
        Ok(true) => device.set_is_online(OnlineState::On).await,
        Ok(false) => device.set_is_online(OnlineState::Off).await,
        Err(err) => {
            device.set_is_online(OnlineState::Off).await;
            device.event("ping_error", json!(err.to_string())).await;
        }
    }
}
