// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use crate::adapter::DigestReboot;
use crate::device::{Action, Device};
use crate::error::AdapterError;

pub const ACTION_INTERVAL: Duration = Duration::from_secs(900);

const USERNAME: &str = "admin";
const PASSWORD: &str = "avm";

pub struct BrightSignState {
    pub digest: Arc<dyn DigestReboot>,
}

impl BrightSignState {
    pub fn new(digest: Arc<dyn DigestReboot>) -> Self {
        Self { digest }
    }
}

/// `reboot` is BrightSign's only capability and has no state to converge
/// toward, so a successful attempt clears `should_reboot` itself rather
/// than waiting on an `is_online` transition the class never tracks.
pub async fn attempt(device: &Arc<Device>, state: &BrightSignState, action: Action) -> Result<(), AdapterError> {
    if action != Action::Reboot {
        return Err(AdapterError::unsupported("brightsign players only support reboot"));
    }

    let ip = device
        .identity
        .read()
        .await
        .primary_ip
        .ok_or_else(|| AdapterError::unreachable("player has no primary ip"))?;

    state.digest.reboot(ip, USERNAME, PASSWORD).await?;
    device.actions.write().await.should_reboot = false;
    Ok(())
}
