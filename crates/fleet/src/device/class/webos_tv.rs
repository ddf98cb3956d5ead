// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::adapter::{IcmpProbe, WebosSession, WolSender};
use crate::device::{Action, Device, OnlineState};
use crate::error::AdapterError;

use super::credential_store::CredentialStore;
use super::wolable;

const PING_INTERVAL: Duration = Duration::from_secs(10);
const REGISTER_DEADLINE: Duration = Duration::from_secs(10);
pub const WAKE_INTERVAL: Duration = Duration::from_secs(60);
pub const SHUTDOWN_RETRY_INTERVAL: Duration = Duration::from_secs(10);

pub struct WebosTvState {
    pub icmp: Arc<dyn IcmpProbe>,
    pub wol: Arc<dyn WolSender>,
    pub webos: Arc<dyn WebosSession>,
    pub credentials: Arc<dyn CredentialStore>,
    session_key: Mutex<Option<String>>,
}

impl WebosTvState {
    pub fn new(
        icmp: Arc<dyn IcmpProbe>,
        wol: Arc<dyn WolSender>,
        webos: Arc<dyn WebosSession>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self { icmp, wol, webos, credentials, session_key: Mutex::new(None) }
    }
}

pub async fn update(device: &Arc<Device>, state: &WebosTvState) {
    let immediate = !device.online.read().await.is_initialized();
    let memo = device.memoized("webos_ping", PING_INTERVAL).await;
    if !memo.should_run(immediate).await {
        return;
    }

    let result = poll(device, state).await;
    memo.finish();
    if let Err(err) = result {
        device.emit_error("webos_ping", &err).await;
    }
}

async fn poll(device: &Arc<Device>, state: &WebosTvState) -> Result<(), AdapterError> {
    let ip = device
        .identity
        .read()
        .await
        .primary_ip
        .ok_or_else(|| AdapterError::unreachable("tv has no primary ip"))?;

    if !state.icmp.ping(ip).await? {
        device.set_is_online(OnlineState::Off).await;
        *state.session_key.lock().await = None;
        return Ok(());
    }

    device.set_is_online(OnlineState::Partial).await;

    if state.session_key.lock().await.is_some() {
        return Ok(());
    }

    let name = device.name().await;
    let stored = state.credentials.load(&name).await?;
    let register = tokio::time::timeout(
        REGISTER_DEADLINE,
        state.webos.connect_and_register(ip, stored.as_deref()),
    )
    .await
    .map_err(|_| AdapterError::timeout("webos registration timed out"))??;

    state.credentials.save(&name, &register).await?;
    *state.session_key.lock().await = Some(register);
    device.set_is_online(OnlineState::On).await;
    Ok(())
}

pub fn action_interval(action: Action) -> Duration {
    match action {
        Action::Wake => WAKE_INTERVAL,
        _ => SHUTDOWN_RETRY_INTERVAL,
    }
}

pub async fn attempt(device: &Arc<Device>, state: &WebosTvState, action: Action) -> Result<(), AdapterError> {
    match action {
        Action::Wake => wolable::wake_via_wol(device, &state.wol).await,
        Action::Shutdown => {
            let ip = device
                .identity
                .read()
                .await
                .primary_ip
                .ok_or_else(|| AdapterError::unreachable("tv has no primary ip"))?;
            let key = state.session_key.lock().await.clone();
            match key {
                Some(key) => state.webos.power_off(ip, &key).await,
                None => Err(AdapterError::unsupported("no registered webos session yet")),
            }
        }
        _ => Err(AdapterError::unsupported("webos tvs only support wake/shutdown")),
    }
}
