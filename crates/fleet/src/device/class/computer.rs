// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::sync::Mutex;

use crate::adapter::WolSender;
use crate::bus::Qos;
use crate::device::{Action, Device, OnlineState};
use crate::error::AdapterError;

use super::wolable;

const WATCH_INTERVAL: Duration = Duration::from_secs(5);
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(30);
pub const WAKE_INTERVAL: Duration = Duration::from_secs(60);
pub const SHUTDOWN_RETRY_INTERVAL: Duration = Duration::from_secs(30);

/// Fields the on-device agent may publish to `probe/<fqdn>/<field>`. The
/// Python original dispatches these through `getattr(self, f"on_{field}")`;
/// here it's a closed match instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandledProbeField {
    Ping,
    Connected,
    Temperatures,
    Fans,
    IsMuted,
    Mute,
    Unmute,
    Shutdown,
    Other(String),
}

impl HandledProbeField {
    pub fn parse(field: &str) -> Self {
        match field {
            "ping" => Self::Ping,
            "connected" => Self::Connected,
            "temperatures" => Self::Temperatures,
            "fans" => Self::Fans,
            "is_muted" => Self::IsMuted,
            "mute" => Self::Mute,
            "unmute" => Self::Unmute,
            "shutdown" => Self::Shutdown,
            other => Self::Other(other.to_owned()),
        }
    }
}

pub struct ComputerState {
    pub wol: Arc<dyn WolSender>,
    last_ping_time: Mutex<Option<Instant>>,
}

impl ComputerState {
    pub fn new(wol: Arc<dyn WolSender>) -> Self {
        Self { wol, last_ping_time: Mutex::new(None) }
    }
}

/// `probe/<fqdn>/<field>` dispatch for computers: the MQTT heartbeat drives
/// `is_online` directly rather than ICMP, per §4.3's "does not ICMP".
pub async fn on_probe_field(device: &Arc<Device>, state: &ComputerState, field: &str, payload: &serde_json::Value) {
    match HandledProbeField::parse(field) {
        HandledProbeField::Ping => {
            *state.last_ping_time.lock().await = Some(Instant::now());
            device.event("ping", json!(true)).await;
        }
        HandledProbeField::Connected => device.event("connected", payload.clone()).await,
        HandledProbeField::Temperatures => device.event("temperatures", payload.clone()).await,
        HandledProbeField::Fans => device.event("fans", payload.clone()).await,
        HandledProbeField::IsMuted => device.event("is_muted", payload.clone()).await,
        HandledProbeField::Mute | HandledProbeField::Unmute | HandledProbeField::Shutdown => {
            device.event(field, payload.clone()).await
        }
        HandledProbeField::Other(name) => device.event(&name, payload.clone()).await,
    }
}

pub async fn update(device: &Arc<Device>, state: &ComputerState) {
    let immediate = !device.online.read().await.is_initialized();
    let memo = device.memoized("computer_watch", WATCH_INTERVAL).await;
    if !memo.should_run(immediate).await {
        return;
    }

    let last_ping = *state.last_ping_time.lock().await;
    let alive = last_ping.is_some_and(|t| t.elapsed() < HEARTBEAT_TIMEOUT);
    memo.finish();

    if alive {
        // A reboot in flight must not be reported ON by a heartbeat that
        // slipped in before the machine actually restarted.
        if !device.actions.read().await.should_reboot {
            device.set_is_online(OnlineState::On).await;
        }
        return;
    }

    let previous = device.is_online().await;
    device.set_is_online(OnlineState::Off).await;
    if previous == OnlineState::On && device.identity.read().await.has_power_feeds() {
        let _ = device.set_power(false).await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        let _ = device.set_power(true).await;
    }
}

pub fn action_interval(action: Action) -> Duration {
    match action {
        Action::Wake => WAKE_INTERVAL,
        _ => SHUTDOWN_RETRY_INTERVAL,
    }
}

pub async fn attempt(device: &Arc<Device>, state: &ComputerState, action: Action) -> Result<(), AdapterError> {
    match action {
        Action::Wake => wolable::wake_via_wol(device, &state.wol).await,
        Action::Shutdown => {
            publish_command(device, "shutdown").await;
            Ok(())
        }
        Action::Mute => {
            publish_command(device, "mute").await;
            Ok(())
        }
        Action::Unmute => {
            publish_command(device, "unmute").await;
            Ok(())
        }
        Action::Reboot => {
            publish_command(device, "reboot").await;
            Ok(())
        }
    }
}

/// `shutdown`/`mute`/`unmute` are best-effort publishes to the on-device
/// agent's command topic; no ACK protocol exists, so the action loop relies
/// on heartbeat loss (for shutdown) to observe the outcome.
async fn publish_command(device: &Device, command: &str) {
    let fqdn = device.name().await;
    device.bus.publish_empty(format!("manager/{fqdn}/{command}"), Qos::AtLeastOnce);
}
