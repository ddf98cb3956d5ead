// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Device` state holder and per-device scheduler: runs update methods
//! and target-driven action loops, polymorphic over capability set via
//! [`ClassSlot`].

pub mod class;
pub mod state;

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::adapter::AdapterFuture;
use crate::bus::{BusHandle, Qos};
use crate::config::FleetConfig;
use crate::error::{AdapterError, ErrorEvent};
use crate::scheduling::{repeat_until, Memoized, RetryOutcome};

pub use state::{ActionFlags, Capability, OnlineState, OnlineTracker};

pub type DeviceId = u64;

/// Resolves a `(panel_name, feed_index)` power link to the PDU device that
/// owns it and writes the outlet, the indirection `Device::set_power` needs
/// since a device cannot look its own PDU up in the global device map.
/// Implemented by `manager::ManagerState` over its device-by-name index.
pub trait PowerFeedResolver: Send + Sync {
    fn write_feed<'a>(&'a self, panel_name: &'a str, feed_index: u32, on: bool) -> AdapterFuture<'a, ()>;
}

/// A resolver for devices with no power feeds at all (the common case);
/// any call is a programming error since `set_power` only consults it when
/// `has_power_feeds()` is true.
pub struct NullPowerFeedResolver;

impl PowerFeedResolver for NullPowerFeedResolver {
    fn write_feed<'a>(&'a self, _panel_name: &'a str, _feed_index: u32, _on: bool) -> AdapterFuture<'a, ()> {
        Box::pin(async { Err(AdapterError::unsupported("no power feed resolver configured")) })
    }
}

/// A single outlet on a PDU that a device's power port resolves to.
#[derive(Debug, Clone, Serialize)]
pub struct PowerLinkPeer {
    pub panel_name: String,
    pub feed_index: u32,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct PowerPort {
    pub link_peers: Vec<PowerLinkPeer>,
}

/// Inventory-derived identity fields, mutated wholesale on resync.
#[derive(Debug, Clone, Default)]
pub struct DeviceIdentity {
    pub name: String,
    pub role: String,
    pub location_id: Option<DeviceId>,
    pub tags: Vec<String>,
    pub interfaces: Vec<String>,
    pub primary_ip: Option<IpAddr>,
    pub power_ports: Vec<PowerPort>,
    pub model: Option<String>,
}

impl DeviceIdentity {
    pub fn is_monitoring_only(&self) -> bool {
        self.tags.iter().any(|t| t == "ctrl mon")
    }

    pub fn has_power_feeds(&self) -> bool {
        self.power_ports.iter().any(|p| !p.link_peers.is_empty())
    }
}

/// Action a target-driven loop or one-shot command performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Wake,
    Shutdown,
    Reboot,
    Mute,
    Unmute,
}

impl Action {
    pub fn slot_name(&self) -> &'static str {
        match self {
            Self::Wake => "wake",
            Self::Shutdown => "shutdown",
            Self::Reboot => "reboot",
            Self::Mute => "mute",
            Self::Unmute => "unmute",
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            Self::Wake => Capability::Wake,
            Self::Shutdown => Capability::Shutdown,
            Self::Reboot => Capability::Reboot,
            Self::Mute => Capability::Mute,
            Self::Unmute => Capability::Unmute,
        }
    }
}

/// Wire shape for `manager/device_event`'s `{data:{event:{target, type,
/// value}}}` body.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceEvent {
    pub target: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: serde_json::Value,
}

pub struct Device {
    pub id: DeviceId,
    pub identity: RwLock<DeviceIdentity>,
    pub online: RwLock<OnlineTracker>,
    pub actions: RwLock<ActionFlags>,
    pub class: class::ClassSlot,
    slots: Mutex<HashMap<&'static str, (JoinHandle<()>, CancellationToken)>>,
    pub adapter_lock: Mutex<()>,
    last_emitted: RwLock<HashMap<String, serde_json::Value>>,
    memos: Mutex<HashMap<&'static str, Arc<Memoized>>>,
    pub bus: BusHandle,
    pub config: Arc<FleetConfig>,
    power: Arc<dyn PowerFeedResolver>,
}

impl Device {
    pub fn new(
        id: DeviceId,
        identity: DeviceIdentity,
        class: class::ClassSlot,
        bus: BusHandle,
        config: Arc<FleetConfig>,
        power: Arc<dyn PowerFeedResolver>,
    ) -> Self {
        Self {
            id,
            identity: RwLock::new(identity),
            online: RwLock::new(OnlineTracker::new()),
            actions: RwLock::new(ActionFlags::default()),
            class,
            slots: Mutex::new(HashMap::new()),
            adapter_lock: Mutex::new(()),
            last_emitted: RwLock::new(HashMap::new()),
            memos: Mutex::new(HashMap::new()),
            bus,
            config,
            power,
        }
    }

    /// Returns the probe-keyed [`Memoized`] runner for `key`, creating one
    /// seeded with `interval` on first use. Kept per-device (not global),
    /// matching §4.1's per-device-map redesign.
    pub async fn memoized(&self, key: &'static str, interval: Duration) -> Arc<Memoized> {
        self.memos
            .lock()
            .await
            .entry(key)
            .or_insert_with(|| Arc::new(Memoized::new(interval)))
            .clone()
    }

    /// Iterates this device's power ports and asks each linked PDU to write
    /// the feed, the way a powered-off computer or display is switched on
    /// before a wake attempt.
    pub async fn set_power(&self, on: bool) -> Result<(), AdapterError> {
        let ports = self.identity.read().await.power_ports.clone();
        for port in &ports {
            for peer in &port.link_peers {
                self.power.write_feed(&peer.panel_name, peer.feed_index, on).await?;
            }
        }
        Ok(())
    }

    pub async fn name(&self) -> String {
        self.identity.read().await.name.clone()
    }

    /// Applies a resynced inventory record. Identity is mutated in place;
    /// any tasks already running on this device are left untouched.
    pub async fn set_data(&self, identity: DeviceIdentity) {
        *self.identity.write().await = identity;
    }

    /// Declared capabilities regardless of monitoring tag — used directly
    /// by `scram`/`unscram`, which must act regardless of `"ctrl mon"`.
    pub fn declared_capabilities(&self) -> &'static [Capability] {
        self.class.declared_capabilities()
    }

    /// Capabilities as seen by ordinary group fan-out: empty when the
    /// device is tagged `"ctrl mon"` (monitoring-only).
    pub async fn capabilities(&self) -> Vec<Capability> {
        if self.identity.read().await.is_monitoring_only() {
            Vec::new()
        } else {
            self.declared_capabilities().to_vec()
        }
    }

    pub async fn is_online(&self) -> OnlineState {
        self.online.read().await.state()
    }

    /// Emits a `manager/device_event` iff `value` differs from the last
    /// value emitted for `field` on this device.
    pub async fn event(&self, field: &str, value: serde_json::Value) {
        {
            let mut last = self.last_emitted.write().await;
            if last.get(field) == Some(&value) {
                return;
            }
            last.insert(field.to_owned(), value.clone());
        }

        let name = self.name().await;
        let event = DeviceEvent { target: name, kind: field.to_owned(), value };
        let body = json!({ "data": { "event": event } });
        self.bus.publish_json("manager/device_event", &body, Qos::AtMostOnce);
    }

    pub(crate) async fn emit_error(&self, method: &str, err: &AdapterError) {
        let name = self.name().await;
        let event = ErrorEvent::new(
            format!("{name}.{method}: {err}"),
            vec![err.kind.as_str().to_owned()],
        );
        let body = json!({ "error": event });
        self.bus.publish_json("manager/device_event", &body, Qos::AtMostOnce);
        warn!(device = %name, method, err = %err, "adapter call failed");
    }

    /// Feeds a freshly observed online state through the hysteresis
    /// tracker, reconciling `should_*` flags and emitting on change.
    pub async fn set_is_online(&self, observed: OnlineState) {
        let changed = self.online.write().await.observe(observed);
        if let Some(new_state) = changed {
            self.actions.write().await.reconcile(new_state);
            self.event("is_online", json!(new_state.as_str())).await;
        }
    }

    /// Replaces the task in `slot`, cancelling any predecessor first. At
    /// most one outstanding task per named slot. `make_fut` receives the
    /// fresh [`CancellationToken`] for the new task so it can thread it
    /// into any cooperative suspension point (e.g. [`repeat_until`]).
    async fn spawn_slot<F, Fut>(&self, slot: &'static str, make_fut: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let mut slots = self.slots.lock().await;
        if let Some((handle, prev_token)) = slots.remove(slot) {
            prev_token.cancel();
            handle.abort();
        }
        let handle = tokio::spawn(make_fut(token.clone()));
        slots.insert(slot, (handle, token));
    }

    /// Clears every `should_*` flag, cancels every named task, and releases
    /// the adapter lock (dropping the guard below does that implicitly).
    pub async fn cancel(&self) {
        self.actions.write().await.clear();
        let mut slots = self.slots.lock().await;
        for (_, (handle, token)) in slots.drain() {
            token.cancel();
            handle.abort();
        }
    }

    /// Emits the device's full current state as a burst of events, used on
    /// resubscribe. Republishes every field already in the dedup cache
    /// (bypassing the dedup check itself, since a burst by definition
    /// repeats unchanged values) plus any class-specific immediate refresh.
    pub async fn fetch(&self) {
        let name = self.name().await;
        let snapshot: Vec<(String, serde_json::Value)> =
            self.last_emitted.read().await.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        for (field, value) in snapshot {
            let event = DeviceEvent { target: name.clone(), kind: field, value };
            let body = json!({ "data": { "event": event } });
            self.bus.publish_json("manager/device_event", &body, Qos::AtMostOnce);
        }
        class::fetch(self).await;
    }

    /// `update()` is called by the manager roughly 8 times/second; it is a
    /// no-op unless a registered probe's interval has elapsed.
    pub async fn update(self: &Arc<Self>) {
        class::update(self).await;
    }

    /// Dispatches a `probe/<fqdn>/<field>` message from the on-device agent.
    /// Only `Computer` recognizes the full field set (heartbeat, mute
    /// state, sensors); other classes just forward the payload as a plain
    /// device event.
    pub async fn on_probe_field(self: &Arc<Self>, field: &str, payload: &serde_json::Value) {
        if let class::ClassSlot::Computer(state) = &self.class {
            class::computer::on_probe_field(self, state, field, payload).await;
        } else {
            self.event(field, payload.clone()).await;
        }
    }

    pub async fn wake(self: &Arc<Self>) {
        self.run_templated_action(Action::Wake).await;
    }

    pub async fn shutdown(self: &Arc<Self>) {
        self.run_templated_action(Action::Shutdown).await;
    }

    pub async fn reboot(self: &Arc<Self>) {
        self.run_templated_action(Action::Reboot).await;
    }

    pub async fn mute(self: &Arc<Self>) {
        self.run_one_shot_action(Action::Mute).await;
    }

    pub async fn unmute(self: &Arc<Self>) {
        self.run_one_shot_action(Action::Unmute).await;
    }

    /// Shared template for wake/shutdown/reboot: set the target flag, spawn
    /// a deadline-bounded retry loop under that action's slot, and clear
    /// the flag (with an error event) if the deadline elapses first.
    async fn run_templated_action(self: &Arc<Self>, action: Action) {
        if !self.declared_capabilities().contains(&action.capability()) {
            return;
        }

        {
            let mut flags = self.actions.write().await;
            match action {
                Action::Wake => flags.should_wake = true,
                Action::Shutdown => flags.should_shutdown = true,
                Action::Reboot => flags.should_reboot = true,
                _ => unreachable!("templated actions are wake/shutdown/reboot only"),
            }
        }

        let device = self.clone();
        self.spawn_slot(action.slot_name(), move |token| async move {
            device.run_action_loop(action, token).await;
        })
        .await;
    }

    async fn run_action_loop(self: Arc<Self>, action: Action, cancel: CancellationToken) {
        let interval = class::action_interval(&self, action);
        let deadline = self.config.default_action_timeout();
        let device = self.clone();

        let outcome = repeat_until(
            || {
                let flags = device.actions.try_read();
                match (action, flags) {
                    (Action::Wake, Ok(f)) => f.should_wake,
                    (Action::Shutdown, Ok(f)) => f.should_shutdown,
                    (Action::Reboot, Ok(f)) => f.should_reboot,
                    // Lock contention on a single boolean read is
                    // vanishingly unlikely to persist; treat it as "still
                    // targeting" for one tick rather than stalling.
                    (_, Err(_)) => true,
                    _ => unreachable!(),
                }
            },
            || {
                let device = device.clone();
                async move {
                    if let Err(err) = class::attempt(&device, action).await {
                        device.emit_error(action.slot_name(), &err).await;
                    }
                }
            },
            interval,
            deadline,
            &cancel,
        )
        .await;

        if outcome == RetryOutcome::TimedOut {
            let mut flags = self.actions.write().await;
            match action {
                Action::Wake => flags.should_wake = false,
                Action::Shutdown => flags.should_shutdown = false,
                Action::Reboot => flags.should_reboot = false,
                _ => {}
            }
            drop(flags);
            let name = self.name().await;
            warn!(device = %name, action = action.slot_name(), "action loop timed out");
            self.emit_error(
                action.slot_name(),
                &AdapterError::timeout(format!("{} did not reach target state", action.slot_name())),
            )
            .await;
        } else {
            class::on_action_complete(&self, action).await;
        }
    }

    /// Mute/unmute are not state-confirmed; a single attempt is made and
    /// any failure is reported without retry.
    async fn run_one_shot_action(self: &Arc<Self>, action: Action) {
        if !self.declared_capabilities().contains(&action.capability()) {
            return;
        }
        let device = self.clone();
        self.spawn_slot(action.slot_name(), move |_token| async move {
            if let Err(err) = class::attempt(&device, action).await {
                device.emit_error(action.slot_name(), &err).await;
            }
        })
        .await;
    }
}
