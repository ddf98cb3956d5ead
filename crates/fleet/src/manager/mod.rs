// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owns the live device/tag/location maps, drives inventory sync and the
//! per-device update tick, and resolves power-feed writes for devices whose
//! power port links to a PDU elsewhere in the fleet. Mirrors the teacher's
//! `Arc<MuxState>` with `RwLock<HashMap<...>>` session maps exactly.

pub mod classify;
mod identity;
pub mod inventory;
pub mod router;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::adapter::brightsign::DigestRebootAdapter;
use crate::adapter::icmp::SurgePingAdapter;
use crate::adapter::pjlink::TcpPjlinkAdapter;
use crate::adapter::snmp_gude::CsnmpAdapter;
use crate::adapter::webos::TungsteniteWebosAdapter;
use crate::adapter::wol::UdpWolSender;
use crate::adapter::AdapterFuture;
use crate::bus::BusHandle;
use crate::config::FleetConfig;
use crate::device::class::brightsign::BrightSignState;
use crate::device::class::computer::ComputerState;
use crate::device::class::credential_store::{CredentialStore, JsonFileCredentialStore};
use crate::device::class::gude_pdu::{self, GudePduState};
use crate::device::class::icmpable::IcmpableState;
use crate::device::class::pjlink::PjlinkState;
use crate::device::class::webos_tv::WebosTvState;
use crate::device::class::wolable::WolableState;
use crate::device::class::ClassSlot;
use crate::device::{Device, DeviceId, DeviceIdentity, OnlineState, PowerFeedResolver};
use crate::error::{AdapterError, FleetError};
use crate::group::location::Location;
use crate::group::tag::Tag;
use crate::group::{GroupId, GroupMethod};
use crate::scheduling;

use identity::parse_identity;

/// Broadcast address WOL magic packets are sent to. The original agent's
/// `wakeonlan.send_magic_packet` also defaults to the all-ones broadcast;
/// no inventory field carries a per-device override.
const WOL_BROADCAST_ADDR: &str = "255.255.255.255:9";

/// Which group map a pending task-cancellation belongs to, so tag and
/// location method invocations can share one bookkeeping map without a
/// tag id colliding with a location id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum GroupKind {
    Tag,
    Location,
}

pub struct ManagerState {
    devices: RwLock<HashMap<DeviceId, Arc<Device>>>,
    tags: RwLock<HashMap<GroupId, Arc<Tag>>>,
    locations: RwLock<HashMap<GroupId, Arc<Location>>>,
    /// Last-observed `is_online` per device, used to detect the transitions
    /// that must re-publish every containing tag's and location's aggregate
    /// state. `Device::event` itself has no manager-side hook to piggyback
    /// on, unlike the original's single `device_event` callback.
    last_online: RwLock<HashMap<DeviceId, OnlineState>>,
    /// At most one outstanding `update()` task per device.
    update_in_flight: Mutex<HashSet<DeviceId>>,
    /// Outstanding tag/location method task per group id, cancelled and
    /// replaced on a new command the way the original's `self.tasks[name]`
    /// does. Device-level methods need no equivalent: `Device::spawn_slot`
    /// already replaces-and-cancels per action slot.
    group_tasks: Mutex<HashMap<(GroupKind, GroupId), JoinHandle<()>>>,
    setup_lock: Mutex<()>,
    device_map: classify::DeviceMap,
    api: inventory::ApiClient,
    bus: BusHandle,
    config: Arc<FleetConfig>,
    credentials: Arc<dyn CredentialStore>,
}

impl ManagerState {
    pub async fn new(config: Arc<FleetConfig>, bus: BusHandle) -> Result<Arc<Self>, FleetError> {
        let device_map = classify::load(&config.device_map_path).await?;
        let api = inventory::ApiClient::new(&config)?;
        let credentials = Arc::new(JsonFileCredentialStore::new(config.webos_credential_path.clone()));

        Ok(Arc::new(Self {
            devices: RwLock::new(HashMap::new()),
            tags: RwLock::new(HashMap::new()),
            locations: RwLock::new(HashMap::new()),
            last_online: RwLock::new(HashMap::new()),
            update_in_flight: Mutex::new(HashSet::new()),
            group_tasks: Mutex::new(HashMap::new()),
            setup_lock: Mutex::new(()),
            device_map,
            api,
            bus,
            config,
            credentials,
        }))
    }

    /// Fetches inventory (retrying indefinitely on failure) and applies it
    /// under the manager-wide lock, serializing resync against the update
    /// tick exactly as spec'd.
    pub async fn setup(self: &Arc<Self>, initial: bool) {
        let _guard = self.setup_lock.lock().await;
        let response = inventory::fetch_with_retry(&self.api, &self.config).await;
        self.apply_inventory(response).await;
        if initial {
            tracing::info!(
                devices = self.devices.read().await.len(),
                tags = self.tags.read().await.len(),
                locations = self.locations.read().await.len(),
                "initial inventory sync complete"
            );
        }
    }

    /// Applies an `api/subscribe_devices` delta: the payload carries the
    /// same per-device record shape as a full inventory fetch, just scoped
    /// to the devices that changed.
    pub async fn subscribe_devices_delta(self: &Arc<Self>, payload: &Value) {
        let records = match payload {
            Value::Array(items) => items.clone(),
            Value::Object(_) => vec![payload.clone()],
            _ => return,
        };
        self.apply_devices(&records).await;
    }

    async fn apply_inventory(self: &Arc<Self>, response: inventory::InventoryResponse) {
        self.apply_devices(&response.devices).await;
        let all_devices: Vec<Arc<Device>> = self.devices.read().await.values().cloned().collect();
        self.apply_tags(&response.tags, &all_devices).await;
        let all_tags: Vec<Arc<Tag>> = self.tags.read().await.values().cloned().collect();
        self.apply_locations(&response.locations, &all_devices, &all_tags).await;
    }

    /// Creates or updates devices by id. Matching the original's
    /// `subscribe_device`, a device missing from a later sync is never
    /// removed — the inventory API is additive-only in practice.
    async fn apply_devices(self: &Arc<Self>, records: &[Value]) {
        for record in records {
            let Some(id) = record.get("id").and_then(Value::as_u64) else {
                tracing::warn!("inventory device record missing id, skipping");
                continue;
            };
            let identity = parse_identity(record);
            let existing = self.devices.read().await.get(&id).cloned();
            if let Some(device) = existing {
                let name = identity.name.clone();
                device.set_data(identity).await;
                tracing::debug!(id, name, "updated device");
                continue;
            }

            let class_name = classify::classify(&self.device_map, record).to_owned();
            match self.build_device(id, identity.clone(), &class_name) {
                Ok(device) => {
                    tracing::debug!(id, name = %identity.name, class = %class_name, "subscribed device");
                    self.devices.write().await.insert(id, device);
                }
                Err(err) => {
                    tracing::error!(id, name = %identity.name, class = %class_name, err = %err, "failed to construct device");
                }
            }
        }
    }

    fn build_device(self: &Arc<Self>, id: DeviceId, identity: DeviceIdentity, class_name: &str) -> Result<Arc<Device>, AdapterError> {
        let class = match class_name {
            "Computer" => ClassSlot::Computer(ComputerState::new(Arc::new(UdpWolSender::new(WOL_BROADCAST_ADDR)))),
            "Wolable" => {
                ClassSlot::Wolable(WolableState::new(Arc::new(SurgePingAdapter::new()?), Arc::new(UdpWolSender::new(WOL_BROADCAST_ADDR))))
            }
            "Pjlink" => ClassSlot::Pjlink(PjlinkState::new(Arc::new(SurgePingAdapter::new()?), Arc::new(TcpPjlinkAdapter::new()))),
            "GudePdu" => {
                let model = identity.model.as_deref().unwrap_or_default();
                ClassSlot::GudePdu(GudePduState::new(Arc::new(CsnmpAdapter::new()), model)?)
            }
            "WebosTv" => ClassSlot::WebosTv(WebosTvState::new(
                Arc::new(SurgePingAdapter::new()?),
                Arc::new(UdpWolSender::new(WOL_BROADCAST_ADDR)),
                Arc::new(TungsteniteWebosAdapter::new()),
                self.credentials.clone(),
            )),
            "BrightSign" => ClassSlot::BrightSign(BrightSignState::new(Arc::new(DigestRebootAdapter::new()?))),
            _ => ClassSlot::Icmpable(IcmpableState::new(Arc::new(SurgePingAdapter::new()?))),
        };

        Ok(Arc::new(Device::new(id, identity, class, self.bus.clone(), self.config.clone(), self.clone())))
    }

    /// Tag membership is derived from devices, not stored on the tag
    /// record: a device belongs to every tag named in its own `tags` list,
    /// grounded in `original_source/tags.py`'s `Tag.__contains__` /
    /// `Device.is_tagged`.
    async fn apply_tags(self: &Arc<Self>, records: &[Value], all_devices: &[Arc<Device>]) {
        for record in records {
            let Some(id) = record.get("id").and_then(Value::as_u64) else { continue };
            let name = record.get("name").and_then(Value::as_str).unwrap_or_default().to_owned();
            let description = record.get("description").and_then(Value::as_str).unwrap_or_default().to_owned();

            let mut members = Vec::new();
            for device in all_devices {
                if device.identity.read().await.tags.iter().any(|t| *t == name) {
                    members.push(device.clone());
                }
            }

            let existing = self.tags.read().await.get(&id).cloned();
            if let Some(tag) = existing {
                tag.set_data(name.clone(), description, members).await;
                tracing::debug!(id, name, "updated tag");
            } else {
                let tag = Arc::new(Tag::new(id, name.clone(), description, members, self.bus.clone(), self.config.clone()));
                tracing::debug!(id, name, "subscribed tag");
                self.tags.write().await.insert(id, tag);
            }
        }
    }

    /// Location membership is likewise derived: a device belongs to the
    /// location named in its own `location_id`, and a location's tags are
    /// whichever tags contain at least one of those devices (grounded in
    /// `original_source/locations.py`'s `Location.tags` cached property).
    async fn apply_locations(self: &Arc<Self>, records: &[Value], all_devices: &[Arc<Device>], all_tags: &[Arc<Tag>]) {
        for record in records {
            let Some(id) = record.get("id").and_then(Value::as_u64) else { continue };
            let name = record.get("name").and_then(Value::as_str).unwrap_or_default().to_owned();

            let mut members = Vec::new();
            for device in all_devices {
                if device.identity.read().await.location_id == Some(id) {
                    members.push(device.clone());
                }
            }

            let mut tags = Vec::new();
            for tag in all_tags {
                let mut contains_member = false;
                for device in &members {
                    if tag.contains_device(device.id).await {
                        contains_member = true;
                        break;
                    }
                }
                if contains_member {
                    tags.push(tag.clone());
                }
            }

            let existing = self.locations.read().await.get(&id).cloned();
            if let Some(location) = existing {
                location.set_data(name.clone(), members, tags).await;
                tracing::debug!(id, name, "updated location");
            } else {
                let location = Arc::new(Location::new(id, name.clone(), members, tags, self.bus.clone(), self.config.clone()));
                tracing::debug!(id, name, "subscribed location");
                self.locations.write().await.insert(id, location);
            }
        }
    }

    /// Runs the 125ms device-update tick until `cancel` fires, matching
    /// `original_source/manager.py`'s `@timed(.125) update_devices`.
    pub async fn run_update_tick(self: Arc<Self>, cancel: CancellationToken) {
        let interval = self.config.update_tick_interval();
        let manager = self.clone();
        scheduling::run_timed_loop(interval, cancel, move || {
            let manager = manager.clone();
            async move { manager.update_devices().await }
        })
        .await;
    }

    /// Spawns `device.update()` for every device not already mid-update,
    /// ensuring at most one outstanding update task per device.
    async fn update_devices(self: &Arc<Self>) {
        let devices: Vec<Arc<Device>> = self.devices.read().await.values().cloned().collect();
        for device in devices {
            let already_running = {
                let mut in_flight = self.update_in_flight.lock().await;
                !in_flight.insert(device.id)
            };
            if already_running {
                continue;
            }

            let manager = self.clone();
            tokio::spawn(async move {
                device.update().await;
                manager.after_device_update(&device).await;
                manager.update_in_flight.lock().await.remove(&device.id);
            });
        }
    }

    /// After a device's update tick, re-publishes the aggregate state of
    /// every tag/location containing it if `is_online` changed. Replaces
    /// the original's `device_event` callback chain with a poll-diff since
    /// `Device::event` publishes directly to the bus with no manager hook.
    async fn after_device_update(&self, device: &Arc<Device>) {
        let current = device.is_online().await;
        let changed = {
            let mut last = self.last_online.write().await;
            last.insert(device.id, current) != Some(current)
        };
        if !changed {
            return;
        }

        let tags: Vec<Arc<Tag>> = self.tags.read().await.values().cloned().collect();
        for tag in tags {
            if tag.contains_device(device.id).await {
                tag.fetch().await;
            }
        }

        let locations: Vec<Arc<Location>> = self.locations.read().await.values().cloned().collect();
        for location in locations {
            if location.contains_device(device.id).await {
                location.fetch().await;
            }
        }
    }

    pub async fn device_method(&self, id: DeviceId, method_name: &str, _params: &Value) {
        let Some(device) = self.devices.read().await.get(&id).cloned() else {
            tracing::error!(id, "device not subscribed");
            return;
        };
        match method_name {
            "wake" => device.wake().await,
            "shutdown" => device.shutdown().await,
            "reboot" => device.reboot().await,
            "mute" => device.mute().await,
            "unmute" => device.unmute().await,
            "cancel" => device.cancel().await,
            other => tracing::warn!(method = other, "unknown device method"),
        }
    }

    async fn replace_group_task(&self, kind: GroupKind, id: GroupId, handle: JoinHandle<()>) {
        let mut tasks = self.group_tasks.lock().await;
        if let Some(prev) = tasks.insert((kind, id), handle) {
            prev.abort();
        }
    }

    pub async fn tag_method(self: &Arc<Self>, id: GroupId, method_name: &str, from_knx: bool) {
        let Some(tag) = self.tags.read().await.get(&id).cloned() else {
            tracing::error!(id, "tag not subscribed");
            return;
        };
        let Some(method) = GroupMethod::parse(method_name) else {
            tracing::warn!(method = method_name, "unknown tag method");
            return;
        };
        let handle = tokio::spawn(async move { tag.dispatch(method, from_knx).await });
        self.replace_group_task(GroupKind::Tag, id, handle).await;
    }

    pub async fn location_method(self: &Arc<Self>, id: GroupId, method_name: &str, from_knx: bool) {
        let Some(location) = self.locations.read().await.get(&id).cloned() else {
            tracing::error!(id, "location not subscribed");
            return;
        };
        let Some(method) = GroupMethod::parse(method_name) else {
            tracing::warn!(method = method_name, "unknown location method");
            return;
        };
        let handle = tokio::spawn(async move { location.dispatch(method, from_knx).await });
        self.replace_group_task(GroupKind::Location, id, handle).await;
    }

    pub async fn location_knx_switch(self: &Arc<Self>, id: GroupId, on: bool) {
        let Some(location) = self.locations.read().await.get(&id).cloned() else {
            tracing::error!(id, "location not subscribed");
            return;
        };
        let handle = tokio::spawn(async move { location.knx_switch(on).await });
        self.replace_group_task(GroupKind::Location, id, handle).await;
    }

    pub async fn tag_calendar_edge(&self, id: GroupId, edge: crate::group::CalendarEdge, method: Option<GroupMethod>) {
        if let Some(tag) = self.tags.read().await.get(&id).cloned() {
            tag.calendar_edge(edge, method).await;
        } else {
            tracing::error!(id, "tag not subscribed");
        }
    }

    pub async fn location_calendar_edge(&self, id: GroupId, edge: crate::group::CalendarEdge, method: Option<GroupMethod>) {
        if let Some(location) = self.locations.read().await.get(&id).cloned() {
            location.calendar_edge(edge, method).await;
        } else {
            tracing::error!(id, "location not subscribed");
        }
    }

    pub async fn find_device_by_name(&self, name: &str) -> Option<Arc<Device>> {
        for device in self.devices.read().await.values() {
            if device.name().await == name {
                return Some(device.clone());
            }
        }
        None
    }
}

/// Resolves a power feed by panel (device) name, scanning the live device
/// map for a `GudePdu` whose name matches, grounded in
/// `original_source/devices/mixins/power_mixin.py`'s `set_power` lookup.
impl PowerFeedResolver for ManagerState {
    fn write_feed<'a>(&'a self, panel_name: &'a str, feed_index: u32, on: bool) -> AdapterFuture<'a, ()> {
        Box::pin(async move {
            let devices = self.devices.read().await;
            for device in devices.values() {
                if device.name().await != panel_name {
                    continue;
                }
                let ClassSlot::GudePdu(state) = &device.class else {
                    return Err(AdapterError::unsupported(format!("{panel_name} is not a pdu")));
                };
                return gude_pdu::write_powerfeed(device, state, feed_index as usize, on).await;
            }
            Err(AdapterError::unreachable(format!("power panel not found: {panel_name}")))
        })
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
