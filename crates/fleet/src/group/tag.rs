// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A named set of devices sharing a property (room role, element number).
//! Staged `wake`/`shutdown` express the dependency order between device
//! classes a plain per-device action can't: PDUs before switches before
//! displays before computers.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::RwLock;

use crate::bus::{BusHandle, Qos};
use crate::config::FleetConfig;
use crate::device::{Capability, Device, OnlineState};

use super::{call, call_and_wait_for, call_and_wait_for_raw, call_raw, partition_by_declared, GroupEvent, GroupId, GroupMethod};

const ROLE_NETWORK_SWITCH: &str = "Netzwerkswitch";
const ROLE_PDU: &str = "PDU";
const ROLE_MONITOR: &str = "Monitor";
const ROLE_PROJECTOR: &str = "Projektor";
const ROLE_COMPUTER_SUBSTRING: &str = "Medienstation";

pub struct Tag {
    pub id: GroupId,
    name: RwLock<String>,
    description: RwLock<String>,
    devices: RwLock<Vec<Arc<Device>>>,
    has_calendar_event: RwLock<bool>,
    last_calendar_method: RwLock<Option<GroupMethod>>,
    bus: BusHandle,
    config: Arc<FleetConfig>,
}

impl Tag {
    pub fn new(id: GroupId, name: String, description: String, devices: Vec<Arc<Device>>, bus: BusHandle, config: Arc<FleetConfig>) -> Self {
        Self {
            id,
            name: RwLock::new(name),
            description: RwLock::new(description),
            devices: RwLock::new(devices),
            has_calendar_event: RwLock::new(false),
            last_calendar_method: RwLock::new(None),
            bus,
            config,
        }
    }

    /// Applies a resynced inventory record: new name/description and a
    /// freshly re-derived member list. Running tasks on member devices are
    /// untouched; only the membership list itself is replaced.
    pub async fn set_data(&self, name: String, description: String, devices: Vec<Arc<Device>>) {
        *self.name.write().await = name;
        *self.description.write().await = description;
        *self.devices.write().await = devices;
    }

    pub async fn name(&self) -> String {
        self.name.read().await.clone()
    }

    pub async fn description(&self) -> String {
        self.description.read().await.clone()
    }

    async fn devices_snapshot(&self) -> Vec<Arc<Device>> {
        self.devices.read().await.clone()
    }

    pub async fn is_online(&self) -> OnlineState {
        super::aggregate_online(&self.devices_snapshot().await).await
    }

    /// Whether `device_id` names one of this tag's current members, used by
    /// the manager to decide which tags to re-publish after a device's
    /// `is_online` changes.
    pub async fn contains_device(&self, device_id: crate::device::DeviceId) -> bool {
        self.devices_snapshot().await.iter().any(|d| d.id == device_id)
    }

    async fn filter_by_role(&self, matches: impl Fn(&str) -> bool) -> Vec<Arc<Device>> {
        let mut out = Vec::new();
        for device in self.devices_snapshot().await {
            let role = device.identity.read().await.role.clone();
            if matches(&role) {
                out.push(device);
            }
        }
        out
    }

    pub async fn network_switches(&self) -> Vec<Arc<Device>> {
        self.filter_by_role(|role| role == ROLE_NETWORK_SWITCH).await
    }

    pub async fn pdus(&self) -> Vec<Arc<Device>> {
        self.filter_by_role(|role| role == ROLE_PDU).await
    }

    pub async fn display_devices(&self) -> Vec<Arc<Device>> {
        self.filter_by_role(|role| role == ROLE_MONITOR || role == ROLE_PROJECTOR).await
    }

    pub async fn computers(&self) -> Vec<Arc<Device>> {
        self.filter_by_role(|role| role.contains(ROLE_COMPUTER_SUBSTRING)).await
    }

    /// Every member not captured by the four role-partitioned subsets above.
    pub async fn other_devices(&self) -> Vec<Arc<Device>> {
        let (switches, pdus, displays, computers) =
            (self.network_switches().await, self.pdus().await, self.display_devices().await, self.computers().await);
        self.devices_snapshot()
            .await
            .into_iter()
            .filter(|d| {
                !switches.iter().any(|x| Arc::ptr_eq(x, d))
                    && !pdus.iter().any(|x| Arc::ptr_eq(x, d))
                    && !displays.iter().any(|x| Arc::ptr_eq(x, d))
                    && !computers.iter().any(|x| Arc::ptr_eq(x, d))
            })
            .collect()
    }

    async fn calendar_shutdown_active(&self) -> bool {
        *self.has_calendar_event.read().await && *self.last_calendar_method.read().await == Some(GroupMethod::Shutdown)
    }

    /// PDUs on, then switches on, then displays on (each awaited), then
    /// computers and everything else woken without waiting.
    pub async fn wake(&self, from_knx: bool) {
        if from_knx && self.calendar_shutdown_active().await {
            return;
        }
        let timeout = self.config.group_wait_timeout();

        let pdus = self.pdus().await;
        if !pdus.is_empty() {
            call_and_wait_for(&pdus, GroupMethod::Wake, &[OnlineState::On], timeout).await;
        }
        let switches = self.network_switches().await;
        if !switches.is_empty() {
            call_and_wait_for(&switches, GroupMethod::Wake, &[OnlineState::On], timeout).await;
        }
        let displays = self.display_devices().await;
        if !displays.is_empty() {
            call_and_wait_for(&displays, GroupMethod::Wake, &[OnlineState::On], timeout).await;
        }
        let computers = self.computers().await;
        if !computers.is_empty() {
            call(&computers, GroupMethod::Wake).await;
        }
        let others = self.other_devices().await;
        if !others.is_empty() {
            call(&others, GroupMethod::Wake).await;
        }
    }

    /// Computers off, then displays off-or-partial (each awaited), then
    /// everything else, switches, and PDUs shut down without waiting.
    pub async fn shutdown(&self) {
        let timeout = self.config.group_wait_timeout();

        let computers = self.computers().await;
        if !computers.is_empty() {
            call_and_wait_for(&computers, GroupMethod::Shutdown, &[OnlineState::Off], timeout).await;
        }
        let displays = self.display_devices().await;
        if !displays.is_empty() {
            call_and_wait_for(&displays, GroupMethod::Shutdown, &[OnlineState::Off, OnlineState::Partial], timeout).await;
        }
        let others = self.other_devices().await;
        if !others.is_empty() {
            call(&others, GroupMethod::Shutdown).await;
        }
        let switches = self.network_switches().await;
        if !switches.is_empty() {
            call(&switches, GroupMethod::Shutdown).await;
        }
        let pdus = self.pdus().await;
        if !pdus.is_empty() {
            call(&pdus, GroupMethod::Shutdown).await;
        }
    }

    /// Fire-alarm shutdown. Acts on every computer and display regardless
    /// of a `"ctrl mon"` tag, using each device's raw declared capability
    /// list: mute the computers that can be muted, shut down (and await)
    /// the rest, then shut down displays without waiting.
    pub async fn scram(&self) {
        tracing::error!(tag = %self.name().await, "bmz scram");
        let computers = self.computers().await;
        let (mutable, non_mutable) = partition_by_declared(&computers, Capability::Mute);
        call_raw(&mutable, Capability::Mute, GroupMethod::Mute).await;
        call_and_wait_for_raw(&non_mutable, Capability::Shutdown, GroupMethod::Shutdown, &[OnlineState::Off], self.config.group_wait_timeout()).await;
        call_raw(&self.display_devices().await, Capability::Shutdown, GroupMethod::Shutdown).await;
    }

    /// Fire-alarm recovery: unmute everything, then wake displays and
    /// every remaining device, both awaited to ON.
    pub async fn unscram(&self) {
        tracing::error!(tag = %self.name().await, "bmz unscram");
        let timeout = self.config.group_wait_timeout();
        let all = self.devices_snapshot().await;
        call_raw(&all, Capability::Unmute, GroupMethod::Unmute).await;

        let displays = self.display_devices().await;
        call_and_wait_for_raw(&displays, Capability::Wake, GroupMethod::Wake, &[OnlineState::On], timeout).await;

        let remaining: Vec<Arc<Device>> = all.into_iter().filter(|d| !displays.iter().any(|x| Arc::ptr_eq(x, d))).collect();
        call_and_wait_for_raw(&remaining, Capability::Wake, GroupMethod::Wake, &[OnlineState::On], timeout).await;
    }

    pub async fn cancel(&self) {
        for device in self.devices_snapshot().await {
            device.cancel().await;
        }
    }

    /// Entry point for `api/tag/<method>` routing: the staged sequences
    /// for wake/shutdown/scram/unscram, plain capability fan-out otherwise.
    pub async fn dispatch(&self, method: GroupMethod, from_knx: bool) {
        if from_knx && self.calendar_shutdown_active().await {
            return;
        }
        match method {
            GroupMethod::Wake => self.wake(from_knx).await,
            GroupMethod::Shutdown => self.shutdown().await,
            GroupMethod::Scram => self.scram().await,
            GroupMethod::Unscram => self.unscram().await,
            GroupMethod::Reboot | GroupMethod::Mute | GroupMethod::Unmute => {
                call(&self.devices_snapshot().await, method).await;
            }
        }
    }

    /// `method` is `None` for a `calendar/<edge>/tag/clear` message, which
    /// carries no actionable method name but still ends (or starts) the
    /// window and must overwrite whatever method was last recorded.
    pub async fn calendar_edge(&self, edge: super::CalendarEdge, method: Option<GroupMethod>) {
        *self.has_calendar_event.write().await = edge == super::CalendarEdge::Start;
        *self.last_calendar_method.write().await = method;
    }

    pub async fn fetch(&self) {
        self.publish_event("is_online", json!(self.is_online().await.as_str())).await;
    }

    async fn publish_event(&self, field: &str, value: serde_json::Value) {
        let target = self.name().await;
        let event = GroupEvent { target, kind: field.to_owned(), value };
        let body = json!({ "data": { "event": event } });
        self.bus.publish_json("manager/tag_event", &body, Qos::AtMostOnce);
    }
}

#[cfg(test)]
#[path = "tag_tests.rs"]
mod tag_tests;
