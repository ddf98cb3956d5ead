// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A physical place containing devices. Aggregates the same way a [`Tag`]
//! does, plus tracks the last observed KNX wall-switch state and delegates
//! its own methods to the "E-Nummer" tags physically inside it — those
//! tags are the actual staged-sequence actuation targets.
//!
//! [`Tag`]: super::tag::Tag

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tokio::sync::RwLock;

use crate::bus::{BusHandle, Qos};
use crate::config::FleetConfig;
use crate::device::{Device, OnlineState};

use super::tag::Tag;
use super::{dispatch_elements, GroupEvent, GroupId, GroupMethod};

/// Tag description identifying the "element" tags that are the actual
/// actuation targets within a location. TODO: move to `classify.yaml`
/// instead of a hardcoded string, mirroring the upstream agent's own TODO.
const ELEMENT_TAG_DESCRIPTION: &str = "E-Nummer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KnxState {
    Undefined,
    Off,
    On,
}

impl KnxState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undefined => "UNDEFINED",
            Self::Off => "OFF",
            Self::On => "ON",
        }
    }
}

pub struct Location {
    pub id: GroupId,
    name: RwLock<String>,
    devices: RwLock<Vec<Arc<Device>>>,
    tags: RwLock<Vec<Arc<Tag>>>,
    knx_state: RwLock<KnxState>,
    has_calendar_event: RwLock<bool>,
    last_calendar_method: RwLock<Option<GroupMethod>>,
    bus: BusHandle,
    config: Arc<FleetConfig>,
}

impl Location {
    pub fn new(id: GroupId, name: String, devices: Vec<Arc<Device>>, tags: Vec<Arc<Tag>>, bus: BusHandle, config: Arc<FleetConfig>) -> Self {
        Self {
            id,
            name: RwLock::new(name),
            devices: RwLock::new(devices),
            tags: RwLock::new(tags),
            knx_state: RwLock::new(KnxState::Undefined),
            has_calendar_event: RwLock::new(false),
            last_calendar_method: RwLock::new(None),
            bus,
            config,
        }
    }

    pub async fn set_data(&self, name: String, devices: Vec<Arc<Device>>, tags: Vec<Arc<Tag>>) {
        *self.name.write().await = name;
        *self.devices.write().await = devices;
        *self.tags.write().await = tags;
    }

    pub async fn name(&self) -> String {
        self.name.read().await.clone()
    }

    async fn devices_snapshot(&self) -> Vec<Arc<Device>> {
        self.devices.read().await.clone()
    }

    /// The tags physically located here whose description marks them as
    /// actuation elements, per [`ELEMENT_TAG_DESCRIPTION`].
    pub async fn elements(&self) -> Vec<Arc<Tag>> {
        let mut out = Vec::new();
        for tag in self.tags.read().await.iter() {
            if tag.description().await == ELEMENT_TAG_DESCRIPTION {
                out.push(tag.clone());
            }
        }
        out
    }

    pub async fn is_online(&self) -> OnlineState {
        super::aggregate_online(&self.devices_snapshot().await).await
    }

    /// Whether `device_id` names one of this location's current members,
    /// used by the manager to decide which locations to re-publish after a
    /// device's `is_online` changes.
    pub async fn contains_device(&self, device_id: crate::device::DeviceId) -> bool {
        self.devices_snapshot().await.iter().any(|d| d.id == device_id)
    }

    pub async fn knx_state(&self) -> KnxState {
        *self.knx_state.read().await
    }

    async fn set_knx_state(&self, value: KnxState) {
        let changed = {
            let mut state = self.knx_state.write().await;
            if *state == value {
                false
            } else {
                *state = value;
                true
            }
        };
        if changed {
            self.publish_event("knx_state", json!(value.as_str())).await;
        }
    }

    async fn calendar_shutdown_active(&self) -> bool {
        *self.has_calendar_event.read().await && *self.last_calendar_method.read().await == Some(GroupMethod::Shutdown)
    }

    /// Handles a `knx/switch/<location_id>` bus message. `ON` records the
    /// switch state and delegates a knx-flagged wake to the element tags
    /// unless a calendar shutdown window is active; `OFF` shuts down first
    /// and records the switch state after.
    pub async fn knx_switch(&self, on: bool) {
        if on {
            self.set_knx_state(KnxState::On).await;
            if self.calendar_shutdown_active().await {
                return;
            }
            self.wake(true).await;
        } else {
            self.shutdown().await;
            self.set_knx_state(KnxState::Off).await;
        }
    }

    pub async fn wake(&self, from_knx: bool) {
        if from_knx && self.calendar_shutdown_active().await {
            return;
        }
        let elements = self.elements().await;
        dispatch_elements(&elements, move |tag| async move { tag.wake(from_knx).await }).await;
    }

    pub async fn shutdown(&self) {
        let elements = self.elements().await;
        dispatch_elements(&elements, |tag| async move { tag.shutdown().await }).await;
    }

    pub async fn scram(&self) {
        tracing::error!(location = %self.name().await, "bmz scram");
        for element in self.elements().await {
            element.scram().await;
        }
    }

    pub async fn unscram(&self) {
        tracing::error!(location = %self.name().await, "bmz unscram");
        for element in self.elements().await {
            element.unscram().await;
        }
    }

    async fn fan_out_to_elements(&self, method: GroupMethod) {
        let elements = self.elements().await;
        dispatch_elements(&elements, move |tag| async move { tag.dispatch(method, false).await }).await;
    }

    /// Entry point for `api/location/<method>` and `fac/<method>/...`
    /// routing.
    pub async fn dispatch(&self, method: GroupMethod, from_knx: bool) {
        match method {
            GroupMethod::Wake => self.wake(from_knx).await,
            GroupMethod::Shutdown => self.shutdown().await,
            GroupMethod::Scram => self.scram().await,
            GroupMethod::Unscram => self.unscram().await,
            GroupMethod::Reboot | GroupMethod::Mute | GroupMethod::Unmute => self.fan_out_to_elements(method).await,
        }
    }

    /// `method` is `None` for a `calendar/<edge>/location/clear` message,
    /// which carries no actionable method name but still ends (or starts)
    /// the window and must overwrite whatever method was last recorded.
    pub async fn calendar_edge(&self, edge: super::CalendarEdge, method: Option<GroupMethod>) {
        *self.has_calendar_event.write().await = edge == super::CalendarEdge::Start;
        *self.last_calendar_method.write().await = method;
    }

    pub async fn cancel(&self) {
        for device in self.devices_snapshot().await {
            device.cancel().await;
        }
    }

    pub async fn fetch(&self) {
        self.publish_event("is_online", json!(self.is_online().await.as_str())).await;
        self.publish_event("knx_state", json!(self.knx_state().await.as_str())).await;
    }

    async fn publish_event(&self, field: &str, value: serde_json::Value) {
        let target = self.name().await;
        let event = GroupEvent { target, kind: field.to_owned(), value };
        let body = json!({ "data": { "event": event } });
        self.bus.publish_json("manager/location_event", &body, Qos::AtMostOnce);
    }
}

#[cfg(test)]
#[path = "location_tests.rs"]
mod location_tests;
