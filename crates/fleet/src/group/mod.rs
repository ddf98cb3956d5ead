// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tag and Location aggregation: derives OFF/PARTIAL/ON group state from
//! member devices and fans group methods out to members, staging the
//! dependency order between device classes (PDU, switch, display,
//! computer) that a raw per-device `wake`/`shutdown` call can't express on
//! its own.

pub mod location;
pub mod tag;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinSet;

use crate::device::{Capability, Device, OnlineState};

pub type GroupId = u64;

/// Wire shape for `manager/{tag,location}_event`'s `{data:{event:{target,
/// type, value}}}` body, identical in shape to `Device`'s.
#[derive(Debug, Clone, Serialize)]
pub struct GroupEvent {
    pub target: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: serde_json::Value,
}

/// Group actuation methods, replacing the original's attribute-dispatch
/// "any capability name is a group method" with a closed enum: a group
/// method is fan-out to members declaring the matching capability, plus
/// two fixed fire-alarm sequences that aren't plain capability fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupMethod {
    Wake,
    Shutdown,
    Reboot,
    Mute,
    Unmute,
    Scram,
    Unscram,
}

impl GroupMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wake => "wake",
            Self::Shutdown => "shutdown",
            Self::Reboot => "reboot",
            Self::Mute => "mute",
            Self::Unmute => "unmute",
            Self::Scram => "scram",
            Self::Unscram => "unscram",
        }
    }

    /// Parses a `api/{tag,location}/<method>` path segment into a group
    /// method. Unrecognized names (including plain device-level methods
    /// that have no group equivalent) return `None`.
    pub fn parse(method: &str) -> Option<Self> {
        match method {
            "wake" => Some(Self::Wake),
            "shutdown" => Some(Self::Shutdown),
            "reboot" => Some(Self::Reboot),
            "mute" => Some(Self::Mute),
            "unmute" => Some(Self::Unmute),
            "scram" => Some(Self::Scram),
            "unscram" => Some(Self::Unscram),
            _ => None,
        }
    }

    /// The device capability this method fans out on, for the five plain
    /// capability-dispatch methods. `Scram`/`Unscram` have no single
    /// capability: they're fixed multi-step sequences (see [`tag::Tag::scram`]).
    pub fn capability(&self) -> Option<Capability> {
        match self {
            Self::Wake => Some(Capability::Wake),
            Self::Shutdown => Some(Capability::Shutdown),
            Self::Reboot => Some(Capability::Reboot),
            Self::Mute => Some(Capability::Mute),
            Self::Unmute => Some(Capability::Unmute),
            Self::Scram | Self::Unscram => None,
        }
    }
}

/// Which side of a scheduled window a `calendar/<edge>/...` message names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarEdge {
    Start,
    End,
}

impl CalendarEdge {
    /// Parses a `calendar/<edge>/...` path segment.
    pub fn parse(edge: &str) -> Option<Self> {
        match edge {
            "start" => Some(Self::Start),
            "end" => Some(Self::End),
            _ => None,
        }
    }
}

/// `ON` iff every member is ON, `OFF` iff none are (including the empty
/// set), else `PARTIAL`. Shared by Tag and Location, which derive group
/// state identically.
pub async fn aggregate_online(devices: &[Arc<Device>]) -> OnlineState {
    if devices.is_empty() {
        return OnlineState::Off;
    }
    let mut online = 0usize;
    for device in devices {
        if device.is_online().await == OnlineState::On {
            online += 1;
        }
    }
    if online == 0 {
        OnlineState::Off
    } else if online == devices.len() {
        OnlineState::On
    } else {
        OnlineState::Partial
    }
}

async fn invoke(device: &Arc<Device>, method: GroupMethod) {
    match method {
        GroupMethod::Wake => device.wake().await,
        GroupMethod::Shutdown => device.shutdown().await,
        GroupMethod::Reboot => device.reboot().await,
        GroupMethod::Mute => device.mute().await,
        GroupMethod::Unmute => device.unmute().await,
        GroupMethod::Scram | GroupMethod::Unscram => {}
    }
}

/// Spawns `method` on every device in `devices`, staggering each spawn by
/// 0-1s so a large fan-out doesn't produce a synchronized burst of bus
/// traffic. Does not wait for completion.
async fn dispatch_parallel(devices: &[Arc<Device>], method: GroupMethod) {
    for device in devices {
        let device = device.clone();
        tokio::spawn(async move { invoke(&device, method).await });
        tokio::time::sleep(Duration::from_secs_f64(rand::random::<f64>())).await;
    }
}

/// Capability-filtered fan-out honoring the "ctrl mon" monitoring tag —
/// used for every ordinary group method (wake/shutdown/reboot/mute/unmute).
pub async fn call(devices: &[Arc<Device>], method: GroupMethod) {
    let Some(capability) = method.capability() else { return };
    let mut targets = Vec::new();
    for device in devices {
        if device.capabilities().await.contains(&capability) {
            targets.push(device.clone());
        }
    }
    dispatch_parallel(&targets, method).await;
}

/// Fan-out filtered by a device's *declared* capabilities, bypassing the
/// "ctrl mon" filter. Used only by `scram`/`unscram`, which must act on
/// every device regardless of monitoring tag.
pub async fn call_raw(devices: &[Arc<Device>], capability: Capability, method: GroupMethod) {
    let targets: Vec<Arc<Device>> =
        devices.iter().filter(|d| d.declared_capabilities().contains(&capability)).cloned().collect();
    dispatch_parallel(&targets, method).await;
}

/// Splits `devices` into those declaring `capability` and those that don't,
/// using the raw declared list (not the "ctrl mon"-filtered one).
pub fn partition_by_declared(devices: &[Arc<Device>], capability: Capability) -> (Vec<Arc<Device>>, Vec<Arc<Device>>) {
    devices.iter().cloned().partition(|d| d.declared_capabilities().contains(&capability))
}

/// Waits, bounded by `timeout`, for every device in `devices` to reach one
/// of `states`. A device already in one of `states` returns immediately.
/// Logged and abandoned (not propagated) on timeout, matching the
/// original's "log and move on" staged-sequence behavior.
pub async fn wait_for(devices: &[Arc<Device>], states: &[OnlineState], timeout: Duration) {
    let poll = async {
        let mut set = JoinSet::new();
        for device in devices.iter().cloned() {
            let states = states.to_vec();
            set.spawn(async move {
                loop {
                    if states.contains(&device.is_online().await) {
                        return;
                    }
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            });
        }
        while set.join_next().await.is_some() {}
    };
    if tokio::time::timeout(timeout, poll).await.is_err() {
        tracing::warn!(count = devices.len(), ?states, "group wait_for timed out");
    }
}

pub async fn call_and_wait_for(devices: &[Arc<Device>], method: GroupMethod, states: &[OnlineState], timeout: Duration) {
    call(devices, method).await;
    wait_for(devices, states, timeout).await;
}

pub async fn call_and_wait_for_raw(
    devices: &[Arc<Device>],
    capability: Capability,
    method: GroupMethod,
    states: &[OnlineState],
    timeout: Duration,
) {
    call_raw(devices, capability, method).await;
    wait_for(devices, states, timeout).await;
}

/// Runs `make_fut(member)` for each member in `members`, staggering spawns
/// by 0-1s like [`dispatch_parallel`], and waits for all of them to finish.
/// Used by Location to fan a method out across its "E-Nummer" element tags.
pub async fn dispatch_elements<T, F, Fut>(members: &[Arc<T>], make_fut: F)
where
    T: Send + Sync + 'static,
    F: Fn(Arc<T>) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut set = JoinSet::new();
    for member in members.iter().cloned() {
        set.spawn(make_fut(member));
        tokio::time::sleep(Duration::from_secs_f64(rand::random::<f64>())).await;
    }
    while set.join_next().await.is_some() {}
}
