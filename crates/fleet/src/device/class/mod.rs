// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The seven device classes, each a small state struct holding its
//! capability adapters plus whatever cross-probe state it needs (last
//! heartbeat time, websocket session key, resolved SNMP OIDs). `ClassSlot`
//! is a closed enum rather than a trait object: the class set is fixed by
//! the building's device inventory, not an open extension point, so a
//! `match` here reads better than dynamic dispatch — the adapters
//! themselves stay behind `Arc<dyn Trait>` where the protocol really is
//! pluggable (see `adapter::mod`).

pub mod brightsign;
pub mod computer;
pub mod credential_store;
pub mod gude_pdu;
pub mod icmpable;
pub mod pjlink;
pub mod webos_tv;
pub mod wolable;

use std::sync::Arc;
use std::time::Duration;

use crate::error::AdapterError;

use super::{Action, Capability, Device};

pub enum ClassSlot {
    Icmpable(icmpable::IcmpableState),
    Wolable(wolable::WolableState),
    Computer(computer::ComputerState),
    Pjlink(pjlink::PjlinkState),
    GudePdu(gude_pdu::GudePduState),
    WebosTv(webos_tv::WebosTvState),
    BrightSign(brightsign::BrightSignState),
}

impl ClassSlot {
    pub fn declared_capabilities(&self) -> &'static [Capability] {
        match self {
            Self::Icmpable(_) => &[],
            Self::Wolable(_) => &[Capability::Wake],
            Self::Computer(_) => {
                &[Capability::Wake, Capability::Shutdown, Capability::Reboot, Capability::Mute, Capability::Unmute]
            }
            Self::Pjlink(_) => &[Capability::Wake, Capability::Shutdown],
            Self::GudePdu(_) => &[],
            Self::WebosTv(_) => &[Capability::Wake, Capability::Shutdown],
            Self::BrightSign(_) => &[Capability::Reboot],
        }
    }
}

/// Runs every registered periodic probe for this device once, gated on its
/// own [`crate::scheduling::Memoized`] runner. Called by the manager's
/// 125ms update tick; most calls are a no-op because no probe is due yet.
pub async fn update(device: &Arc<Device>) {
    match &device.class {
        ClassSlot::Icmpable(state) => icmpable::update(device, state).await,
        ClassSlot::Wolable(state) => wolable::update(device, state).await,
        ClassSlot::Computer(state) => computer::update(device, state).await,
        ClassSlot::Pjlink(state) => pjlink::update(device, state).await,
        ClassSlot::GudePdu(state) => gude_pdu::update(device, state).await,
        ClassSlot::WebosTv(state) => webos_tv::update(device, state).await,
        ClassSlot::BrightSign(_) => {}
    }
}

/// Class-specific immediate refresh hook for `fetch()`. Most classes have
/// nothing extra to do since `Device::fetch` already replays every cached
/// field; reserved for classes that need to kick an out-of-band probe.
pub async fn fetch(_device: &Device) {}

/// A single attempt at `action` for this device's class. Returning `Err`
/// does not stop the retry loop — the caller reports it as a
/// `device_event` error and tries again next interval.
pub async fn attempt(device: &Arc<Device>, action: Action) -> Result<(), AdapterError> {
    match &device.class {
        ClassSlot::Icmpable(_) => Err(AdapterError::unsupported("icmpable devices have no actions")),
        ClassSlot::Wolable(state) => wolable::attempt(device, state, action).await,
        ClassSlot::Computer(state) => computer::attempt(device, state, action).await,
        ClassSlot::Pjlink(state) => pjlink::attempt(device, state, action).await,
        ClassSlot::GudePdu(_) => Err(AdapterError::unsupported("gude pdus have no direct actions")),
        ClassSlot::WebosTv(state) => webos_tv::attempt(device, state, action).await,
        ClassSlot::BrightSign(state) => brightsign::attempt(device, state, action).await,
    }
}

/// Retry cadence between attempts of `action` for this device's class.
pub fn action_interval(device: &Device, action: Action) -> Duration {
    match &device.class {
        ClassSlot::Wolable(_) => wolable::ACTION_INTERVAL,
        ClassSlot::Computer(_) => computer::action_interval(action),
        ClassSlot::Pjlink(_) => pjlink::ACTION_INTERVAL,
        ClassSlot::WebosTv(_) => webos_tv::action_interval(action),
        ClassSlot::BrightSign(_) => brightsign::ACTION_INTERVAL,
        ClassSlot::Icmpable(_) | ClassSlot::GudePdu(_) => Duration::from_secs(30),
    }
}

/// Class-specific cleanup once a target-driven action loop reaches its
/// target (e.g. scheduling a delayed feed power-off after a projector
/// shutdown completes).
pub async fn on_action_complete(device: &Arc<Device>, action: Action) {
    if let ClassSlot::Pjlink(state) = &device.class {
        pjlink::on_action_complete(device, state, action).await;
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod class_mod_tests;
