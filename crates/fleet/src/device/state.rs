// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

/// A device's observed power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OnlineState {
    Off,
    Partial,
    On,
}

impl OnlineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Partial => "PARTIAL",
            Self::On => "ON",
        }
    }
}

/// Capabilities a device class may declare. A device tagged `"ctrl mon"`
/// reports an empty capability set from [`crate::device::Device::capabilities`]
/// (monitoring-only), though its `declared_capabilities` are unchanged —
/// `scram`/`unscram` read the declared list directly, bypassing that filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Wake,
    Shutdown,
    Reboot,
    Mute,
    Unmute,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wake => "wake",
            Self::Shutdown => "shutdown",
            Self::Reboot => "reboot",
            Self::Mute => "mute",
            Self::Unmute => "unmute",
        }
    }
}

/// Target flags for the three closed-loop actions. Cleared wholesale by
/// `cancel()`; individually cleared when the observed state makes a flag
/// inconsistent (e.g. `should_wake` on transition to ON).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionFlags {
    pub should_wake: bool,
    pub should_shutdown: bool,
    pub should_reboot: bool,
}

impl ActionFlags {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Drops flags that no longer make sense for the newly observed state,
    /// per the Device invariant: "when `is_online` becomes non-ON, every
    /// `should_*` action flag inconsistent with the observed state is
    /// cleared".
    pub fn reconcile(&mut self, state: OnlineState) {
        match state {
            OnlineState::On => {
                self.should_wake = false;
                self.should_reboot = false;
            }
            OnlineState::Off | OnlineState::Partial => self.should_shutdown = false,
        }
    }
}

/// Tracks `is_online` with the three-consecutive-OFF hysteresis rule.
#[derive(Debug, Clone)]
pub struct OnlineTracker {
    state: OnlineState,
    initialized: bool,
    offline_streak: u8,
}

impl Default for OnlineTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl OnlineTracker {
    pub fn new() -> Self {
        Self { state: OnlineState::Off, initialized: false, offline_streak: 0 }
    }

    pub fn state(&self) -> OnlineState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Feeds a freshly observed state through the hysteresis rule. Returns
    /// `Some(new_state)` if the observation produced a state change that
    /// should be emitted as an event, `None` otherwise (including every
    /// suppressed OFF observation).
    pub fn observe(&mut self, observed: OnlineState) -> Option<OnlineState> {
        self.initialized = true;

        if observed == OnlineState::Off && self.offline_streak < 3 {
            self.offline_streak += 1;
            None
        } else {
            self.offline_streak = 0;
            if self.state != observed {
                self.state = observed;
                Some(observed)
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod state_tests;
