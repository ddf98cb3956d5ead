// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Error kinds shared by every capability adapter and by the crate-wide
/// error type. Kept as a flat enum (rather than per-adapter types) so a
/// device's error event can always report one of these regardless of which
/// wire protocol produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unreachable,
    Protocol,
    Auth,
    Timeout,
    Unsupported,
    BusDisconnected,
    InventoryMismatch,
    NotSubscribed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unreachable => "UNREACHABLE",
            Self::Protocol => "PROTOCOL",
            Self::Auth => "AUTH",
            Self::Timeout => "TIMEOUT",
            Self::Unsupported => "UNSUPPORTED",
            Self::BusDisconnected => "BUS_DISCONNECTED",
            Self::InventoryMismatch => "INVENTORY_MISMATCH",
            Self::NotSubscribed => "NOT_SUBSCRIBED",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error surfaced by a capability adapter. Adapters never panic; every
/// failure path returns one of these, wrapped in the operation's deadline.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct AdapterError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AdapterError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unreachable, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported, message)
    }
}

/// Crate-wide error type, covering everything above the adapter boundary:
/// bus plumbing, inventory sync, and routing.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("bus disconnected")]
    BusDisconnected,

    #[error("inventory fetch failed: {0}")]
    Inventory(String),

    #[error("inventory record did not match the expected shape: {0}")]
    InventoryMismatch(String),

    #[error("device not subscribed: {0}")]
    NotSubscribed(String),

    #[error("malformed bus message on {topic}: {message}")]
    MalformedMessage { topic: String, message: String },
}

impl FleetError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Adapter(e) => e.kind,
            Self::BusDisconnected => ErrorKind::BusDisconnected,
            Self::Inventory(_) => ErrorKind::Unreachable,
            Self::InventoryMismatch(_) => ErrorKind::InventoryMismatch,
            Self::NotSubscribed(_) => ErrorKind::NotSubscribed,
            Self::MalformedMessage { .. } => ErrorKind::Protocol,
        }
    }
}

/// Wire shape for `manager/device_event` (and tag/location equivalents)
/// when reporting a failure, matching the bus contract's
/// `{error:{message, errors[], time}}` body exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub message: String,
    #[serde(default)]
    pub errors: Vec<String>,
    pub time_ms: u64,
}

impl ErrorEvent {
    pub fn new(message: impl Into<String>, errors: Vec<String>) -> Self {
        let time_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self { message: message.into(), errors, time_ms }
    }

    pub fn from_error(err: &FleetError) -> Self {
        Self::new(err.to_string(), vec![err.kind().as_str().to_owned()])
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
