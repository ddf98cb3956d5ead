// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capability adapters: one per wire protocol, each behind a small
//! object-safe trait so device classes can hold `Arc<dyn Trait>` the way
//! the teacher's pollers hold a concrete `UpstreamClient`. Every method is
//! timeout-bounded internally and returns [`AdapterError`] rather than
//! panicking.
//!
//! Traits return boxed futures (`Pin<Box<dyn Future<...> + Send + '_>>`)
//! rather than using `async-trait`, mirroring the `Detector` pattern in the
//! driver crate this service was generalized from.

pub mod brightsign;
pub mod icmp;
pub mod pjlink;
pub mod snmp_gude;
pub mod webos;
pub mod wol;

use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;

use crate::error::AdapterError;

pub type AdapterFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AdapterError>> + Send + 'a>>;

/// ICMP echo probe, used by every class derived from ICMPable.
pub trait IcmpProbe: Send + Sync {
    fn ping<'a>(&'a self, ip: IpAddr) -> AdapterFuture<'a, bool>;
}

/// Wake-on-LAN magic packet sender.
pub trait WolSender: Send + Sync {
    fn send_magic_packet<'a>(&'a self, mac: &'a str) -> AdapterFuture<'a, ()>;
}

/// Observed PJLink projector power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PjlinkPower {
    On,
    Warming,
    Cooling,
    Off,
    Unknown,
}

#[derive(Debug, Clone, Default)]
pub struct PjlinkStatus {
    pub power: Option<PjlinkPower>,
    pub class: Option<u8>,
    pub lamps: Vec<(bool, u32)>,
    pub errors: std::collections::HashMap<String, String>,
    pub resolution: Option<String>,
}

/// A single PJLink probe session. Adapters open a short-lived TCP session
/// per call rather than holding one open across awaits, per the credential
/// store / session-lifetime redesign in the design notes.
pub trait PjlinkSession: Send + Sync {
    fn query<'a>(&'a self, ip: IpAddr, password: &'a str) -> AdapterFuture<'a, PjlinkStatus>;
    fn set_power<'a>(&'a self, ip: IpAddr, password: &'a str, on: bool) -> AdapterFuture<'a, ()>;
}

/// SNMP v2c get/set against a Gude PDU's port-state table.
pub trait SnmpPorts: Send + Sync {
    fn get_ports<'a>(
        &'a self,
        ip: IpAddr,
        community: &'a str,
        oids: &'a [String],
    ) -> AdapterFuture<'a, Vec<bool>>;

    fn set_ports<'a>(
        &'a self,
        ip: IpAddr,
        community: &'a str,
        values: &'a [(String, bool)],
    ) -> AdapterFuture<'a, Vec<bool>>;
}

/// WebOS websocket handshake + remote power control.
pub trait WebosSession: Send + Sync {
    fn connect_and_register<'a>(
        &'a self,
        ip: IpAddr,
        stored_client_key: Option<&'a str>,
    ) -> AdapterFuture<'a, String>;

    fn power_off<'a>(&'a self, ip: IpAddr, client_key: &'a str) -> AdapterFuture<'a, ()>;
}

/// HTTP Digest control surface used by BrightSign players.
pub trait DigestReboot: Send + Sync {
    fn reboot<'a>(&'a self, ip: IpAddr, username: &'a str, password: &'a str) -> AdapterFuture<'a, ()>;
}
