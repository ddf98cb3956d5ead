// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::net::IpAddr;
use std::time::Duration;

use surge_ping::{Client, Config, PingIdentifier, PingSequence};

use crate::error::AdapterError;

use super::{AdapterFuture, IcmpProbe};

const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// ICMP echo adapter backed by `surge-ping`. One `surge_ping::Client` is
/// shared across every device; `ping()` opens a per-call pinger, matching
/// the adapter contract's "count=1, timeout=10s" probe.
pub struct SurgePingAdapter {
    client: Client,
}

impl SurgePingAdapter {
    pub fn new() -> Result<Self, AdapterError> {
        let config = Config::default();
        let client = Client::new(&config)
            .map_err(|e| AdapterError::unreachable(format!("failed to open icmp socket: {e}")))?;
        Ok(Self { client })
    }
}

impl IcmpProbe for SurgePingAdapter {
    fn ping<'a>(&'a self, ip: IpAddr) -> AdapterFuture<'a, bool> {
        Box::pin(async move {
            let ident = PingIdentifier(rand::random::<u16>());
            let mut pinger = self.client.pinger(ip, ident).await;
            pinger.timeout(PING_TIMEOUT);
            let payload = [0u8; 8];

            match tokio::time::timeout(PING_TIMEOUT, pinger.ping(PingSequence(0), &payload)).await
            {
                Ok(Ok(_)) => Ok(true),
                Ok(Err(_)) => Ok(false),
                Err(_) => Ok(false),
            }
        })
    }
}

#[cfg(test)]
pub struct FakeIcmpProbe {
    pub reachable: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl FakeIcmpProbe {
    pub fn new(reachable: bool) -> Self {
        Self { reachable: std::sync::atomic::AtomicBool::new(reachable) }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl IcmpProbe for FakeIcmpProbe {
    fn ping<'a>(&'a self, _ip: IpAddr) -> AdapterFuture<'a, bool> {
        let reachable = self.reachable.load(std::sync::atomic::Ordering::SeqCst);
        Box::pin(async move { Ok(reachable) })
    }
}

#[cfg(test)]
#[path = "icmp_tests.rs"]
mod icmp_tests;
