// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokio::net::UdpSocket;

use crate::error::AdapterError;

use super::{AdapterFuture, WolSender};

/// Wake-on-LAN magic packet sender. The protocol is a fixed 102-byte UDP
/// broadcast with no ecosystem crate worth depending on for six lines of
/// packet construction, so this hand-rolls it directly over
/// `tokio::net::UdpSocket`.
pub struct UdpWolSender {
    broadcast_addr: String,
}

impl UdpWolSender {
    pub fn new(broadcast_addr: impl Into<String>) -> Self {
        Self { broadcast_addr: broadcast_addr.into() }
    }
}

fn parse_mac(mac: &str) -> Result<[u8; 6], AdapterError> {
    let mut bytes = [0u8; 6];
    let parts: Vec<&str> = mac.split([':', '-']).collect();
    if parts.len() != 6 {
        return Err(AdapterError::protocol(format!("malformed mac address: {mac}")));
    }
    for (i, part) in parts.iter().enumerate() {
        bytes[i] = u8::from_str_radix(part, 16)
            .map_err(|_| AdapterError::protocol(format!("malformed mac address: {mac}")))?;
    }
    Ok(bytes)
}

fn build_magic_packet(mac: [u8; 6]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(6 + 16 * 6);
    packet.extend_from_slice(&[0xFF; 6]);
    for _ in 0..16 {
        packet.extend_from_slice(&mac);
    }
    packet
}

impl WolSender for UdpWolSender {
    fn send_magic_packet<'a>(&'a self, mac: &'a str) -> AdapterFuture<'a, ()> {
        Box::pin(async move {
            let mac_bytes = parse_mac(mac)?;
            let packet = build_magic_packet(mac_bytes);

            let socket = UdpSocket::bind("0.0.0.0:0")
                .await
                .map_err(|e| AdapterError::unreachable(format!("bind failed: {e}")))?;
            socket
                .set_broadcast(true)
                .map_err(|e| AdapterError::unreachable(format!("broadcast enable failed: {e}")))?;
            socket
                .send_to(&packet, (self.broadcast_addr.as_str(), 9))
                .await
                .map_err(|e| AdapterError::unreachable(format!("send failed: {e}")))?;
            Ok(())
        })
    }
}

#[cfg(test)]
pub struct FakeWolSender {
    pub sent: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl FakeWolSender {
    pub fn new() -> Self {
        Self { sent: std::sync::Mutex::new(Vec::new()) }
    }
}

#[cfg(test)]
impl WolSender for FakeWolSender {
    fn send_magic_packet<'a>(&'a self, mac: &'a str) -> AdapterFuture<'a, ()> {
        self.sent.lock().unwrap().push(mac.to_owned());
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
#[path = "wol_tests.rs"]
mod wol_tests;
