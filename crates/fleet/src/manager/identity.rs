// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maps a raw inventory device record onto [`DeviceIdentity`], grounded in
//! `original_source/devices/device.py`'s `set_data`: the dns name under
//! `primary_ip` wins over the plain `name` field, `tags`/`device_role` are
//! nested objects rather than scalars, and a power link names its panel by
//! device name rather than id.

use std::net::IpAddr;

use serde_json::Value;

use crate::device::{DeviceIdentity, PowerLinkPeer, PowerPort};

fn as_str(value: &Value, key: &str) -> Option<String> {
    value.get(key)?.as_str().map(str::to_owned)
}

fn parse_primary_ip(record: &Value) -> (Option<IpAddr>, Option<String>) {
    let Some(primary_ip) = record.get("primary_ip").filter(|v| !v.is_null()) else {
        return (None, None);
    };
    let address = primary_ip
        .get("address")
        .and_then(Value::as_str)
        .and_then(|cidr| cidr.split('/').next())
        .and_then(|addr| addr.parse::<IpAddr>().ok());
    let dns_name = as_str(primary_ip, "dns_name");
    (address, dns_name)
}

fn parse_tags(record: &Value) -> Vec<String> {
    record
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| tags.iter().filter_map(|t| as_str(t, "name")).collect())
        .unwrap_or_default()
}

fn parse_interfaces(record: &Value) -> Vec<String> {
    record
        .get("interfaces")
        .and_then(Value::as_array)
        .map(|ifaces| ifaces.iter().filter_map(|i| as_str(i, "mac_address")).collect())
        .unwrap_or_default()
}

fn parse_power_ports(record: &Value) -> Vec<PowerPort> {
    let Some(ports) = record.get("power_ports").and_then(Value::as_array) else {
        return Vec::new();
    };
    ports
        .iter()
        .map(|port| {
            let link_peers = port
                .get("link_peers")
                .and_then(Value::as_array)
                .map(|peers| {
                    peers
                        .iter()
                        .filter_map(|peer| {
                            let panel_name = as_str(peer.get("power_panel")?, "name")?;
                            let feed_index = as_str(peer, "name")?.parse::<u32>().ok()?;
                            Some(PowerLinkPeer { panel_name, feed_index })
                        })
                        .collect()
                })
                .unwrap_or_default();
            PowerPort { link_peers }
        })
        .collect()
}

pub fn parse_identity(record: &Value) -> DeviceIdentity {
    let (primary_ip, dns_name) = parse_primary_ip(record);
    let name = dns_name.or_else(|| as_str(record, "name")).unwrap_or_default();
    let role = record.get("device_role").and_then(|r| as_str(r, "name")).unwrap_or_default();
    let location_id = record.get("location").filter(|v| !v.is_null()).and_then(|l| l.get("id")).and_then(Value::as_u64);
    let model = record.get("device_type").and_then(|t| as_str(t, "model"));

    DeviceIdentity {
        name,
        role,
        location_id,
        tags: parse_tags(record),
        interfaces: parse_interfaces(record),
        primary_ip,
        power_ports: parse_power_ports(record),
        model,
    }
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod identity_tests;
