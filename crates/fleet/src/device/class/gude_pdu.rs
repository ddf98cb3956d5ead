// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::adapter::SnmpPorts;
use crate::device::{Device, OnlineState};
use crate::error::AdapterError;

const WATCH_INTERVAL: Duration = Duration::from_secs(10);

const GUDE_OID: &str = "1.3.6.1.4.1.28507";

/// Per-model OID table: `(num_feeds, port_state_oid_prefix)`, keyed on the
/// second whitespace-separated token of the model string (e.g. `"Gude
/// 8031-1"` keys on `"8031-1"`). The feed at index `i` (0-based) lives at
/// `"{prefix}.{i + 1}"`, matching Gude's 1-based port numbering convention.
fn model_table(model: &str) -> Option<(usize, String)> {
    let token = model.split(' ').nth(1)?;
    let (feeds, subtree) = match token {
        "1104-1" => (1, "68"),
        "1105-1" | "1105-2" => (1, "69"),
        "8031-1" | "8031-2" => (8, "81"),
        "8041-1" | "8041-2" => (12, "85"),
        "8045-1" | "8045-2" => (12, "87"),
        "8291-1" => (21, "98"),
        _ => return None,
    };
    Some((feeds, format!("{GUDE_OID}.{subtree}.1.3.1.2.1.3")))
}

fn resolve_oids(model: &str) -> Result<Vec<String>, AdapterError> {
    let (num_feeds, prefix) =
        model_table(model).ok_or_else(|| AdapterError::protocol(format!("unknown pdu model: {model}")))?;
    Ok((1..=num_feeds).map(|i| format!("{prefix}.{i}")).collect())
}

pub struct GudePduState {
    pub snmp: Arc<dyn SnmpPorts>,
    oids: Vec<String>,
}

impl GudePduState {
    pub fn new(snmp: Arc<dyn SnmpPorts>, model: &str) -> Result<Self, AdapterError> {
        Ok(Self { snmp, oids: resolve_oids(model)? })
    }
}

pub async fn update(device: &Arc<Device>, state: &GudePduState) {
    let immediate = !device.online.read().await.is_initialized();
    let memo = device.memoized("watch_powerfeeds", WATCH_INTERVAL).await;
    if !memo.should_run(immediate).await {
        return;
    }

    let result = refresh(device, state).await;
    memo.finish();
    if let Err(err) = result {
        device.set_is_online(OnlineState::Off).await;
        device.emit_error("watch_powerfeeds", &err).await;
    }
}

async fn refresh(device: &Device, state: &GudePduState) -> Result<(), AdapterError> {
    let ip = device
        .identity
        .read()
        .await
        .primary_ip
        .ok_or_else(|| AdapterError::unreachable("pdu has no primary ip"))?;
    let community = device.config.pdu_community_string.clone();

    let ports = {
        let _guard = device.adapter_lock.lock().await;
        state.snmp.get_ports(ip, &community, &state.oids).await?
    };

    device.set_is_online(OnlineState::On).await;
    for (index, on) in ports.iter().enumerate() {
        device.event(&format!("powerfeed_{index}"), json!(on)).await;
    }
    device.event("powerfeeds", json!(ports)).await;
    Ok(())
}

/// Writes a single feed and polls until the PDU reports the desired value
/// or `deadline` elapses, per §4.3's "retries under a 900s deadline" rule.
/// Called by the manager's [`crate::device::PowerFeedResolver`]
/// implementation, not by the generic action-loop template (PDUs declare no
/// `wake`/`shutdown`/`reboot` capabilities of their own).
pub async fn write_powerfeed(device: &Device, state: &GudePduState, index: usize, on: bool) -> Result<(), AdapterError> {
    let oid = state
        .oids
        .get(index)
        .cloned()
        .ok_or_else(|| AdapterError::protocol(format!("no oid for feed index {index}")))?;
    let deadline = device.config.default_action_timeout();
    let start = std::time::Instant::now();
    let ip = device
        .identity
        .read()
        .await
        .primary_ip
        .ok_or_else(|| AdapterError::unreachable("pdu has no primary ip"))?;
    let community = device.config.pdu_community_string.clone();

    loop {
        let applied = {
            let _guard = device.adapter_lock.lock().await;
            state.snmp.set_ports(ip, &community, &[(oid.clone(), on)]).await?;
            state.snmp.get_ports(ip, &community, std::slice::from_ref(&oid)).await?
        };

        if applied.first().copied() == Some(on) {
            device.event(&format!("powerfeed_{index}"), json!(on)).await;
            return Ok(());
        }
        if start.elapsed() >= deadline {
            return Err(AdapterError::timeout(format!("powerfeed {index} did not reach {on}")));
        }
        tokio::time::sleep(Duration::from_secs(10)).await;
    }
}
