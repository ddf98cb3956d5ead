// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatches an inbound bus message to a manager/device method by topic,
//! grounded in `original_source/app.py`'s `async for message in messages`
//! loop. Topics are mutually exclusive so each branch returns once matched.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::bus::{BusHandle, InboundMessage, Qos};
use crate::group::{CalendarEdge, GroupMethod};

use super::ManagerState;

fn payload_json(payload: &[u8]) -> Value {
    serde_json::from_slice(payload).unwrap_or(Value::Null)
}

fn data_id(payload: &Value) -> Option<u64> {
    payload.get("data")?.get("id")?.as_u64()
}

fn params(payload: &Value) -> Value {
    payload.get("params").cloned().unwrap_or(Value::Null)
}

fn publish_not_subscribed(bus: &BusHandle, fqdn: &str) {
    let message = format!("Device not subscribed: {fqdn}");
    tracing::error!(fqdn, "{message}");
    let body = json!({ "error": { "message": message, "errors": [], "time_ms": 0 } });
    bus.publish_json("manager/device_event", &body, Qos::AtMostOnce);
}

/// Routes one [`InboundMessage`] to the manager. Spawned as its own task by
/// the caller per message so a slow handler (inventory resync) never stalls
/// the bus receive loop.
pub async fn route(manager: &Arc<ManagerState>, message: InboundMessage) {
    let topic = message.topic.as_str();
    let segments: Vec<&str> = topic.split('/').collect();

    if let ["probe", fqdn, field] = segments.as_slice() {
        route_probe(manager, fqdn, field, &message.payload).await;
        return;
    }

    if topic == "api/data-refresh" {
        manager.setup(false).await;
        return;
    }

    let payload = payload_json(&message.payload);

    if topic == "api/subscribe_devices" {
        manager.subscribe_devices_delta(&payload).await;
        return;
    }

    if let ["api", "device", method_name] = segments.as_slice() {
        let Some(id) = data_id(&payload) else {
            tracing::warn!(topic, "api/device message missing data.id");
            return;
        };
        manager.device_method(id, method_name, &params(&payload)).await;
        return;
    }

    if let ["api", "tag", method_name] = segments.as_slice() {
        let Some(id) = data_id(&payload) else {
            tracing::warn!(topic, "api/tag message missing data.id");
            return;
        };
        manager.tag_method(id, method_name, false).await;
        return;
    }

    if let ["api", "location", method_name] = segments.as_slice() {
        let Some(id) = data_id(&payload) else {
            tracing::warn!(topic, "api/location message missing data.id");
            return;
        };
        manager.location_method(id, method_name, false).await;
        return;
    }

    if let ["calendar", edge, kind, method_name] = segments.as_slice() {
        route_calendar(manager, edge, kind, method_name, &payload).await;
        return;
    }

    if let ["knx", "switch", location_id] = segments.as_slice() {
        let Ok(id) = location_id.parse::<u64>() else {
            tracing::warn!(topic, "knx/switch with a non-numeric location id");
            return;
        };
        let on = payload.get("state").and_then(Value::as_bool).unwrap_or(false);
        manager.location_knx_switch(id, on).await;
        return;
    }

    if let ["fac", method_name, location_ids] = segments.as_slice() {
        for raw_id in location_ids.split(',') {
            let Ok(id) = raw_id.parse::<u64>() else {
                tracing::warn!(topic, raw_id, "fac/# with a non-numeric location id");
                continue;
            };
            manager.location_method(id, method_name, false).await;
        }
        return;
    }

    tracing::debug!(topic, "no route matched");
}

async fn route_probe(manager: &Arc<ManagerState>, fqdn: &str, field: &str, payload: &[u8]) {
    let Some(device) = manager.find_device_by_name(fqdn).await else {
        publish_not_subscribed(&manager.bus, fqdn);
        return;
    };
    let body = payload_json(payload);
    device.on_probe_field(field, &body).await;
}

async fn route_calendar(manager: &Arc<ManagerState>, edge: &str, kind: &str, method_name: &str, payload: &Value) {
    let Some(id) = data_id(payload) else {
        tracing::warn!(edge, kind, method_name, "calendar message missing data.id");
        return;
    };
    let Some(calendar_edge) = CalendarEdge::parse(edge) else {
        tracing::warn!(edge, "unknown calendar edge");
        return;
    };
    let method = GroupMethod::parse(method_name);

    if method_name != "clear" {
        match kind {
            "device" => manager.device_method(id, method_name, &Value::Null).await,
            "tag" => manager.tag_method(id, method_name, false).await,
            "location" => manager.location_method(id, method_name, false).await,
            other => tracing::warn!(kind = other, "unknown calendar entity kind"),
        }
    }

    match kind {
        "tag" => manager.tag_calendar_edge(id, calendar_edge, method).await,
        "location" => manager.location_calendar_edge(id, calendar_edge, method).await,
        "device" => {}
        other => tracing::warn!(kind = other, "unknown calendar entity kind"),
    }
}
