// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bus client abstraction. [`BusHandle`] is a cheap, cloneable publish
//! handle backed by an unbounded channel; the actual transport (MQTT in
//! production, an in-memory loopback in tests) owns the channel's receiver
//! and performs the real I/O in its own task, the way the teacher's
//! `MuxState` holds a concrete transport client rather than a trait object.

pub mod mqtt;

use tokio::sync::mpsc;

/// Quality of service for an outbound publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
}

#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: Qos,
    pub retain: bool,
}

#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Cheap, cloneable publish handle. Publishing never blocks or fails from
/// the caller's perspective: messages are handed to the transport task over
/// an unbounded channel, which queues them internally while disconnected.
#[derive(Clone)]
pub struct BusHandle {
    outbound: mpsc::UnboundedSender<OutboundMessage>,
}

impl BusHandle {
    pub fn new(outbound: mpsc::UnboundedSender<OutboundMessage>) -> Self {
        Self { outbound }
    }

    pub fn publish_json(&self, topic: impl Into<String>, payload: &serde_json::Value, qos: Qos) {
        self.publish_bytes(topic, payload.to_string().into_bytes(), qos, false);
    }

    pub fn publish_retained_json(
        &self,
        topic: impl Into<String>,
        payload: &serde_json::Value,
        qos: Qos,
    ) {
        self.publish_bytes(topic, payload.to_string().into_bytes(), qos, true);
    }

    pub fn publish_empty(&self, topic: impl Into<String>, qos: Qos) {
        self.publish_bytes(topic, Vec::new(), qos, false);
    }

    fn publish_bytes(&self, topic: impl Into<String>, payload: Vec<u8>, qos: Qos, retain: bool) {
        let message = OutboundMessage { topic: topic.into(), payload, qos, retain };
        if self.outbound.send(message).is_err() {
            tracing::warn!("bus publish dropped: transport task has shut down");
        }
    }
}

/// An in-memory loopback transport for tests: recorded publishes are
/// visible to the test via `recorded`, and the test can push
/// [`InboundMessage`]s through `inbound_tx` to simulate the bus delivering
/// a command to the router.
#[cfg(test)]
pub fn test_double() -> (
    BusHandle,
    mpsc::UnboundedSender<InboundMessage>,
    mpsc::UnboundedReceiver<InboundMessage>,
    std::sync::Arc<tokio::sync::Mutex<Vec<OutboundMessage>>>,
) {
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<InboundMessage>();
    let recorded = std::sync::Arc::new(tokio::sync::Mutex::new(Vec::new()));

    let recorded_clone = recorded.clone();
    tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            recorded_clone.lock().await.push(message);
        }
    });

    (BusHandle::new(outbound_tx), inbound_tx, inbound_rx, recorded)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
