// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::VecDeque;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, LastWill, MqttOptions, Packet, QoS, TlsConfiguration, Transport};
use tokio::sync::mpsc;

use crate::config::FleetConfig;

use super::{BusHandle, InboundMessage, OutboundMessage, Qos as BusQos};

/// Topics the manager subscribes to on every (re)connect, matching
/// spec §6's consumed-topic contract.
const SUBSCRIBE_TOPICS: &[&str] =
    &["api/#", "calendar/#", "knx/#", "fac/#", "probe/+/+"];

/// Spawns the production rumqttc-backed bus transport. Outbound publishes
/// made while the broker connection is down are held in an explicit FIFO
/// queue and drained on reconnect — rumqttc's own request channel would
/// eventually deliver them anyway, but an explicit queue keeps the
/// disconnected-publish behavior visible and testable rather than implicit
/// in the mqtt client's internals, mirroring the original's
/// `_message_queue` deque.
pub fn spawn(config: &FleetConfig, client_id: impl Into<String>) -> (BusHandle, mpsc::UnboundedReceiver<InboundMessage>) {
    let mut mqtt_options = MqttOptions::new(client_id, config.mqtt_hostname.clone(), config.mqtt_port);
    mqtt_options.set_keep_alive(Duration::from_secs(30));
    mqtt_options.set_last_will(LastWill::new(
        "manager/status",
        b"offline".to_vec(),
        QoS::AtLeastOnce,
        true,
    ));

    if let Ok(ca) = std::fs::read(&config.ca_certificate) {
        let client_auth = match (
            std::fs::read(&config.client_certificate),
            std::fs::read(&config.client_key),
        ) {
            (Ok(cert), Ok(key)) => Some((cert, rumqttc::Key::ECC(key))),
            _ => None,
        };
        mqtt_options.set_transport(Transport::Tls(TlsConfiguration::Simple {
            ca,
            alpn: None,
            client_auth,
        }));
    }

    let (client, event_loop) = AsyncClient::new(mqtt_options, 256);

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<InboundMessage>();

    tokio::spawn(run(client, event_loop, outbound_rx, inbound_tx));

    (BusHandle::new(outbound_tx), inbound_rx)
}

async fn run(
    client: AsyncClient,
    mut event_loop: rumqttc::EventLoop,
    mut outbound_rx: mpsc::UnboundedReceiver<OutboundMessage>,
    inbound_tx: mpsc::UnboundedSender<InboundMessage>,
) {
    let mut queue: VecDeque<OutboundMessage> = VecDeque::new();
    let mut connected = false;

    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(message) => {
                        queue.push_back(message);
                        if connected {
                            drain(&client, &mut queue).await;
                        }
                    }
                    None => return, // every BusHandle was dropped
                }
            }
            event = event_loop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        connected = true;
                        tracing::info!("mqtt bus connected");
                        for topic in SUBSCRIBE_TOPICS {
                            if let Err(e) = client.subscribe(*topic, QoS::AtLeastOnce).await {
                                tracing::warn!(topic, err = %e, "mqtt subscribe failed");
                            }
                        }
                        drain(&client, &mut queue).await;
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let _ = inbound_tx.send(InboundMessage {
                            topic: publish.topic.clone(),
                            payload: publish.payload.to_vec(),
                        });
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        connected = false;
                        tracing::warn!("mqtt broker sent disconnect");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        if connected {
                            tracing::warn!(err = %e, "mqtt connection lost, publishes will queue");
                        }
                        connected = false;
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }
}

async fn drain(client: &AsyncClient, queue: &mut VecDeque<OutboundMessage>) {
    while let Some(message) = queue.pop_front() {
        let qos = match message.qos {
            BusQos::AtMostOnce => QoS::AtMostOnce,
            BusQos::AtLeastOnce => QoS::AtLeastOnce,
        };
        let publish = client.publish(&message.topic, qos, message.retain, message.payload.clone());
        if let Err(e) = publish.await {
            tracing::warn!(topic = %message.topic, err = %e, "publish failed, re-queueing");
            queue.push_front(message);
            break;
        }
    }
}
