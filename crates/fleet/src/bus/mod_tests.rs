use super::*;

#[tokio::test]
async fn published_messages_are_recorded_in_order() {
    let (bus, _inbound_tx, _inbound_rx, recorded) = test_double();

    bus.publish_json("manager/device_event", &serde_json::json!({"a": 1}), Qos::AtLeastOnce);
    bus.publish_empty("manager/host/shutdown", Qos::AtLeastOnce);

    tokio::task::yield_now().await;
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    let messages = recorded.lock().await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].topic, "manager/device_event");
    assert_eq!(messages[1].topic, "manager/host/shutdown");
    assert!(messages[1].payload.is_empty());
}

#[tokio::test]
async fn inbound_messages_pushed_by_a_test_are_receivable() {
    let (_bus, inbound_tx, mut inbound_rx, _recorded) = test_double();
    inbound_tx
        .send(InboundMessage { topic: "api/device/wake".to_owned(), payload: b"{}".to_vec() })
        .unwrap();

    let received = inbound_rx.recv().await.unwrap();
    assert_eq!(received.topic, "api/device/wake");
}
