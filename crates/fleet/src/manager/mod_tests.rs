// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;

use crate::adapter::icmp::FakeIcmpProbe;
use crate::adapter::pjlink::FakePjlinkSession;
use crate::adapter::snmp_gude::FakeSnmpPorts;
use crate::adapter::wol::FakeWolSender;
use crate::adapter::{PjlinkPower, PjlinkStatus};
use crate::bus::{test_double, InboundMessage};
use crate::device::{NullPowerFeedResolver, PowerLinkPeer, PowerPort};

use super::*;

fn test_config() -> Arc<FleetConfig> {
    Arc::new(FleetConfig {
        mqtt_hostname: "localhost".to_owned(),
        mqtt_port: 8883,
        api_hostname: "localhost".to_owned(),
        api_system_username: "svc".to_owned(),
        api_system_password: "secret".to_owned(),
        api_root_ca: PathBuf::from("config/does-not-exist-ca.pem"),
        pjlink_password: "projector".to_owned(),
        pdu_community_string: "public".to_owned(),
        ca_certificate: PathBuf::from("/dev/null"),
        client_certificate: PathBuf::from("/dev/null"),
        client_key: PathBuf::from("/dev/null"),
        device_map_path: PathBuf::from("config/classify.yaml"),
        webos_credential_path: PathBuf::from("/dev/null"),
        update_tick_ms: 125,
        icmp_interval_secs: 30,
        default_action_timeout_secs: 120,
        group_wait_timeout_secs: 2,
        inventory_retry_secs: 1,
    })
}

fn identity(name: &str) -> DeviceIdentity {
    DeviceIdentity {
        name: name.to_owned(),
        role: String::new(),
        location_id: None,
        tags: Vec::new(),
        interfaces: Vec::new(),
        primary_ip: None,
        power_ports: Vec::new(),
        model: None,
    }
}

/// Builds a `ManagerState` directly from its private fields rather than
/// `ManagerState::new`, which would dial the real inventory API and read
/// `classify.yaml` off disk. Safe only from this descendant test module.
fn test_manager(config: Arc<FleetConfig>, bus: BusHandle, device_map: classify::DeviceMap) -> Arc<ManagerState> {
    Arc::new(ManagerState {
        devices: RwLock::new(HashMap::new()),
        tags: RwLock::new(HashMap::new()),
        locations: RwLock::new(HashMap::new()),
        last_online: RwLock::new(HashMap::new()),
        update_in_flight: Mutex::new(HashSet::new()),
        group_tasks: Mutex::new(HashMap::new()),
        setup_lock: Mutex::new(()),
        device_map,
        api: inventory::ApiClient::new(&config).expect("building a test api client"),
        bus,
        config,
        credentials: Arc::new(JsonFileCredentialStore::new(PathBuf::from("/dev/null"))),
    })
}

async fn device_event_body(recorded: &std::sync::Arc<tokio::sync::Mutex<Vec<crate::bus::OutboundMessage>>>, target: &str, field: &str) -> Vec<Value> {
    recorded
        .lock()
        .await
        .iter()
        .filter(|m| m.topic == "manager/device_event")
        .filter_map(|m| serde_json::from_slice::<Value>(&m.payload).ok())
        .filter(|body| {
            body.get("data").and_then(|d| d.get("event")).is_some_and(|e| e.get("target") == Some(&json!(target)) && e.get("type") == Some(&json!(field)))
        })
        .collect()
}

/// Scenario: a PDU-backed computer, OFF and unpowered, receives a wake
/// command. The feed is switched on before WOL is sent, and an MQTT
/// heartbeat from the on-device agent is what finally flips it ON.
#[tokio::test(start_paused = true)]
async fn pdu_backed_computer_wake_sends_power_then_wol_then_online_once() {
    let config = test_config();
    let (bus, _inbound_tx, _inbound_rx, recorded) = test_double();
    let manager = test_manager(config.clone(), bus.clone(), classify::DeviceMap::new());

    let snmp = Arc::new(FakeSnmpPorts::new());
    let mut pdu_ident = identity("pdu17.example.org");
    pdu_ident.model = Some("Gude 8031-1".to_owned());
    pdu_ident.primary_ip = Some("10.0.0.50".parse().unwrap());
    let pdu = Arc::new(Device::new(
        100,
        pdu_ident,
        ClassSlot::GudePdu(GudePduState::new(snmp.clone(), "Gude 8031-1").unwrap()),
        bus.clone(),
        config.clone(),
        Arc::new(NullPowerFeedResolver),
    ));
    manager.devices.write().await.insert(100, pdu);

    let wol = Arc::new(FakeWolSender::new());
    let mut comp_ident = identity("computer1.example.org");
    comp_ident.interfaces = vec!["aa:bb:cc:dd:ee:01".to_owned()];
    comp_ident.power_ports = vec![PowerPort { link_peers: vec![PowerLinkPeer { panel_name: "pdu17.example.org".to_owned(), feed_index: 0 }] }];
    let computer = Arc::new(Device::new(
        101,
        comp_ident,
        ClassSlot::Computer(ComputerState::new(wol.clone())),
        bus.clone(),
        config.clone(),
        manager.clone(),
    ));
    manager.devices.write().await.insert(101, computer.clone());

    manager.device_method(101, "wake", &Value::Null).await;
    tokio::time::sleep(Duration::from_secs(12)).await;

    assert!(wol.sent.lock().unwrap().contains(&"aa:bb:cc:dd:ee:01".to_owned()), "wol should be sent once the feed is powered");
    assert_eq!(snmp.ports.lock().unwrap().get("1.3.6.1.4.1.28507.81.1.3.1.2.1.3.1"), Some(&true), "the computer's feed should be switched on");

    computer.on_probe_field("ping", &json!(true)).await;
    computer.update().await;

    assert_eq!(computer.is_online().await, OnlineState::On);
    let online_events = device_event_body(&recorded, "computer1.example.org", "is_online").await;
    assert_eq!(online_events.len(), 1, "is_online should be emitted exactly once");
}

/// Scenario: an ON projector is told to shut down. The PJLink command is
/// attempted immediately; the aggregate state eases through PARTIAL (a
/// pingable projector reporting PJLink power "off" is still PARTIAL) before
/// losing the network entirely and the three-consecutive-OFF hysteresis
/// finally reports OFF.
#[tokio::test(start_paused = true)]
async fn projector_shutdown_eases_through_partial_before_off() {
    let config = test_config();
    let (bus, _inbound_tx, _inbound_rx, _recorded) = test_double();

    let pjlink = Arc::new(FakePjlinkSession::new(PjlinkStatus { power: Some(PjlinkPower::On), ..Default::default() }));
    let icmp = Arc::new(FakeIcmpProbe::new(true));
    let mut ident = identity("projector1.example.org");
    ident.role = "Projektor".to_owned();
    ident.primary_ip = Some("10.0.0.9".parse().unwrap());
    let projector = Arc::new(Device::new(
        1,
        ident,
        ClassSlot::Pjlink(PjlinkState::new(icmp.clone(), pjlink.clone())),
        bus,
        config,
        Arc::new(NullPowerFeedResolver),
    ));

    projector.update().await;
    assert_eq!(projector.is_online().await, OnlineState::On);

    projector.shutdown().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(pjlink.set_power_calls.lock().unwrap().contains(&false), "turn_off should have been attempted");

    pjlink.status.lock().unwrap().power = Some(PjlinkPower::Cooling);
    tokio::time::sleep(Duration::from_secs(11)).await;
    projector.update().await;
    assert_eq!(projector.is_online().await, OnlineState::Partial);
    assert!(!projector.actions.read().await.should_shutdown, "reaching PARTIAL already satisfies the shutdown target");

    pjlink.status.lock().unwrap().power = Some(PjlinkPower::Off);
    tokio::time::sleep(Duration::from_secs(11)).await;
    projector.update().await;
    assert_eq!(projector.is_online().await, OnlineState::Partial, "a pingable projector reporting PJLink power off is still PARTIAL, not OFF");

    icmp.set_reachable(false);
    for _ in 0..3 {
        tokio::time::sleep(Duration::from_secs(11)).await;
        projector.update().await;
    }
    assert_eq!(projector.is_online().await, OnlineState::Off, "OFF is reported only once the projector is unreachable");
}

/// Scenario: a fire alarm scrams two locations by id. The mutable computer
/// is muted, the non-mutable one is shut down and awaited, and the display
/// is shut down last — all fanned out through a location's "E-Nummer"
/// element tag.
#[tokio::test(start_paused = true)]
async fn fire_alarm_mutes_computers_and_shuts_down_the_rest() {
    let config = test_config();
    let (bus, _inbound_tx, _inbound_rx, recorded) = test_double();
    let manager = test_manager(config.clone(), bus.clone(), classify::DeviceMap::new());

    let wol = Arc::new(FakeWolSender::new());
    let mut mutable_ident = identity("mutable.example.org");
    mutable_ident.role = "Medienstation A".to_owned();
    let mutable_computer = Arc::new(Device::new(
        1,
        mutable_ident,
        ClassSlot::Computer(ComputerState::new(wol.clone())),
        bus.clone(),
        config.clone(),
        Arc::new(NullPowerFeedResolver),
    ));

    let non_mutable_pjlink = Arc::new(FakePjlinkSession::new(PjlinkStatus { power: Some(PjlinkPower::On), ..Default::default() }));
    let mut non_mutable_ident = identity("non-mutable.example.org");
    non_mutable_ident.role = "Medienstation B".to_owned();
    non_mutable_ident.primary_ip = Some("10.0.0.10".parse().unwrap());
    let non_mutable_computer = Arc::new(Device::new(
        2,
        non_mutable_ident,
        ClassSlot::Pjlink(PjlinkState::new(Arc::new(FakeIcmpProbe::new(true)), non_mutable_pjlink.clone())),
        bus.clone(),
        config.clone(),
        Arc::new(NullPowerFeedResolver),
    ));

    let display_pjlink = Arc::new(FakePjlinkSession::new(PjlinkStatus { power: Some(PjlinkPower::On), ..Default::default() }));
    let mut display_ident = identity("display.example.org");
    display_ident.role = "Projektor".to_owned();
    display_ident.primary_ip = Some("10.0.0.11".parse().unwrap());
    let display = Arc::new(Device::new(
        3,
        display_ident,
        ClassSlot::Pjlink(PjlinkState::new(Arc::new(FakeIcmpProbe::new(true)), display_pjlink.clone())),
        bus.clone(),
        config.clone(),
        Arc::new(NullPowerFeedResolver),
    ));

    let element_tag = Arc::new(Tag::new(
        101,
        "E17".to_owned(),
        "E-Nummer".to_owned(),
        vec![mutable_computer.clone(), non_mutable_computer.clone(), display.clone()],
        bus.clone(),
        config.clone(),
    ));
    let location = Arc::new(Location::new(
        17,
        "Room 17".to_owned(),
        vec![mutable_computer.clone(), non_mutable_computer.clone(), display.clone()],
        vec![element_tag],
        bus.clone(),
        config.clone(),
    ));
    let empty_location = Arc::new(Location::new(18, "Room 18".to_owned(), Vec::new(), Vec::new(), bus.clone(), config.clone()));
    manager.locations.write().await.insert(17, location);
    manager.locations.write().await.insert(18, empty_location);

    router::route(&manager, InboundMessage { topic: "fac/scram/17,18".to_owned(), payload: Vec::new() }).await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let mute_published = recorded.lock().await.iter().any(|m| m.topic == "manager/mutable.example.org/mute");
    assert!(mute_published, "the mutable computer should receive a mute command");
    assert!(!non_mutable_pjlink.set_power_calls.lock().unwrap().is_empty(), "the non-mutable computer should be shut down, not muted");
    assert!(!display_pjlink.set_power_calls.lock().unwrap().is_empty(), "the display should be shut down after the computers");
}

/// Scenario: a calendar-triggered shutdown window is active when the KNX
/// wall switch reports ON. The switch state is still recorded, but no wake
/// is dispatched to the location's elements.
#[tokio::test(start_paused = true)]
async fn knx_on_during_calendar_shutdown_does_not_wake() {
    let config = test_config();
    let (bus, _inbound_tx, _inbound_rx, _recorded) = test_double();
    let manager = test_manager(config.clone(), bus.clone(), classify::DeviceMap::new());

    let wol = Arc::new(FakeWolSender::new());
    let mut ident = identity("computer5.example.org");
    ident.interfaces = vec!["aa:bb:cc:dd:ee:05".to_owned()];
    let computer = Arc::new(Device::new(
        1,
        ident,
        ClassSlot::Wolable(WolableState::new(Arc::new(FakeIcmpProbe::new(false)), wol.clone())),
        bus.clone(),
        config.clone(),
        Arc::new(NullPowerFeedResolver),
    ));
    let element_tag = Arc::new(Tag::new(201, "E5".to_owned(), "E-Nummer".to_owned(), vec![computer.clone()], bus.clone(), config.clone()));
    let location = Arc::new(Location::new(5, "Room 5".to_owned(), vec![computer.clone()], vec![element_tag], bus.clone(), config.clone()));
    manager.locations.write().await.insert(5, location.clone());

    router::route(
        &manager,
        InboundMessage { topic: "calendar/start/location/shutdown".to_owned(), payload: json!({"data": {"id": 5}}).to_string().into_bytes() },
    )
    .await;
    tokio::time::sleep(Duration::from_secs(3)).await;

    router::route(&manager, InboundMessage { topic: "knx/switch/5".to_owned(), payload: json!({"state": true}).to_string().into_bytes() }).await;
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert!(wol.sent.lock().unwrap().is_empty(), "a knx switch during a calendar shutdown window must not trigger a wake");
    assert_eq!(location.knx_state().await, crate::group::location::KnxState::On);
    assert_eq!(computer.is_online().await, OnlineState::Off);
}

/// Scenario: an inventory resync updates an existing device's role via
/// `set_data` without disturbing its running task, and tag membership is
/// rederived from the resynced device's tags.
#[tokio::test(start_paused = true)]
async fn inventory_resync_updates_role_keeps_running_tasks_and_rederives_groups() {
    let config = test_config();
    let (bus, _inbound_tx, _inbound_rx, _recorded) = test_double();
    let manager = test_manager(config.clone(), bus.clone(), classify::DeviceMap::new());

    let wol = Arc::new(FakeWolSender::new());
    let mut ident = identity("station42.example.org");
    ident.role = "Medienstation".to_owned();
    ident.tags = vec!["computer".to_owned()];
    ident.interfaces = vec!["aa:bb:cc:dd:ee:42".to_owned()];
    let device =
        Arc::new(Device::new(42, ident, ClassSlot::Computer(ComputerState::new(wol.clone())), bus.clone(), config.clone(), Arc::new(NullPowerFeedResolver)));
    manager.devices.write().await.insert(42, device.clone());

    device.wake().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(device.actions.read().await.should_wake, "a wake task should be running before resync");

    let record_v2 = json!({
        "id": 42,
        "name": "station42",
        "primary_ip": {"address": "10.0.0.42/24", "dns_name": "station42.example.org"},
        "device_role": {"name": "Lehrstation"},
        "tags": [{"name": "computer"}],
        "interfaces": [{"mac_address": "aa:bb:cc:dd:ee:42"}],
    });
    manager.apply_devices(std::slice::from_ref(&record_v2)).await;

    let resynced = manager.devices.read().await.get(&42).cloned().expect("device still subscribed after resync");
    assert!(Arc::ptr_eq(&resynced, &device), "resync updates the existing device in place rather than replacing it");
    assert_eq!(resynced.identity.read().await.role, "Lehrstation");
    assert!(resynced.actions.read().await.should_wake, "resync must not cancel the in-flight wake task");

    let tag_record = json!({"id": 301, "name": "computer", "description": "Computers"});
    let all_devices: Vec<Arc<Device>> = manager.devices.read().await.values().cloned().collect();
    manager.apply_tags(std::slice::from_ref(&tag_record), &all_devices).await;
    let tag = manager.tags.read().await.get(&301).cloned().expect("tag created from the resynced device's tags");
    assert!(tag.contains_device(42).await, "group membership is rederived from the resynced device's tags");
}

/// Scenario: a probe arrives for a device that was never subscribed. One
/// error event is published and no device state changes.
#[tokio::test(start_paused = true)]
async fn probe_for_unknown_device_publishes_a_single_error_event() {
    let config = test_config();
    let (bus, _inbound_tx, _inbound_rx, recorded) = test_double();
    let manager = test_manager(config, bus, classify::DeviceMap::new());

    router::route(&manager, InboundMessage { topic: "probe/unknown.host/ping".to_owned(), payload: json!(true).to_string().into_bytes() }).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let messages = recorded.lock().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].topic, "manager/device_event");
    let body: Value = serde_json::from_slice(&messages[0].payload).unwrap();
    assert_eq!(body["error"]["message"], "Device not subscribed: unknown.host");
}
