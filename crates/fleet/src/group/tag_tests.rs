use std::path::PathBuf;
use std::sync::Arc;

use crate::adapter::icmp::FakeIcmpProbe;
use crate::adapter::wol::FakeWolSender;
use crate::bus::test_double;
use crate::config::FleetConfig;
use crate::device::class::computer::ComputerState;
use crate::device::class::icmpable::IcmpableState;
use crate::device::class::ClassSlot;
use crate::device::{Device, DeviceIdentity, NullPowerFeedResolver, OnlineState};

use super::*;

fn test_config() -> Arc<FleetConfig> {
    Arc::new(FleetConfig {
        mqtt_hostname: "localhost".to_owned(),
        mqtt_port: 8883,
        api_hostname: "localhost".to_owned(),
        api_system_username: "svc".to_owned(),
        api_system_password: "secret".to_owned(),
        api_root_ca: PathBuf::from("/dev/null"),
        pjlink_password: "projector".to_owned(),
        pdu_community_string: "public".to_owned(),
        ca_certificate: PathBuf::from("/dev/null"),
        client_certificate: PathBuf::from("/dev/null"),
        client_key: PathBuf::from("/dev/null"),
        device_map_path: PathBuf::from("config/device_map.yml"),
        webos_credential_path: PathBuf::from("/dev/null"),
        update_tick_ms: 125,
        icmp_interval_secs: 30,
        default_action_timeout_secs: 1,
        group_wait_timeout_secs: 1,
        inventory_retry_secs: 5,
    })
}

fn device_with_role(name: &str, role: &str, class: ClassSlot) -> Arc<Device> {
    let (bus, _tx, _rx, _recorded) = test_double();
    Arc::new(Device::new(
        1,
        DeviceIdentity { name: name.to_owned(), role: role.to_owned(), ..Default::default() },
        class,
        bus,
        test_config(),
        Arc::new(NullPowerFeedResolver),
    ))
}

fn icmpable(name: &str, role: &str) -> Arc<Device> {
    device_with_role(name, role, ClassSlot::Icmpable(IcmpableState::new(Arc::new(FakeIcmpProbe::new(true)))))
}

fn computer(name: &str, role: &str) -> Arc<Device> {
    device_with_role(name, role, ClassSlot::Computer(ComputerState::new(Arc::new(FakeWolSender::new()))))
}

fn empty_tag(devices: Vec<Arc<Device>>) -> Tag {
    let (bus, _tx, _rx, _recorded) = test_double();
    Tag::new(1, "Room 101".to_owned(), "E-Nummer".to_owned(), devices, bus, test_config())
}

#[tokio::test]
async fn partitions_members_by_role() {
    let pdu = icmpable("pdu-1.example.org", "PDU");
    let switch = icmpable("switch-1.example.org", "Netzwerkswitch");
    let projector = icmpable("proj-1.example.org", "Projektor");
    let monitor = icmpable("mon-1.example.org", "Monitor");
    let pc = computer("pc-1.example.org", "Medienstation 1");
    let other = icmpable("sensor-1.example.org", "Sensor");

    let tag = empty_tag(vec![pdu.clone(), switch.clone(), projector.clone(), monitor.clone(), pc.clone(), other.clone()]);

    assert_eq!(tag.pdus().await.len(), 1);
    assert_eq!(tag.network_switches().await.len(), 1);
    assert_eq!(tag.display_devices().await.len(), 2);
    assert_eq!(tag.computers().await.len(), 1);
    let others = tag.other_devices().await;
    assert_eq!(others.len(), 1);
    assert!(Arc::ptr_eq(&others[0], &other));
}

#[tokio::test]
async fn is_online_follows_member_aggregate() {
    let a = computer("a.example.org", "Medienstation 1");
    let b = computer("b.example.org", "Medienstation 2");
    let tag = empty_tag(vec![a.clone(), b.clone()]);

    assert_eq!(tag.is_online().await, OnlineState::Off);

    a.set_is_online(OnlineState::On).await;
    assert_eq!(tag.is_online().await, OnlineState::Partial);

    b.set_is_online(OnlineState::On).await;
    assert_eq!(tag.is_online().await, OnlineState::On);
}

#[tokio::test]
async fn monitoring_tagged_members_are_excluded_from_ordinary_fan_out_but_not_scram() {
    let mut identity = DeviceIdentity { name: "mon.example.org".to_owned(), role: "Medienstation 1".to_owned(), ..Default::default() };
    identity.tags.push("ctrl mon".to_owned());
    let (bus, _tx, _rx, _recorded) = test_double();
    let device = Arc::new(Device::new(
        1,
        identity,
        ClassSlot::Computer(ComputerState::new(Arc::new(FakeWolSender::new()))),
        bus,
        test_config(),
        Arc::new(NullPowerFeedResolver),
    ));

    assert!(device.capabilities().await.is_empty());
    assert!(!device.declared_capabilities().is_empty());

    let (mutable, non_mutable) = partition_by_declared(&[device.clone()], crate::device::Capability::Mute);
    assert_eq!(mutable.len(), 1);
    assert!(non_mutable.is_empty());
}

#[tokio::test]
async fn contains_device_reflects_current_membership() {
    let a = computer("a.example.org", "Medienstation 1");
    let b = computer("b.example.org", "Medienstation 2");
    let tag = empty_tag(vec![a.clone()]);

    assert!(tag.contains_device(a.id).await);
    assert!(!tag.contains_device(b.id).await);
}

#[tokio::test]
async fn calendar_edge_then_shutdown_suppresses_subsequent_knx_wake() {
    let tag = empty_tag(Vec::new());
    tag.calendar_edge(super::super::CalendarEdge::Start, Some(GroupMethod::Shutdown)).await;

    let started = tokio::time::Instant::now();
    tag.wake(true).await;
    assert!(started.elapsed() < std::time::Duration::from_millis(100), "knx-suppressed wake should return immediately");
}
