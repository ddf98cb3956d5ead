use std::sync::Arc;

use crate::adapter::brightsign::FakeDigestReboot;
use crate::adapter::icmp::FakeIcmpProbe;
use crate::adapter::pjlink::FakePjlinkSession;
use crate::adapter::snmp_gude::FakeSnmpPorts;
use crate::adapter::webos::FakeWebosSession;
use crate::adapter::wol::FakeWolSender;
use crate::adapter::PjlinkStatus;
use crate::device::Capability;

use super::credential_store::InMemoryCredentialStore;
use super::*;

#[test]
fn icmpable_declares_no_capabilities() {
    let state = icmpable::IcmpableState::new(Arc::new(FakeIcmpProbe::new(true)));
    let slot = ClassSlot::Icmpable(state);
    assert!(slot.declared_capabilities().is_empty());
}

#[test]
fn wolable_declares_wake_only() {
    let state = wolable::WolableState::new(Arc::new(FakeIcmpProbe::new(true)), Arc::new(FakeWolSender::new()));
    let slot = ClassSlot::Wolable(state);
    assert_eq!(slot.declared_capabilities(), &[Capability::Wake]);
}

#[test]
fn computer_declares_wake_shutdown_reboot_mute_unmute() {
    let state = computer::ComputerState::new(Arc::new(FakeWolSender::new()));
    let slot = ClassSlot::Computer(state);
    let caps = slot.declared_capabilities();
    assert!(caps.contains(&Capability::Wake));
    assert!(caps.contains(&Capability::Shutdown));
    assert!(caps.contains(&Capability::Reboot));
    assert!(caps.contains(&Capability::Mute));
    assert!(caps.contains(&Capability::Unmute));
}

#[test]
fn pjlink_declares_wake_and_shutdown() {
    let state = pjlink::PjlinkState::new(
        Arc::new(FakeIcmpProbe::new(true)),
        Arc::new(FakePjlinkSession::new(PjlinkStatus::default())),
    );
    let slot = ClassSlot::Pjlink(state);
    assert_eq!(slot.declared_capabilities(), &[Capability::Wake, Capability::Shutdown]);
}

#[test]
fn gude_pdu_declares_no_direct_capabilities() {
    let state = gude_pdu::GudePduState::new(Arc::new(FakeSnmpPorts::new()), "Gude 8031-1").unwrap();
    let slot = ClassSlot::GudePdu(state);
    assert!(slot.declared_capabilities().is_empty());
}

#[test]
fn gude_pdu_rejects_unknown_model() {
    let result = gude_pdu::GudePduState::new(Arc::new(FakeSnmpPorts::new()), "Gude 9999-1");
    assert!(result.is_err());
}

#[test]
fn webos_tv_declares_wake_and_shutdown() {
    let state = webos_tv::WebosTvState::new(
        Arc::new(FakeIcmpProbe::new(true)),
        Arc::new(FakeWolSender::new()),
        Arc::new(FakeWebosSession::new("key")),
        Arc::new(InMemoryCredentialStore::new()),
    );
    let slot = ClassSlot::WebosTv(state);
    assert_eq!(slot.declared_capabilities(), &[Capability::Wake, Capability::Shutdown]);
}

#[test]
fn brightsign_declares_reboot_only() {
    let state = brightsign::BrightSignState::new(Arc::new(FakeDigestReboot::new()));
    let slot = ClassSlot::BrightSign(state);
    assert_eq!(slot.declared_capabilities(), &[Capability::Reboot]);
}
