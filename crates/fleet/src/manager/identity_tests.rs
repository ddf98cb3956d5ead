use serde_json::json;

use super::*;

#[test]
fn prefers_dns_name_over_plain_name() {
    let record = json!({
        "name": "pc-1",
        "primary_ip": {"address": "10.0.0.5/24", "dns_name": "pc-1.example.org"},
        "tags": [{"name": "computer"}],
        "device_role": {"name": "Medienstation 1"},
    });
    let identity = parse_identity(&record);
    assert_eq!(identity.name, "pc-1.example.org");
    assert_eq!(identity.primary_ip, Some("10.0.0.5".parse().unwrap()));
    assert_eq!(identity.role, "Medienstation 1");
    assert_eq!(identity.tags, vec!["computer".to_owned()]);
}

#[test]
fn falls_back_to_plain_name_without_a_primary_ip() {
    let record = json!({ "name": "switch-1" });
    let identity = parse_identity(&record);
    assert_eq!(identity.name, "switch-1");
    assert_eq!(identity.primary_ip, None);
    assert_eq!(identity.role, "");
}

#[test]
fn parses_location_id_and_interfaces() {
    let record = json!({
        "name": "pc-1",
        "location": {"id": 7},
        "interfaces": [{"mac_address": "AA:BB:CC:DD:EE:FF"}, {"mac_address": null}],
    });
    let identity = parse_identity(&record);
    assert_eq!(identity.location_id, Some(7));
    assert_eq!(identity.interfaces, vec!["AA:BB:CC:DD:EE:FF".to_owned()]);
}

#[test]
fn parses_power_link_peers() {
    let record = json!({
        "name": "proj-1",
        "power_ports": [
            {"link_peers": [{"power_panel": {"name": "pdu-1.example.org"}, "name": "3"}]},
        ],
    });
    let identity = parse_identity(&record);
    assert_eq!(identity.power_ports.len(), 1);
    assert_eq!(identity.power_ports[0].link_peers[0].panel_name, "pdu-1.example.org");
    assert_eq!(identity.power_ports[0].link_peers[0].feed_index, 3);
}

#[test]
fn parses_gude_pdu_model() {
    let record = json!({ "name": "pdu-1", "device_type": {"model": "Gude Expert Power Control 8080"} });
    let identity = parse_identity(&record);
    assert_eq!(identity.model.as_deref(), Some("Gude Expert Power Control 8080"));
}
