use serde_json::json;

use super::*;

fn rules() -> DeviceMap {
    serde_yaml::from_str(
        "Computer:\n  - tags: computer\nGudePdu:\n  - tags: pdu\n  - model: Gude Expert Power Control 8080\n",
    )
    .unwrap()
}

#[test]
fn matches_by_tag_membership() {
    let record = json!({ "name": "pc-1", "tags": ["computer", "lab"] });
    assert_eq!(classify(&rules(), &record), "Computer");
}

#[test]
fn matches_second_filter_within_a_class() {
    let record = json!({ "name": "pdu-1", "model": "Gude Expert Power Control 8080", "tags": [] });
    assert_eq!(classify(&rules(), &record), "GudePdu");
}

#[test]
fn falls_back_to_icmpable_when_nothing_matches() {
    let record = json!({ "name": "switch-1", "tags": ["network"] });
    assert_eq!(classify(&rules(), &record), FALLBACK_CLASS);
}

#[test]
fn missing_dot_path_segment_does_not_match_a_scalar_filter() {
    let record = json!({ "name": "pdu-1", "tags": [] });
    assert_eq!(classify(&rules(), &record), FALLBACK_CLASS);
}
