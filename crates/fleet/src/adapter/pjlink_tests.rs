use super::*;

#[test]
fn parses_power_codes() {
    assert_eq!(parse_power("0"), PjlinkPower::Off);
    assert_eq!(parse_power("1"), PjlinkPower::On);
    assert_eq!(parse_power("2"), PjlinkPower::Cooling);
    assert_eq!(parse_power("3"), PjlinkPower::Warming);
    assert_eq!(parse_power("9"), PjlinkPower::Unknown);
}

#[test]
fn parses_error_status_skipping_zero_fields() {
    let errors = parse_errors("100200");
    assert_eq!(errors.get("fan"), Some(&"1".to_owned()));
    assert_eq!(errors.get("lamp"), None);
    assert_eq!(errors.get("temperature"), Some(&"2".to_owned()));
    assert_eq!(errors.len(), 2);
}

#[test]
fn parses_lamp_pairs() {
    let lamps = parse_lamps("120 1 340 0");
    assert_eq!(lamps, vec![(true, 120), (false, 340)]);
}

#[test]
fn md5_digest_is_deterministic_and_matches_known_vector() {
    // "helloworld" → a known RFC-1321-compatible MD5 vector.
    let digest = md5_hex(b"helloworld");
    assert_eq!(digest, "fc5e038d38a57032085441e7fe7010b0");
    assert_eq!(digest.len(), 32);
}
