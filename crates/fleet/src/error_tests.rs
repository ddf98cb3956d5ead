use super::*;

#[test]
fn adapter_error_kind_round_trips_through_as_str() {
    let err = AdapterError::timeout("pjlink query timed out");
    assert_eq!(err.kind.as_str(), "TIMEOUT");
    assert_eq!(err.to_string(), "TIMEOUT: pjlink query timed out");
}

#[test]
fn fleet_error_kind_mirrors_wrapped_adapter_error() {
    let err = FleetError::from(AdapterError::auth("bad community string"));
    assert_eq!(err.kind(), ErrorKind::Auth);
}

#[test]
fn error_event_from_error_carries_kind_in_errors_list() {
    let err = FleetError::NotSubscribed("unknown.host".to_owned());
    let event = ErrorEvent::from_error(&err);
    assert_eq!(event.message, "device not subscribed: unknown.host");
    assert_eq!(event.errors, vec!["NOT_SUBSCRIBED".to_owned()]);
    assert!(event.time_ms > 0);
}
