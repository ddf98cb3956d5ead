use super::*;

#[test]
fn manifest_carries_the_stored_client_key() {
    let value = manifest(Some("abc123"));
    assert_eq!(value["payload"]["client-key"], "abc123");
}

#[test]
fn manifest_without_a_stored_key_is_null() {
    let value = manifest(None);
    assert!(value["payload"]["client-key"].is_null());
}
