use super::*;

#[test]
fn adapter_construction_succeeds_with_default_client_settings() {
    assert!(DigestRebootAdapter::new().is_ok());
}
