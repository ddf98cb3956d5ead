// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the fleet orchestration service.
#[derive(Debug, Clone, clap::Args)]
pub struct FleetConfig {
    /// MQTT broker hostname.
    #[arg(long, env = "MQTT_HOSTNAME")]
    pub mqtt_hostname: String,

    /// MQTT broker port.
    #[arg(long, default_value_t = 8883, env = "MQTT_PORT")]
    pub mqtt_port: u16,

    /// Inventory API hostname.
    #[arg(long, env = "API_HOSTNAME")]
    pub api_hostname: String,

    /// Inventory API service account username.
    #[arg(long, env = "API_SYSTEM_USERNAME")]
    pub api_system_username: String,

    /// Inventory API service account password.
    #[arg(long, env = "API_SYSTEM_PASSWORD")]
    pub api_system_password: String,

    /// Root CA bundle used to validate the inventory API's certificate.
    #[arg(long, env = "API_ROOT_CA")]
    pub api_root_ca: PathBuf,

    /// Shared password used for PJLink authentication.
    #[arg(long, env = "PJLINK_PASSWORD")]
    pub pjlink_password: String,

    /// SNMP v2c community string used to address Gude PDUs.
    #[arg(long, env = "PDU_COMMUNITYSTRING")]
    pub pdu_community_string: String,

    /// CA certificate for the MQTT broker's TLS listener.
    #[arg(long, default_value = "/opt/tls/ca.crt", env = "FLEET_CA_CERTIFICATE")]
    pub ca_certificate: PathBuf,

    /// Client certificate presented to the MQTT broker.
    #[arg(long, default_value = "/opt/tls/client.crt", env = "FLEET_CLIENT_CERTIFICATE")]
    pub client_certificate: PathBuf,

    /// Client key matching `client_certificate`.
    #[arg(long, default_value = "/opt/tls/client.key", env = "FLEET_CLIENT_KEY")]
    pub client_key: PathBuf,

    /// Path to the device-class resolution rules (dot-path/tag filters per class).
    #[arg(long, default_value = "config/classify.yaml", env = "FLEET_DEVICE_MAP")]
    pub device_map_path: PathBuf,

    /// Path to the persisted WebOS registration credential store.
    #[arg(long, default_value = "/opt/weboscreds.json", env = "FLEET_WEBOS_CREDENTIALS")]
    pub webos_credential_path: PathBuf,

    /// Manager top-level device update tick, in milliseconds.
    #[arg(long, default_value_t = 125, env = "FLEET_UPDATE_TICK_MS")]
    pub update_tick_ms: u64,

    /// ICMP probe interval for ICMPable/WOLable devices, in seconds. Classes
    /// with their own faster poll cadence (PJLink, GudePDU, LGWebOSTV) use a
    /// fixed interval local to that class module instead.
    #[arg(long, default_value_t = 30, env = "FLEET_ICMP_INTERVAL_SECS")]
    pub icmp_interval_secs: u64,

    /// Default deadline for a target-driven action loop (wake/shutdown/reboot), in seconds.
    #[arg(long, default_value_t = 900, env = "FLEET_ACTION_TIMEOUT_SECS")]
    pub default_action_timeout_secs: u64,

    /// Default deadline for a group `wait_for` join, in seconds.
    #[arg(long, default_value_t = 300, env = "FLEET_GROUP_WAIT_TIMEOUT_SECS")]
    pub group_wait_timeout_secs: u64,

    /// Delay between inventory fetch retries after a failure, in seconds.
    #[arg(long, default_value_t = 5, env = "FLEET_INVENTORY_RETRY_SECS")]
    pub inventory_retry_secs: u64,
}

impl FleetConfig {
    pub fn update_tick_interval(&self) -> Duration {
        Duration::from_millis(self.update_tick_ms)
    }

    pub fn icmp_interval(&self) -> Duration {
        Duration::from_secs(self.icmp_interval_secs)
    }

    pub fn default_action_timeout(&self) -> Duration {
        Duration::from_secs(self.default_action_timeout_secs)
    }

    pub fn group_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.group_wait_timeout_secs)
    }

    pub fn inventory_retry_interval(&self) -> Duration {
        Duration::from_secs(self.inventory_retry_secs)
    }

    pub fn mqtt_base_url(&self) -> String {
        format!("{}:{}", self.mqtt_hostname, self.mqtt_port)
    }
}
