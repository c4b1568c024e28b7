//! Gateway configuration parameters.
//!
//! Every tunable of the gateway lives here. Defaults are compile-time
//! constants (credentials and broker address may be overridden at build
//! time through `SOILGATE_*` environment variables); a validated copy may
//! be stored in NVS through [`ConfigPort`](crate::app::ports::ConfigPort).

use serde::{Deserialize, Serialize};

use crate::bridge::QoS;
use crate::bridge::topic::is_concrete_topic;
use crate::error::ConfigError;
use crate::relay::FRAME_CAPACITY;

const DEFAULT_SSID: &str = match option_env!("SOILGATE_WIFI_SSID") {
    Some(s) => s,
    None => "soilgate-ap",
};
const DEFAULT_PASSWORD: &str = match option_env!("SOILGATE_WIFI_PASS") {
    Some(s) => s,
    None => "change-me-please",
};
const DEFAULT_BROKER_URI: &str = match option_env!("SOILGATE_BROKER_URI") {
    Some(s) => s,
    None => "mqtt://3.27.197.226:1883",
};

pub const SSID_CAPACITY: usize = 32;
pub const PASSWORD_CAPACITY: usize = 64;

const _: () = assert!(
    DEFAULT_SSID.len() <= SSID_CAPACITY,
    "SOILGATE_WIFI_SSID exceeds 32 bytes"
);
const _: () = assert!(
    DEFAULT_PASSWORD.len() <= PASSWORD_CAPACITY,
    "SOILGATE_WIFI_PASS exceeds 64 bytes"
);

/// Topic carrying sensor frames from the gateway to the cloud.
pub const DEFAULT_TELEMETRY_TOPIC: &str = "/sensor/soil_moisture";
/// Topic carrying commands from the cloud to the sensor.
pub const DEFAULT_COMMAND_TOPIC: &str = "/sensor/soil_moisture/cmd";
/// Marker that identifies a complete soil-moisture frame.
pub const DEFAULT_SENTINEL: &str = "\"sensor\":\"Soil Moisture Sensor\"";

/// Top-level configuration, one section per component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub wifi: WifiSettings,
    pub broker: BrokerSettings,
    pub serial: SerialSettings,
    pub relay: RelaySettings,
}

/// Minimum authentication strength accepted from the access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthThreshold {
    Open,
    WpaPersonal,
    Wpa2Personal,
    Wpa2Wpa3Personal,
    Wpa3Personal,
}

/// Station-mode link settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WifiSettings {
    pub ssid: heapless::String<SSID_CAPACITY>,
    pub password: heapless::String<PASSWORD_CAPACITY>,
    pub auth_threshold: AuthThreshold,
    /// Disconnects tolerated before the link is declared failed.
    pub max_retries: u8,
    /// How long the attach waiter sleeps between checks.
    pub poll_interval_ms: u32,
    /// Upper bound on the whole attach sequence.
    pub attach_timeout_ms: u32,
}

/// Broker session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerSettings {
    pub uri: String,
    pub client_id: String,
    pub telemetry_topic: String,
    pub command_topic: String,
    pub publish_qos: QoS,
    pub subscribe_qos: QoS,
    pub retain: bool,
}

/// Serial link settings. Framing is fixed at 8N1 without flow control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialSettings {
    pub baud_rate: u32,
    pub read_timeout_ms: u32,
}

/// Cadences and policies of the three relay activities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelaySettings {
    pub ingest_interval_ms: u32,
    pub forward_interval_ms: u32,
    pub command_interval_ms: u32,
    pub sentinel: String,
    /// Keep re-sending the last command every cycle instead of once.
    pub resend_commands: bool,
}

impl Default for WifiSettings {
    fn default() -> Self {
        // Cannot fail: both lengths are asserted at compile time.
        let mut ssid = heapless::String::new();
        let _ = ssid.push_str(DEFAULT_SSID);
        let mut password = heapless::String::new();
        let _ = password.push_str(DEFAULT_PASSWORD);
        Self {
            ssid,
            password,
            auth_threshold: AuthThreshold::Wpa2Personal,
            max_retries: 5,
            poll_interval_ms: 1000,
            attach_timeout_ms: 30_000,
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            uri: DEFAULT_BROKER_URI.into(),
            client_id: "soilgate".into(),
            telemetry_topic: DEFAULT_TELEMETRY_TOPIC.into(),
            command_topic: DEFAULT_COMMAND_TOPIC.into(),
            publish_qos: QoS::AtLeastOnce,
            subscribe_qos: QoS::AtMostOnce,
            retain: false,
        }
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            read_timeout_ms: 50,
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            ingest_interval_ms: 500,
            forward_interval_ms: 500,
            command_interval_ms: 500,
            sentinel: DEFAULT_SENTINEL.into(),
            resend_commands: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

const CADENCE_RANGE_MS: core::ops::RangeInclusive<u32> = 10..=60_000;
const BROKER_SCHEMES: [&str; 4] = ["mqtt://", "mqtts://", "ws://", "wss://"];

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

impl GatewayConfig {
    /// Range-check every field. Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.wifi.validate()?;
        self.broker.validate()?;
        self.serial.validate()?;
        self.relay.validate()?;
        if self.serial.read_timeout_ms >= self.relay.ingest_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "serial.read_timeout_ms must be below relay.ingest_interval_ms",
            ));
        }
        Ok(())
    }
}

impl WifiSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.ssid.is_empty() || !is_printable_ascii(&self.ssid) {
            return Err(ConfigError::ValidationFailed(
                "wifi.ssid must be 1-32 printable ASCII bytes",
            ));
        }
        let pw_len = self.password.len();
        if pw_len != 0 && !(8..=64).contains(&pw_len) {
            return Err(ConfigError::ValidationFailed(
                "wifi.password must be empty or 8-64 bytes",
            ));
        }
        if pw_len == 0 && self.auth_threshold != AuthThreshold::Open {
            return Err(ConfigError::ValidationFailed(
                "wifi.password required unless auth_threshold is Open",
            ));
        }
        if !(1..=32).contains(&self.max_retries) {
            return Err(ConfigError::ValidationFailed(
                "wifi.max_retries must be 1-32",
            ));
        }
        if !CADENCE_RANGE_MS.contains(&self.poll_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "wifi.poll_interval_ms must be 10-60000",
            ));
        }
        if self.attach_timeout_ms < self.poll_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "wifi.attach_timeout_ms must be at least poll_interval_ms",
            ));
        }
        Ok(())
    }
}

impl BrokerSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        let Some(rest) = BROKER_SCHEMES
            .iter()
            .find_map(|scheme| self.uri.strip_prefix(*scheme))
        else {
            return Err(ConfigError::ValidationFailed(
                "broker.uri must start with mqtt://, mqtts://, ws:// or wss://",
            ));
        };
        if rest.is_empty() {
            return Err(ConfigError::ValidationFailed("broker.uri has no host"));
        }
        if self.client_id.is_empty() || self.client_id.len() > 23 {
            return Err(ConfigError::ValidationFailed(
                "broker.client_id must be 1-23 bytes",
            ));
        }
        if !is_concrete_topic(&self.telemetry_topic) {
            return Err(ConfigError::ValidationFailed(
                "broker.telemetry_topic must be non-empty without wildcards",
            ));
        }
        if !is_concrete_topic(&self.command_topic) {
            return Err(ConfigError::ValidationFailed(
                "broker.command_topic must be non-empty without wildcards",
            ));
        }
        Ok(())
    }

    /// Telemetry and commands share one topic (legacy layout).
    pub fn shares_topic(&self) -> bool {
        self.telemetry_topic == self.command_topic
    }
}

impl SerialSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(1_200..=5_000_000).contains(&self.baud_rate) {
            return Err(ConfigError::ValidationFailed(
                "serial.baud_rate must be 1200-5000000",
            ));
        }
        if !(1..=1_000).contains(&self.read_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "serial.read_timeout_ms must be 1-1000",
            ));
        }
        Ok(())
    }
}

impl RelaySettings {
    fn validate(&self) -> Result<(), ConfigError> {
        for interval in [
            self.ingest_interval_ms,
            self.forward_interval_ms,
            self.command_interval_ms,
        ] {
            if !CADENCE_RANGE_MS.contains(&interval) {
                return Err(ConfigError::ValidationFailed(
                    "relay intervals must be 10-60000 ms",
                ));
            }
        }
        if self.sentinel.is_empty() || self.sentinel.len() >= FRAME_CAPACITY {
            return Err(ConfigError::ValidationFailed(
                "relay.sentinel must be non-empty and fit in one frame",
            ));
        }
        if self.sentinel.as_bytes().contains(&0) {
            return Err(ConfigError::ValidationFailed(
                "relay.sentinel must not contain NUL",
            ));
        }
        Ok(())
    }
}
