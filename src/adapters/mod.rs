//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter | Implements                                   | Connects to            |
//! |---------|----------------------------------------------|------------------------|
//! | `wifi`  | LinkDriver                                   | ESP-IDF WiFi STA       |
//! | `mqtt`  | BrokerConnector, BrokerSession, EventSource  | ESP-IDF MQTT client    |
//! | `uart`  | SerialRx, SerialTx                           | UART2 sensor link      |
//! | `nvs`   | ConfigPort                                   | NVS / in-memory store  |
//!
//! Every adapter has a simulation backend on non-ESP targets.

pub mod mqtt;
pub mod nvs;
pub mod uart;
pub mod wifi;
