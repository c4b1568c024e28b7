//! Port traits — the hexagonal boundary between the engine and the platform.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ LinkConnectionManager / PubSubBridge / FrameRelay
//! ```
//!
//! Platform adapters (ESP-IDF WiFi, MQTT client, UART driver, NVS) implement
//! these traits. The engine consumes them via generics, so the state
//! machines and the relay never touch a driver directly.

use std::time::Duration;

use crate::bridge::QoS;
use crate::config::{BrokerSettings, GatewayConfig};
use crate::error::{BrokerError, ConfigError, LinkError, SerialError};

use super::events::BrokerEvent;

// ───────────────────────────────────────────────────────────────
// Link driver (engine → station interface)
// ───────────────────────────────────────────────────────────────

/// Commands the link manager issues to the station interface.
///
/// Outcomes are *not* returned here: the platform reports them
/// asynchronously as [`LinkEvent`](super::events::LinkEvent)s on the
/// channel handed to the manager.
pub trait LinkDriver {
    /// Configure and start the station interface. Must eventually
    /// produce an `InterfaceStarted` event.
    fn start(&mut self) -> Result<(), LinkError>;

    /// Issue one association attempt.
    fn connect(&mut self) -> Result<(), LinkError>;
}

// ───────────────────────────────────────────────────────────────
// Broker (engine ↔ pub/sub transport)
// ───────────────────────────────────────────────────────────────

/// Outbound half of a broker session.
pub trait BrokerSession {
    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), BrokerError>;

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), BrokerError>;
}

/// Inbound half of a broker session: a blocking stream of events.
pub trait BrokerEventSource {
    /// Wait for the next event. `Err(BrokerError::Closed)` ends the stream.
    fn next_event(&mut self) -> Result<BrokerEvent, BrokerError>;
}

/// Creates and starts a broker session.
pub trait BrokerConnector {
    type Session: BrokerSession + Send + 'static;
    type Events: BrokerEventSource + Send + 'static;

    fn connect(
        &mut self,
        settings: &BrokerSettings,
    ) -> Result<(Self::Session, Self::Events), BrokerError>;
}

/// Anything the publish-forward activity can hand a frame to.
pub trait TelemetryPublisher {
    fn publish(&self, topic: &str, payload: &[u8], qos: QoS, retain: bool)
    -> Result<(), BrokerError>;
}

// ───────────────────────────────────────────────────────────────
// Serial channel (engine ↔ UART)
// ───────────────────────────────────────────────────────────────

/// Receive half of the serial channel.
pub trait SerialRx {
    /// Read up to `buf.len()` bytes, waiting at most `timeout`.
    ///
    /// `Ok(0)` means nothing arrived in time; it is the normal idle
    /// signal, not an error.
    fn read_frame(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, SerialError>;
}

/// Transmit half of the serial channel.
pub trait SerialTx {
    /// Write `bytes`, returning how many were accepted by the driver.
    fn write_frame(&mut self, bytes: &[u8]) -> Result<usize, SerialError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads and persists the gateway configuration.
///
/// Implementations MUST validate before persisting and MUST reject stored
/// configurations that no longer validate, rather than clamping them.
pub trait ConfigPort {
    /// Returns [`GatewayConfig::default()`] if nothing is stored.
    fn load(&self) -> Result<GatewayConfig, ConfigError>;

    fn save(&self, config: &GatewayConfig) -> Result<(), ConfigError>;
}
