//! Unified error types for the gateway.
//!
//! Each subsystem owns a small `Copy` error enum; all of them fold into the
//! top-level [`Error`] so the startup path in
//! [`GatewayService`](crate::app::service::GatewayService) has a single
//! error type to propagate.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level gateway error
// ---------------------------------------------------------------------------

/// Every fallible operation in the gateway funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The network link could not be attached.
    Link(LinkError),
    /// The broker session failed.
    Broker(BrokerError),
    /// The serial link failed.
    Serial(SerialError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// A task or peripheral could not be initialised.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Broker(e) => write!(f, "broker: {e}"),
            Self::Serial(e) => write!(f, "serial: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Link errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// The station interface could not be configured or started.
    DriverInit,
    /// A connect request was rejected by the driver.
    ConnectRejected,
    /// The retry budget was exhausted without acquiring an address.
    RetriesExhausted,
    /// No terminal event arrived within the attach timeout.
    Timeout,
    /// The event source went away while waiting.
    EventSourceClosed,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DriverInit => write!(f, "station interface init failed"),
            Self::ConnectRejected => write!(f, "connect request rejected"),
            Self::RetriesExhausted => write!(f, "retry budget exhausted"),
            Self::Timeout => write!(f, "attach timed out"),
            Self::EventSourceClosed => write!(f, "network event source closed"),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Broker errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerError {
    /// The client could not be created or started.
    SessionStart,
    /// A publish was rejected by the transport.
    PublishFailed,
    /// A subscribe request was rejected by the transport.
    SubscribeFailed,
    /// The session has no live connection.
    NotConnected,
    /// The event stream ended.
    Closed,
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionStart => write!(f, "session start failed"),
            Self::PublishFailed => write!(f, "publish failed"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
            Self::NotConnected => write!(f, "not connected"),
            Self::Closed => write!(f, "event stream closed"),
        }
    }
}

impl From<BrokerError> for Error {
    fn from(e: BrokerError) -> Self {
        Self::Broker(e)
    }
}

// ---------------------------------------------------------------------------
// Serial errors
// ---------------------------------------------------------------------------

/// A zero-byte read is *not* an error; these cover real driver failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialError {
    /// The UART driver reported a read failure.
    ReadFailed,
    /// The UART driver reported a write failure.
    WriteFailed,
    /// The UART driver could not be installed.
    DriverInit,
    /// The peer side of a simulated link has gone away.
    Disconnected,
}

impl fmt::Display for SerialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed => write!(f, "UART read failed"),
            Self::WriteFailed => write!(f, "UART write failed"),
            Self::DriverInit => write!(f, "UART driver init failed"),
            Self::Disconnected => write!(f, "serial peer disconnected"),
        }
    }
}

impl From<SerialError> for Error {
    fn from(e: SerialError) -> Self {
        Self::Serial(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A field failed range validation; the message names the field.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Gateway-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
