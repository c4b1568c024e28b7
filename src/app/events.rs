//! Inbound platform events.
//!
//! Network and broker callbacks are translated into these plain values and
//! handed to the engine over channels; no callback mutates engine state
//! directly.

use std::net::Ipv4Addr;

/// Station-interface events consumed by the
/// [`LinkConnectionManager`](crate::link::LinkConnectionManager).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// The station interface is up and ready to associate.
    InterfaceStarted,
    /// Association was lost or a connect attempt failed.
    Disconnected { reason: u16 },
    /// DHCP handed out an address; the link is attached.
    AddressAcquired(Ipv4Addr),
}

/// Broker session events consumed by the
/// [`PubSubBridge`](crate::bridge::PubSubBridge).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    BeforeConnect,
    Connected { session_present: bool },
    Disconnected,
    Subscribed { message_id: u32 },
    Unsubscribed { message_id: u32 },
    Published { message_id: u32 },
    /// An inbound message. `topic` is `None` for continuation chunks of a
    /// message split by the transport.
    Received {
        topic: Option<String>,
        payload: Vec<u8>,
    },
    Deleted { message_id: u32 },
    Error { code: i32 },
}
