//! Application core — ports, events, health, and the startup service.
//!
//! The engine components ([`link`](crate::link), [`bridge`](crate::bridge),
//! [`relay`](crate::relay)) talk to the platform only through the **port
//! traits** in [`ports`], keeping everything testable without a radio, a
//! broker, or a UART.

pub mod events;
pub mod health;
pub mod ports;
pub mod service;
