//! Soilgate gateway library.
//!
//! Bridges a UART-attached soil moisture sensor to an MQTT broker. All
//! engine logic lives here and runs on the host; ESP-IDF specifics are
//! guarded by `#[cfg(target_os = "espidf")]` inside the adapters.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod bridge;
pub mod config;
pub mod error;
pub mod link;
pub mod pins;
pub mod relay;
pub mod task;

pub use error::{Error, Result};
