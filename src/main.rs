//! Soilgate firmware — main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │  EspWifiLink   EspMqttConnector   UartSerial   NvsConfigStore│
//! │  ──────────────── Port Trait Boundary ─────────────────────  │
//! │  LinkConnectionManager → PubSubBridge → FrameRelay (3 tasks) │
//! └──────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use soilgate::adapters::mqtt::EspMqttConnector;
use soilgate::adapters::nvs::NvsConfigStore;
use soilgate::adapters::uart::UartSerial;
use soilgate::adapters::wifi::EspWifiLink;
use soilgate::app::ports::ConfigPort;
use soilgate::app::service::GatewayService;
use soilgate::config::GatewayConfig;
use soilgate::link::link_channel;
use soilgate::{Error, pins};

const HEALTH_INTERVAL: Duration = Duration::from_secs(30);

fn load_config(partition: EspDefaultNvsPartition) -> GatewayConfig {
    match NvsConfigStore::new(partition).and_then(|store| store.load()) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Config load failed ({}), using defaults", e);
            GatewayConfig::default()
        }
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Soilgate v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take().context("peripherals already taken")?;
    let sysloop = EspSystemEventLoop::take().context("system event loop unavailable")?;
    let nvs = EspDefaultNvsPartition::take().context("default NVS partition unavailable")?;

    // ── 2. Configuration ──────────────────────────────────────
    let config = load_config(nvs.clone());
    info!(
        "Config: ssid='{}' broker={} telemetry='{}' command='{}'",
        config.wifi.ssid,
        config.broker.uri,
        config.broker.telemetry_topic,
        config.broker.command_topic
    );

    // ── 3. Adapters ───────────────────────────────────────────
    let (link_tx, link_rx) = link_channel();
    let wifi = EspWifiLink::new(peripherals.modem, sysloop, Some(nvs), &config.wifi, link_tx)
        .map_err(Error::from)
        .context("WiFi init")?;

    let (serial_rx, serial_tx) = UartSerial::open(
        peripherals.uart2,
        peripherals.pins.gpio17,
        peripherals.pins.gpio16,
        &config.serial,
    )
    .map_err(Error::from)
    .context("UART init")?;
    info!(
        "Sensor link: UART{} TX=GPIO{} RX=GPIO{} @ {} baud",
        pins::SENSOR_UART_PORT,
        pins::SENSOR_UART_TX_GPIO,
        pins::SENSOR_UART_RX_GPIO,
        config.serial.baud_rate
    );

    // ── 4. Bring-up ───────────────────────────────────────────
    let gateway = GatewayService::start(
        config,
        wifi,
        link_rx,
        EspMqttConnector,
        serial_rx,
        serial_tx,
    )
    .map_err(|e| {
        error!("Gateway start failed: {} — restart required", e);
        e
    })
    .context("gateway start")?;

    info!("Gateway up at {}", gateway.address());

    // ── 5. Health loop ────────────────────────────────────────
    loop {
        std::thread::sleep(HEALTH_INTERVAL);
        gateway.log_health();
    }
}
