//! Full bring-up over the simulation adapters.
//!
//! WiFi attaches through a scripted `SimWifiLink`, the broker is the
//! in-process `SimBroker`, and the sensor sits behind `sim_serial()`.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use soilgate::Error;
use soilgate::adapters::mqtt::SimBroker;
use soilgate::adapters::uart::{SimSerialDevice, sim_serial};
use soilgate::adapters::wifi::{SimAttach, SimWifiLink};
use soilgate::app::events::LinkEvent;
use soilgate::app::service::{GatewayHandle, GatewayService};
use soilgate::config::GatewayConfig;
use soilgate::error::{ConfigError, LinkError};
use soilgate::link::{ConnectionState, LinkEventSender, link_channel};

use super::mock_hw::{SENSOR_FRAME, fast_config, wait_until};

const IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 77);
const WAIT: Duration = Duration::from_secs(2);

struct Running {
    gateway: GatewayHandle,
    broker: SimBroker,
    sensor: SimSerialDevice,
    link_events: LinkEventSender,
    connects: Arc<AtomicU32>,
}

fn boot(config: GatewayConfig, script: Vec<SimAttach>) -> Result<Running, Error> {
    let (link_tx, link_rx) = link_channel();
    let wifi = SimWifiLink::new(link_tx.clone(), script);
    let connects = wifi.connect_counter();
    let broker = SimBroker::new();
    let (rx, tx, sensor) = sim_serial();
    let gateway = GatewayService::start(config, wifi, link_rx, broker.connector(), rx, tx)?;
    Ok(Running {
        gateway,
        broker,
        sensor,
        link_events: link_tx,
        connects,
    })
}

fn boot_attached() -> Running {
    let gw = boot(fast_config(), vec![SimAttach::Accept(IP)]).unwrap();
    assert!(
        wait_until(WAIT, || !gw.broker.subscriptions().is_empty()),
        "command subscription never appeared"
    );
    gw
}

#[test]
fn sensor_frame_is_published_on_telemetry_topic() {
    let gw = boot_attached();
    gw.sensor.send_frame(SENSOR_FRAME);

    assert!(wait_until(WAIT, || !gw.broker.published().is_empty()));
    // Give the forward task a few more cycles to prove it publishes once.
    std::thread::sleep(Duration::from_millis(100));

    let published = gw.broker.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].topic, GatewayConfig::default().broker.telemetry_topic);
    assert_eq!(published[0].payload, SENSOR_FRAME);
}

#[test]
fn broker_command_is_written_to_sensor_once() {
    let gw = boot_attached();
    let topic = GatewayConfig::default().broker.command_topic;
    assert_eq!(gw.broker.inject(&topic, b"SET:1"), 1);

    assert_eq!(gw.sensor.next_write(WAIT), Some(b"SET:1\r\n".to_vec()));
    assert_eq!(gw.sensor.next_write(Duration::from_millis(150)), None);
}

#[test]
fn noise_without_sentinel_is_not_published() {
    let gw = boot_attached();
    gw.sensor.send_frame(b"boot: rst cause 1");
    std::thread::sleep(Duration::from_millis(150));
    assert!(gw.broker.published().is_empty());
    assert!(!gw.gateway.frames().is_empty());
}

#[test]
fn health_reflects_traffic() {
    let gw = boot_attached();
    assert_eq!(gw.gateway.address(), IP);
    assert_eq!(gw.gateway.link_state(), ConnectionState::Attached);

    gw.sensor.send_frame(SENSOR_FRAME);
    gw.broker
        .inject(&GatewayConfig::default().broker.command_topic, b"SET:0");
    assert!(wait_until(WAIT, || {
        let h = gw.gateway.health();
        h.publishes_ok == 1 && h.commands_sent == 1
    }));

    let h = gw.gateway.health();
    assert!(!h.is_degraded());
    assert_eq!(h.commands_received, 1);
    assert!(h.frames_ingested >= 1);
    gw.gateway.log_health();
}

#[test]
fn retry_budget_exhaustion_starts_nothing() {
    let mut cfg = fast_config();
    cfg.wifi.max_retries = 5;
    let script = vec![SimAttach::Reject { reason: 201 }; 5];

    let (link_tx, link_rx) = link_channel();
    let wifi = SimWifiLink::new(link_tx, script);
    let connects = wifi.connect_counter();
    let broker = SimBroker::new();
    let (rx, tx, _sensor) = sim_serial();

    let result = GatewayService::start(cfg, wifi, link_rx, broker.connector(), rx, tx);
    assert!(matches!(
        result,
        Err(Error::Link(LinkError::RetriesExhausted))
    ));
    assert_eq!(connects.load(Ordering::Relaxed), 5);
    std::thread::sleep(Duration::from_millis(50));
    assert!(broker.subscriptions().is_empty());
}

#[test]
fn invalid_config_is_rejected_before_link() {
    let mut cfg = fast_config();
    cfg.broker.uri = "http://broker.local".into();

    let (link_tx, link_rx) = link_channel();
    let wifi = SimWifiLink::attaching(link_tx, IP);
    let connects = wifi.connect_counter();
    let broker = SimBroker::new();
    let (rx, tx, _sensor) = sim_serial();

    let result = GatewayService::start(cfg, wifi, link_rx, broker.connector(), rx, tx);
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::ValidationFailed(_)))
    ));
    assert_eq!(connects.load(Ordering::Relaxed), 0);
}

#[test]
fn refused_broker_session_fails_start() {
    let (link_tx, link_rx) = link_channel();
    let wifi = SimWifiLink::attaching(link_tx, IP);
    let broker = SimBroker::new();
    broker.set_refuse_sessions(true);
    let (rx, tx, _sensor) = sim_serial();

    let result = GatewayService::start(fast_config(), wifi, link_rx, broker.connector(), rx, tx);
    assert!(matches!(result, Err(Error::Broker(_))));
}

#[test]
fn link_drop_after_attach_is_recovered() {
    let gw = boot(
        fast_config(),
        vec![SimAttach::Accept(IP), SimAttach::Accept(IP)],
    )
    .unwrap();

    assert_eq!(gw.connects.load(Ordering::Relaxed), 1);

    gw.link_events
        .send(LinkEvent::Disconnected { reason: 8 })
        .unwrap();
    assert!(wait_until(WAIT, || gw.connects.load(Ordering::Relaxed) == 2));
    assert!(wait_until(WAIT, || {
        gw.gateway.link_state() == ConnectionState::Attached && gw.gateway.link_retries() == 0
    }));
    assert_eq!(gw.gateway.link_last_reason(), 8);
}
