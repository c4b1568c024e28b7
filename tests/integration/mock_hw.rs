//! Mock ports for integration tests.
//!
//! Each mock records every call so tests can assert on the full history
//! without a radio, a broker, or a UART.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use soilgate::app::ports::{LinkDriver, SerialRx, SerialTx, TelemetryPublisher};
use soilgate::bridge::QoS;
use soilgate::config::GatewayConfig;
use soilgate::error::{BrokerError, LinkError, SerialError};

// ── Link driver ───────────────────────────────────────────────

/// Counts driver calls; the test feeds events into the channel itself.
#[derive(Default)]
pub struct MockLinkDriver {
    pub starts: u32,
    pub connects: u32,
}

impl LinkDriver for MockLinkDriver {
    fn start(&mut self) -> Result<(), LinkError> {
        self.starts += 1;
        Ok(())
    }

    fn connect(&mut self) -> Result<(), LinkError> {
        self.connects += 1;
        Ok(())
    }
}

// ── Publisher ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishCall {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub calls: Mutex<Vec<PublishCall>>,
}

#[allow(dead_code)]
impl RecordingPublisher {
    pub fn calls(&self) -> Vec<PublishCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl TelemetryPublisher for RecordingPublisher {
    fn publish(&self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> Result<(), BrokerError> {
        self.calls.lock().unwrap().push(PublishCall {
            topic: topic.into(),
            payload: payload.to_vec(),
            qos,
            retain,
        });
        Ok(())
    }
}

// ── Serial ────────────────────────────────────────────────────

/// Returns one queued frame per read, then idles.
#[derive(Default)]
pub struct ScriptedRx {
    pub frames: VecDeque<Vec<u8>>,
    pub reads: u32,
}

impl ScriptedRx {
    pub fn with(frames: &[&[u8]]) -> Self {
        Self {
            frames: frames.iter().map(|f| f.to_vec()).collect(),
            reads: 0,
        }
    }
}

impl SerialRx for ScriptedRx {
    fn read_frame(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, SerialError> {
        self.reads += 1;
        let Some(frame) = self.frames.pop_front() else {
            return Ok(0);
        };
        let n = frame.len().min(buf.len());
        buf[..n].copy_from_slice(&frame[..n]);
        Ok(n)
    }
}

#[derive(Default)]
pub struct RecordingTx {
    pub writes: Vec<Vec<u8>>,
}

impl SerialTx for RecordingTx {
    fn write_frame(&mut self, bytes: &[u8]) -> Result<usize, SerialError> {
        self.writes.push(bytes.to_vec());
        Ok(bytes.len())
    }
}

// ── Helpers ───────────────────────────────────────────────────

/// Default config with cadences short enough for tests.
pub fn fast_config() -> GatewayConfig {
    let mut cfg = GatewayConfig::default();
    cfg.wifi.poll_interval_ms = 10;
    cfg.wifi.attach_timeout_ms = 2_000;
    cfg.serial.read_timeout_ms = 5;
    cfg.relay.ingest_interval_ms = 20;
    cfg.relay.forward_interval_ms = 20;
    cfg.relay.command_interval_ms = 20;
    cfg
}

/// Poll `cond` until it holds or `timeout` elapses.
#[allow(dead_code)]
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

pub const SENSOR_FRAME: &[u8] = br#"{"sensor":"Soil Moisture Sensor","value":512}"#;
