//! Frame relay activities driven one cycle at a time.

use std::sync::Arc;

use soilgate::app::health::GatewayHealth;
use soilgate::bridge::QoS;
use soilgate::config::{BrokerSettings, GatewayConfig, RelaySettings};
use soilgate::relay::{
    COMMAND_CAPACITY, CommandMailbox, CommandOutcome, FRAME_CAPACITY, ForwardOutcome, FrameMailbox,
    FrameRelay, IngestOutcome,
};

use super::mock_hw::{RecordingPublisher, RecordingTx, SENSOR_FRAME, ScriptedRx};

fn relay_with(relay: &RelaySettings) -> FrameRelay<RecordingPublisher> {
    let cfg = GatewayConfig::default();
    FrameRelay::new(
        RecordingPublisher::default(),
        Arc::new(FrameMailbox::new()),
        Arc::new(CommandMailbox::new()),
        Arc::new(GatewayHealth::new()),
        &cfg.broker,
        &cfg.serial,
        relay,
    )
}

fn relay() -> FrameRelay<RecordingPublisher> {
    relay_with(&RelaySettings::default())
}

#[test]
fn sentinel_frame_is_published_once_verbatim() {
    let r = relay();
    let mut rx = ScriptedRx::with(&[SENSOR_FRAME]);

    assert!(matches!(r.ingest_once(&mut rx), IngestOutcome::Stored(_)));
    assert_eq!(
        r.forward_once(),
        ForwardOutcome::Published {
            bytes: SENSOR_FRAME.len()
        }
    );

    let calls = r.publisher().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].topic, BrokerSettings::default().telemetry_topic);
    assert_eq!(calls[0].payload, SENSOR_FRAME);
    assert_eq!(calls[0].qos, QoS::AtLeastOnce);
    assert!(!calls[0].retain);
}

#[test]
fn forward_twice_without_new_frame_publishes_once() {
    let r = relay();
    r.frames().store(SENSOR_FRAME);
    r.forward_once();
    assert_eq!(r.forward_once(), ForwardOutcome::Empty);
    assert_eq!(r.publisher().calls().len(), 1);
    assert!(r.frames().is_empty());
}

#[test]
fn partial_frame_waits_until_overwritten() {
    let r = relay();
    let mut rx = ScriptedRx::with(&[&b"{\"sensor\":\"Soil"[..], SENSOR_FRAME]);

    r.ingest_once(&mut rx);
    assert_eq!(r.forward_once(), ForwardOutcome::Waiting);
    assert!(r.publisher().calls().is_empty());

    r.ingest_once(&mut rx);
    assert!(matches!(r.forward_once(), ForwardOutcome::Published { .. }));
    assert_eq!(r.publisher().calls()[0].payload, SENSOR_FRAME);
}

#[test]
fn newest_frame_wins() {
    let r = relay();
    let older = br#"{"sensor":"Soil Moisture Sensor","value":1}"#;
    let mut rx = ScriptedRx::with(&[&older[..], SENSOR_FRAME]);
    r.ingest_once(&mut rx);
    let second = r.ingest_once(&mut rx);
    assert!(matches!(second, IngestOutcome::Stored(s) if s.replaced));

    r.forward_once();
    let calls = r.publisher().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].payload, SENSOR_FRAME);
}

#[test]
fn oversize_frame_truncated_to_capacity() {
    let r = relay();
    let big = vec![b'x'; FRAME_CAPACITY + 40];
    let mut rx = ScriptedRx::with(&[&big[..]]);
    let IngestOutcome::Stored(out) = r.ingest_once(&mut rx) else {
        panic!("frame not stored");
    };
    assert_eq!(out.stored, FRAME_CAPACITY - 1);
    assert_eq!(r.frames().len(), FRAME_CAPACITY - 1);
}

#[test]
fn idle_serial_is_not_an_error() {
    let r = relay();
    let mut rx = ScriptedRx::default();
    assert_eq!(r.ingest_once(&mut rx), IngestOutcome::Idle);
    assert_eq!(rx.reads, 1);
}

#[test]
fn command_is_written_with_crlf() {
    let r = relay();
    let mut tx = RecordingTx::default();
    r.commands().store(b"SET:1");

    assert!(matches!(
        r.relay_command_once(&mut tx),
        CommandOutcome::Sent { cleared: true, .. }
    ));
    assert_eq!(tx.writes, vec![b"SET:1\r\n".to_vec()]);

    // Cleared after the write; nothing repeats.
    assert_eq!(r.relay_command_once(&mut tx), CommandOutcome::Idle);
    assert_eq!(tx.writes.len(), 1);
}

#[test]
fn legacy_resend_repeats_until_overwritten() {
    let r = relay_with(&RelaySettings {
        resend_commands: true,
        ..RelaySettings::default()
    });
    let mut tx = RecordingTx::default();
    r.commands().store(b"SET:1");
    r.relay_command_once(&mut tx);
    r.relay_command_once(&mut tx);
    r.commands().store(b"SET:0");
    r.relay_command_once(&mut tx);
    assert_eq!(
        tx.writes,
        vec![
            b"SET:1\r\n".to_vec(),
            b"SET:1\r\n".to_vec(),
            b"SET:0\r\n".to_vec()
        ]
    );
}

#[test]
fn oversize_command_truncated_before_terminator() {
    let r = relay();
    let mut tx = RecordingTx::default();
    r.commands().store(&[b'c'; COMMAND_CAPACITY * 2]);
    r.relay_command_once(&mut tx);
    let line = &tx.writes[0];
    assert_eq!(line.len(), COMMAND_CAPACITY - 1 + 2);
    assert!(line.ends_with(b"\r\n"));
}
