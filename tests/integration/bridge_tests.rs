//! Pub/sub bridge over the loopback broker.

use std::sync::Arc;

use soilgate::adapters::mqtt::{SimBroker, SimEvents, SimSession};
use soilgate::app::events::BrokerEvent;
use soilgate::app::health::GatewayHealth;
use soilgate::app::ports::{BrokerEventSource, TelemetryPublisher};
use soilgate::bridge::{PubSubBridge, QoS};
use soilgate::config::{BrokerSettings, GatewayConfig};
use soilgate::error::BrokerError;
use soilgate::relay::{CommandMailbox, CommandOutcome, ForwardOutcome, FrameMailbox, FrameRelay};

use super::mock_hw::{RecordingTx, SENSOR_FRAME};

struct Rig {
    broker: SimBroker,
    bridge: PubSubBridge<SimSession>,
    events: SimEvents,
    commands: Arc<CommandMailbox>,
    health: Arc<GatewayHealth>,
}

impl Rig {
    fn new(settings: BrokerSettings) -> Self {
        let broker = SimBroker::new();
        let commands = Arc::new(CommandMailbox::new());
        let health = Arc::new(GatewayHealth::new());
        let (bridge, events) = PubSubBridge::start(
            &mut broker.connector(),
            settings,
            Arc::clone(&commands),
            Arc::clone(&health),
        )
        .unwrap();
        Self {
            broker,
            bridge,
            events,
            commands,
            health,
        }
    }

    /// Feed the next `n` broker events through the bridge.
    fn pump(&mut self, n: usize) -> Vec<BrokerEvent> {
        (0..n)
            .map(|_| {
                let event = self.events.next_event().unwrap();
                self.bridge.handle_event(event.clone());
                event
            })
            .collect()
    }

    /// BeforeConnect, Connected, Subscribed.
    fn connected(settings: BrokerSettings) -> Self {
        let mut rig = Self::new(settings);
        rig.pump(3);
        rig
    }
}

#[test]
fn connect_subscribes_once_to_command_topic() {
    let rig = Rig::connected(BrokerSettings::default());
    assert_eq!(
        rig.broker.subscriptions(),
        vec![BrokerSettings::default().command_topic]
    );
    assert!(!rig.health.snapshot().is_degraded());
}

#[test]
fn command_reaches_serial_with_crlf() {
    let mut rig = Rig::connected(BrokerSettings::default());
    let topic = rig.bridge.settings().command_topic.clone();
    assert_eq!(rig.broker.inject(&topic, b"SET:1"), 1);
    rig.pump(1);

    let cfg = GatewayConfig::default();
    let relay = FrameRelay::new(
        rig.bridge.clone(),
        Arc::new(FrameMailbox::new()),
        Arc::clone(&rig.commands),
        Arc::clone(&rig.health),
        &cfg.broker,
        &cfg.serial,
        &cfg.relay,
    );
    let mut tx = RecordingTx::default();
    assert!(matches!(
        relay.relay_command_once(&mut tx),
        CommandOutcome::Sent { .. }
    ));
    assert_eq!(tx.writes, vec![b"SET:1\r\n".to_vec()]);
}

#[test]
fn prefix_sharing_topics_do_not_match() {
    let rig = Rig::connected(BrokerSettings::default());
    let topic = rig.bridge.settings().command_topic.clone();

    let extended = format!("{topic}/x");
    for other in [&topic[..topic.len() - 1], extended.as_str(), "/sensor"] {
        rig.bridge.handle_event(BrokerEvent::Received {
            topic: Some(other.to_owned()),
            payload: b"SET:1".to_vec(),
        });
    }
    assert!(rig.commands.is_empty());
    assert_eq!(rig.health.snapshot().commands_received, 0);
}

#[test]
fn shared_topic_loops_telemetry_back() {
    let mut settings = BrokerSettings::default();
    settings.command_topic = settings.telemetry_topic.clone();
    let mut rig = Rig::connected(settings);

    let topic = rig.bridge.settings().telemetry_topic.clone();
    rig.bridge
        .publish(&topic, SENSOR_FRAME, QoS::AtMostOnce, false)
        .unwrap();
    rig.pump(1);
    assert_eq!(rig.commands.snapshot().as_slice(), SENSOR_FRAME);
}

#[test]
fn publish_failure_is_recorded_not_retried() {
    let rig = Rig::connected(BrokerSettings::default());
    rig.broker.set_publish_failure(true);

    let cfg = GatewayConfig::default();
    let frames = Arc::new(FrameMailbox::new());
    let relay = FrameRelay::new(
        rig.bridge.clone(),
        Arc::clone(&frames),
        Arc::clone(&rig.commands),
        Arc::clone(&rig.health),
        &cfg.broker,
        &cfg.serial,
        &cfg.relay,
    );
    frames.store(SENSOR_FRAME);
    assert_eq!(
        relay.forward_once(),
        ForwardOutcome::Failed(BrokerError::PublishFailed)
    );
    assert_eq!(relay.forward_once(), ForwardOutcome::Empty);
    assert!(rig.broker.published().is_empty());
    assert_eq!(rig.health.snapshot().publish_failures, 1);
}

#[test]
fn broker_restart_degrades_then_resubscribes() {
    let mut rig = Rig::connected(BrokerSettings::default());

    rig.broker.disconnect_all();
    rig.pump(1);
    assert!(rig.health.snapshot().is_degraded());

    rig.broker.reconnect_all();
    let events = rig.pump(2);
    assert!(matches!(events[1], BrokerEvent::Subscribed { .. }));
    assert!(!rig.health.snapshot().is_degraded());
    assert_eq!(rig.broker.subscriptions().len(), 1);
}

#[test]
fn refused_session_surfaces_error() {
    let broker = SimBroker::new();
    broker.set_refuse_sessions(true);
    let result = PubSubBridge::start(
        &mut broker.connector(),
        BrokerSettings::default(),
        Arc::new(CommandMailbox::new()),
        Arc::new(GatewayHealth::new()),
    );
    assert_eq!(result.err(), Some(BrokerError::SessionStart));
}
