//! Pub/sub bridge — owns the broker session.
//!
//! ```text
//!   BrokerEventSource ──▶ event pump ──▶ PubSubBridge::handle_event
//!                                            │ Connected  → subscribe(command_topic)
//!                                            │ Received   → CommandMailbox
//!                                            └ otherwise  → log
//!   FrameRelay ──publish()──▶ PubSubBridge ──▶ BrokerSession
//! ```
//!
//! Session errors are logged and recorded in [`GatewayHealth`]; the bridge
//! never retries on its own and relies on the transport's reconnect.

pub mod topic;

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::events::BrokerEvent;
use crate::app::health::GatewayHealth;
use crate::app::ports::{BrokerConnector, BrokerEventSource, BrokerSession, TelemetryPublisher};
use crate::config::BrokerSettings;
use crate::error::{BrokerError, Error};
use crate::relay::CommandMailbox;
use crate::task::{self, TaskSpec};

pub use topic::topic_matches;

/// Delivery guarantee requested from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl QoS {
    pub fn level(self) -> u8 {
        match self {
            Self::AtMostOnce => 0,
            Self::AtLeastOnce => 1,
            Self::ExactlyOnce => 2,
        }
    }
}

/// Broker event pump task.
pub const PUMP_TASK: TaskSpec = TaskSpec {
    name: "mqtt-events\0",
    priority: 5,
    stack_kb: 6,
};

pub struct PubSubBridge<S> {
    session: Arc<Mutex<S>>,
    settings: Arc<BrokerSettings>,
    commands: Arc<CommandMailbox>,
    health: Arc<GatewayHealth>,
}

impl<S> Clone for PubSubBridge<S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            settings: Arc::clone(&self.settings),
            commands: Arc::clone(&self.commands),
            health: Arc::clone(&self.health),
        }
    }
}

impl<S: BrokerSession> PubSubBridge<S> {
    /// Create and start the broker session.
    ///
    /// Returns the bridge and the session's event source; the caller runs
    /// the latter through [`spawn_event_pump`](Self::spawn_event_pump).
    pub fn start<C>(
        connector: &mut C,
        settings: BrokerSettings,
        commands: Arc<CommandMailbox>,
        health: Arc<GatewayHealth>,
    ) -> Result<(Self, C::Events), BrokerError>
    where
        C: BrokerConnector<Session = S>,
    {
        if settings.shares_topic() {
            warn!(
                "Bridge: telemetry and commands share '{}'; published frames will loop back to serial",
                settings.command_topic
            );
        }

        let (session, events) = connector.connect(&settings).map_err(|e| {
            error!("Bridge: session start on {} failed — {}", settings.uri, e);
            e
        })?;
        info!(
            "Bridge: session started on {} as '{}'",
            settings.uri, settings.client_id
        );

        let bridge = Self {
            session: Arc::new(Mutex::new(session)),
            settings: Arc::new(settings),
            commands,
            health,
        };
        Ok((bridge, events))
    }

    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }

    fn with_session<R>(
        &self,
        f: impl FnOnce(&mut S) -> Result<R, BrokerError>,
    ) -> Result<R, BrokerError> {
        let mut session = self.session.lock().map_err(|_| BrokerError::Closed)?;
        f(&mut session)
    }

    // ── Event dispatch ────────────────────────────────────────

    /// React to one broker event.
    pub fn handle_event(&self, event: BrokerEvent) {
        match event {
            BrokerEvent::Connected { session_present } => {
                info!("Bridge: connected (session_present={})", session_present);
                self.health.set_broker_connected(true);
                self.subscribe_commands();
            }
            BrokerEvent::Disconnected => {
                warn!("Bridge: disconnected from broker");
                self.health.set_broker_connected(false);
            }
            BrokerEvent::Received { topic, payload } => {
                self.on_message(topic.as_deref(), &payload);
            }
            BrokerEvent::BeforeConnect => debug!("Bridge: connecting"),
            BrokerEvent::Subscribed { message_id } => {
                info!("Bridge: subscription acknowledged, msg_id={}", message_id);
            }
            BrokerEvent::Unsubscribed { message_id } => {
                info!("Bridge: unsubscribed, msg_id={}", message_id);
            }
            BrokerEvent::Published { message_id } => {
                debug!("Bridge: publish acknowledged, msg_id={}", message_id);
            }
            BrokerEvent::Deleted { message_id } => {
                warn!("Bridge: outbox dropped msg_id={}", message_id);
            }
            BrokerEvent::Error { code } => warn!("Bridge: transport error {}", code),
        }
    }

    fn subscribe_commands(&self) {
        let topic = &self.settings.command_topic;
        let qos = self.settings.subscribe_qos;
        match self.with_session(|s| s.subscribe(topic, qos)) {
            Ok(()) => {
                info!("Bridge: subscribed to '{}' (qos {})", topic, qos.level());
                self.health.set_command_subscribed(true);
            }
            Err(e) => {
                warn!("Bridge: subscribe to '{}' failed — {}", topic, e);
                self.health.set_command_subscribed(false);
            }
        }
    }

    fn on_message(&self, topic: Option<&str>, payload: &[u8]) {
        if !topic_matches(topic, &self.settings.command_topic) {
            debug!(
                "Bridge: ignoring {} bytes on {:?}",
                payload.len(),
                topic.unwrap_or("<continuation>")
            );
            return;
        }

        let out = self.commands.store(payload);
        self.health.record_command(out.truncated);
        if out.truncated > 0 {
            warn!(
                "Bridge: command truncated to {} bytes ({} dropped)",
                out.stored, out.truncated
            );
        }
        if out.replaced {
            debug!("Bridge: unsent command replaced");
        }
        info!(
            "Bridge: command received: {}",
            String::from_utf8_lossy(&payload[..out.stored])
        );
    }

    /// Drain `events` until the stream closes.
    pub fn run_event_loop<E: BrokerEventSource>(&self, mut events: E) {
        loop {
            match events.next_event() {
                Ok(event) => self.handle_event(event),
                Err(BrokerError::Closed) => {
                    warn!("Bridge: event stream closed");
                    self.health.set_broker_connected(false);
                    return;
                }
                Err(e) => warn!("Bridge: event stream error — {}", e),
            }
        }
    }
}

impl<S: BrokerSession + Send + 'static> PubSubBridge<S> {
    /// Run [`run_event_loop`](Self::run_event_loop) on its own task.
    pub fn spawn_event_pump<E>(&self, events: E) -> Result<JoinHandle<()>, Error>
    where
        E: BrokerEventSource + Send + 'static,
    {
        let bridge = self.clone();
        task::spawn(&PUMP_TASK, move || bridge.run_event_loop(events))
    }
}

impl<S: BrokerSession> TelemetryPublisher for PubSubBridge<S> {
    fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), BrokerError> {
        let result = self.with_session(|s| s.publish(topic, payload, qos, retain));
        self.health.record_publish(result.is_ok());
        if let Err(e) = result {
            warn!("Bridge: publish to '{}' failed — {}", topic, e);
        }
        result
    }
}
