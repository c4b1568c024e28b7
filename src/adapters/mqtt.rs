//! MQTT broker adapter.
//!
//! Implements [`BrokerConnector`], [`BrokerSession`] and
//! [`BrokerEventSource`].
//!
//! - **`target_os = "espidf"`**: `EspMqttClient` (session) and
//!   `EspMqttConnection` (event source). The ESP-IDF client reconnects on
//!   its own; this adapter only reports what happens.
//! - **all other targets**: [`SimBroker`], an in-process loopback broker
//!   with exact-match routing.

use crate::app::events::BrokerEvent;
use crate::app::ports::{BrokerConnector, BrokerEventSource, BrokerSession};
use crate::bridge::QoS;
use crate::config::BrokerSettings;
use crate::error::BrokerError;

#[cfg(target_os = "espidf")]
pub use esp::{EspMqttConnector, EspMqttEvents, EspMqttSession};

#[cfg(not(target_os = "espidf"))]
pub use sim::{PublishedMessage, SimBroker, SimConnector, SimEvents, SimSession};

// ───────────────────────────────────────────────────────────────
// ESP-IDF
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod esp {
    use esp_idf_svc::mqtt::client::{
        EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration,
        QoS as EspQoS,
    };
    use log::{error, info};

    use super::*;

    fn esp_qos(qos: QoS) -> EspQoS {
        match qos {
            QoS::AtMostOnce => EspQoS::AtMostOnce,
            QoS::AtLeastOnce => EspQoS::AtLeastOnce,
            QoS::ExactlyOnce => EspQoS::ExactlyOnce,
        }
    }

    #[derive(Default)]
    pub struct EspMqttConnector;

    pub struct EspMqttSession {
        client: EspMqttClient<'static>,
    }

    pub struct EspMqttEvents {
        connection: EspMqttConnection,
    }

    impl BrokerConnector for EspMqttConnector {
        type Session = EspMqttSession;
        type Events = EspMqttEvents;

        fn connect(
            &mut self,
            settings: &BrokerSettings,
        ) -> Result<(EspMqttSession, EspMqttEvents), BrokerError> {
            let conf = MqttClientConfiguration {
                client_id: Some(&settings.client_id),
                ..Default::default()
            };
            let (client, connection) = EspMqttClient::new(&settings.uri, &conf).map_err(|e| {
                error!("MQTT: client init failed — {}", e);
                BrokerError::SessionStart
            })?;
            info!("MQTT: client created for {}", settings.uri);
            Ok((EspMqttSession { client }, EspMqttEvents { connection }))
        }
    }

    impl BrokerSession for EspMqttSession {
        fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), BrokerError> {
            self.client
                .subscribe(topic, esp_qos(qos))
                .map(|id| log::debug!("MQTT: subscribe queued, msg_id={}", id))
                .map_err(|_| BrokerError::SubscribeFailed)
        }

        fn publish(
            &mut self,
            topic: &str,
            payload: &[u8],
            qos: QoS,
            retain: bool,
        ) -> Result<(), BrokerError> {
            self.client
                .publish(topic, esp_qos(qos), retain, payload)
                .map(|id| log::debug!("MQTT: publish queued, msg_id={}", id))
                .map_err(|_| BrokerError::PublishFailed)
        }
    }

    impl BrokerEventSource for EspMqttEvents {
        fn next_event(&mut self) -> Result<BrokerEvent, BrokerError> {
            let event = self.connection.next().map_err(|_| BrokerError::Closed)?;
            Ok(match event.payload() {
                EventPayload::BeforeConnect => BrokerEvent::BeforeConnect,
                EventPayload::Connected(session_present) => BrokerEvent::Connected { session_present },
                EventPayload::Disconnected => BrokerEvent::Disconnected,
                EventPayload::Subscribed(id) => BrokerEvent::Subscribed { message_id: id },
                EventPayload::Unsubscribed(id) => BrokerEvent::Unsubscribed { message_id: id },
                EventPayload::Published(id) => BrokerEvent::Published { message_id: id },
                EventPayload::Received { topic, data, .. } => BrokerEvent::Received {
                    topic: topic.map(str::to_owned),
                    payload: data.to_vec(),
                },
                EventPayload::Deleted(id) => BrokerEvent::Deleted { message_id: id },
                EventPayload::Error(e) => BrokerEvent::Error { code: e.code() },
            })
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod sim {
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::sync::{Arc, Mutex, MutexGuard};

    use log::info;

    use super::*;
    use crate::bridge::topic_matches;

    /// One message accepted by the loopback broker.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct PublishedMessage {
        pub topic: String,
        pub payload: Vec<u8>,
        pub qos: QoS,
        pub retain: bool,
    }

    #[derive(Default)]
    struct BrokerState {
        clients: Vec<Sender<BrokerEvent>>,
        subscriptions: Vec<(String, Sender<BrokerEvent>)>,
        published: Vec<PublishedMessage>,
        next_message_id: u32,
        fail_publish: bool,
        refuse_sessions: bool,
    }

    impl BrokerState {
        fn next_id(&mut self) -> u32 {
            self.next_message_id = self.next_message_id.wrapping_add(1);
            self.next_message_id
        }

        fn route(&self, topic: &str, payload: &[u8]) -> usize {
            let mut delivered = 0;
            for (filter, tx) in &self.subscriptions {
                if topic_matches(Some(topic), filter) {
                    let event = BrokerEvent::Received {
                        topic: Some(topic.to_owned()),
                        payload: payload.to_vec(),
                    };
                    if tx.send(event).is_ok() {
                        delivered += 1;
                    }
                }
            }
            delivered
        }
    }

    /// In-process loopback broker. Clones share one broker.
    #[derive(Clone, Default)]
    pub struct SimBroker {
        state: Arc<Mutex<BrokerState>>,
    }

    impl SimBroker {
        pub fn new() -> Self {
            Self::default()
        }

        fn lock(&self) -> MutexGuard<'_, BrokerState> {
            self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
        }

        pub fn connector(&self) -> SimConnector {
            SimConnector {
                broker: self.clone(),
            }
        }

        /// Deliver a message from "another client"; returns the number of
        /// subscriptions it reached.
        pub fn inject(&self, topic: &str, payload: &[u8]) -> usize {
            self.lock().route(topic, payload)
        }

        pub fn published(&self) -> Vec<PublishedMessage> {
            self.lock().published.clone()
        }

        pub fn subscriptions(&self) -> Vec<String> {
            self.lock()
                .subscriptions
                .iter()
                .map(|(t, _)| t.clone())
                .collect()
        }

        pub fn set_publish_failure(&self, fail: bool) {
            self.lock().fail_publish = fail;
        }

        pub fn set_refuse_sessions(&self, refuse: bool) {
            self.lock().refuse_sessions = refuse;
        }

        /// Drop every session the way a broker restart would.
        pub fn disconnect_all(&self) {
            let mut state = self.lock();
            state.subscriptions.clear();
            for tx in &state.clients {
                let _ = tx.send(BrokerEvent::Disconnected);
            }
        }

        /// Tell every session it is back.
        pub fn reconnect_all(&self) {
            let state = self.lock();
            for tx in &state.clients {
                let _ = tx.send(BrokerEvent::Connected {
                    session_present: false,
                });
            }
        }

        /// Close every event stream.
        pub fn shutdown(&self) {
            let mut state = self.lock();
            state.subscriptions.clear();
            state.clients.clear();
        }
    }

    pub struct SimConnector {
        broker: SimBroker,
    }

    pub struct SimSession {
        broker: SimBroker,
        events: Sender<BrokerEvent>,
    }

    pub struct SimEvents {
        rx: Receiver<BrokerEvent>,
    }

    impl BrokerConnector for SimConnector {
        type Session = SimSession;
        type Events = SimEvents;

        fn connect(
            &mut self,
            settings: &BrokerSettings,
        ) -> Result<(SimSession, SimEvents), BrokerError> {
            let mut state = self.broker.lock();
            if state.refuse_sessions {
                return Err(BrokerError::SessionStart);
            }
            let (tx, rx) = mpsc::channel();
            let _ = tx.send(BrokerEvent::BeforeConnect);
            let _ = tx.send(BrokerEvent::Connected {
                session_present: false,
            });
            state.clients.push(tx.clone());
            info!("MQTT(sim): '{}' connected to {}", settings.client_id, settings.uri);

            Ok((
                SimSession {
                    broker: self.broker.clone(),
                    events: tx,
                },
                SimEvents { rx },
            ))
        }
    }

    impl BrokerSession for SimSession {
        fn subscribe(&mut self, topic: &str, _qos: QoS) -> Result<(), BrokerError> {
            let mut state = self.broker.lock();
            let id = state.next_id();
            state
                .subscriptions
                .push((topic.to_owned(), self.events.clone()));
            let _ = self.events.send(BrokerEvent::Subscribed { message_id: id });
            Ok(())
        }

        fn publish(
            &mut self,
            topic: &str,
            payload: &[u8],
            qos: QoS,
            retain: bool,
        ) -> Result<(), BrokerError> {
            let mut state = self.broker.lock();
            if state.fail_publish {
                return Err(BrokerError::PublishFailed);
            }
            let id = state.next_id();
            state.published.push(PublishedMessage {
                topic: topic.to_owned(),
                payload: payload.to_vec(),
                qos,
                retain,
            });
            state.route(topic, payload);
            if qos != QoS::AtMostOnce {
                let _ = self.events.send(BrokerEvent::Published { message_id: id });
            }
            Ok(())
        }
    }

    impl BrokerEventSource for SimEvents {
        fn next_event(&mut self) -> Result<BrokerEvent, BrokerError> {
            self.rx.recv().map_err(|_| BrokerError::Closed)
        }
    }

}
