//! WiFi station-mode adapter.
//!
//! Implements [`LinkDriver`] and translates platform callbacks into
//! [`LinkEvent`]s on the manager's channel.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspWifi` plus system event loop
//!   subscriptions for `WifiEvent` and `IpEvent`.
//! - **all other targets**: [`SimWifiLink`], which plays back a scripted
//!   sequence of attach outcomes.

use log::info;

use crate::app::events::LinkEvent;
use crate::app::ports::LinkDriver;
use crate::error::LinkError;
use crate::link::LinkEventSender;

#[cfg(target_os = "espidf")]
pub use esp::EspWifiLink;

#[cfg(not(target_os = "espidf"))]
pub use sim::{SimAttach, SimWifiLink};

fn forward(events: &LinkEventSender, event: LinkEvent) {
    // The manager may already be gone after a terminal failure.
    if events.send(event).is_err() {
        log::debug!("WiFi: dropped {:?}, no listener", event);
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod esp {
    use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
    use esp_idf_svc::hal::modem::Modem;
    use esp_idf_svc::netif::IpEvent;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi, WifiEvent};
    use log::{error, warn};

    use super::*;
    use crate::config::{AuthThreshold, WifiSettings};

    fn auth_method(threshold: AuthThreshold) -> AuthMethod {
        match threshold {
            AuthThreshold::Open => AuthMethod::None,
            AuthThreshold::WpaPersonal => AuthMethod::WPA,
            AuthThreshold::Wpa2Personal => AuthMethod::WPA2Personal,
            AuthThreshold::Wpa2Wpa3Personal => AuthMethod::WPA2WPA3Personal,
            AuthThreshold::Wpa3Personal => AuthMethod::WPA3Personal,
        }
    }

    pub struct EspWifiLink {
        wifi: EspWifi<'static>,
        settings: WifiSettings,
        _wifi_sub: EspSubscription<'static, System>,
        _ip_sub: EspSubscription<'static, System>,
    }

    impl EspWifiLink {
        /// Create the station interface and route its events to `events`.
        pub fn new(
            modem: Modem,
            sysloop: EspSystemEventLoop,
            nvs: Option<EspDefaultNvsPartition>,
            settings: &WifiSettings,
            events: LinkEventSender,
        ) -> Result<Self, LinkError> {
            let wifi = EspWifi::new(modem, sysloop.clone(), nvs).map_err(|e| {
                error!("WiFi: driver init failed — {}", e);
                LinkError::DriverInit
            })?;

            let wifi_events = events.clone();
            let wifi_sub = sysloop
                .subscribe::<WifiEvent, _>(move |event| match event {
                    WifiEvent::StaStarted => forward(&wifi_events, LinkEvent::InterfaceStarted),
                    WifiEvent::StaDisconnected(disconnected) => {
                        let reason = u16::from(disconnected.reason());
                        forward(&wifi_events, LinkEvent::Disconnected { reason });
                    }
                    _ => {}
                })
                .map_err(|_| LinkError::DriverInit)?;

            let ip_sub = sysloop
                .subscribe::<IpEvent, _>(move |event| {
                    if let IpEvent::DhcpIpAssigned(assignment) = event {
                        forward(&events, LinkEvent::AddressAcquired(assignment.ip()));
                    }
                })
                .map_err(|_| LinkError::DriverInit)?;

            Ok(Self {
                wifi,
                settings: settings.clone(),
                _wifi_sub: wifi_sub,
                _ip_sub: ip_sub,
            })
        }
    }

    impl LinkDriver for EspWifiLink {
        fn start(&mut self) -> Result<(), LinkError> {
            let config = Configuration::Client(ClientConfiguration {
                ssid: self.settings.ssid.clone(),
                password: self.settings.password.clone(),
                auth_method: auth_method(self.settings.auth_threshold),
                ..Default::default()
            });
            self.wifi.set_configuration(&config).map_err(|e| {
                error!("WiFi: set_configuration failed — {}", e);
                LinkError::DriverInit
            })?;
            self.wifi.start().map_err(|e| {
                error!("WiFi: start failed — {}", e);
                LinkError::DriverInit
            })?;
            info!("WiFi: STA started, ssid='{}'", self.settings.ssid);
            Ok(())
        }

        fn connect(&mut self) -> Result<(), LinkError> {
            self.wifi.connect().map_err(|e| {
                warn!("WiFi: connect rejected — {}", e);
                LinkError::ConnectRejected
            })
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod sim {
    use std::collections::VecDeque;
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Outcome of one simulated association attempt.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum SimAttach {
        /// The AP refuses; a disconnect with `reason` follows.
        Reject { reason: u16 },
        /// DHCP hands out `ip`.
        Accept(Ipv4Addr),
        /// Nothing happens; the attach wait runs into its timeout.
        Silent,
    }

    pub struct SimWifiLink {
        events: LinkEventSender,
        script: VecDeque<SimAttach>,
        connects: Arc<AtomicU32>,
    }

    impl SimWifiLink {
        /// Each `connect()` consumes the next scripted outcome; an empty
        /// script behaves like [`SimAttach::Silent`].
        pub fn new(events: LinkEventSender, script: impl IntoIterator<Item = SimAttach>) -> Self {
            Self {
                events,
                script: script.into_iter().collect(),
                connects: Arc::new(AtomicU32::new(0)),
            }
        }

        /// Attaches on the first attempt.
        pub fn attaching(events: LinkEventSender, ip: Ipv4Addr) -> Self {
            Self::new(events, [SimAttach::Accept(ip)])
        }

        /// Shared counter of `connect()` calls, readable after the driver
        /// has been moved into the manager.
        pub fn connect_counter(&self) -> Arc<AtomicU32> {
            Arc::clone(&self.connects)
        }

        /// Emit a spontaneous link loss.
        pub fn drop_link(&self, reason: u16) {
            forward(&self.events, LinkEvent::Disconnected { reason });
        }
    }

    impl LinkDriver for SimWifiLink {
        fn start(&mut self) -> Result<(), LinkError> {
            info!("WiFi(sim): STA started");
            forward(&self.events, LinkEvent::InterfaceStarted);
            Ok(())
        }

        fn connect(&mut self) -> Result<(), LinkError> {
            let attempt = self.connects.fetch_add(1, Ordering::Relaxed) + 1;
            match self.script.pop_front().unwrap_or(SimAttach::Silent) {
                SimAttach::Reject { reason } => {
                    info!("WiFi(sim): attempt {} rejected ({})", attempt, reason);
                    forward(&self.events, LinkEvent::Disconnected { reason });
                }
                SimAttach::Accept(ip) => {
                    info!("WiFi(sim): attempt {} accepted, ip {}", attempt, ip);
                    forward(&self.events, LinkEvent::AddressAcquired(ip));
                }
                SimAttach::Silent => info!("WiFi(sim): attempt {} unanswered", attempt),
            }
            Ok(())
        }
    }

}
