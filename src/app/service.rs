//! Gateway service — startup orchestration.
//!
//! [`GatewayService::start`] runs the bring-up in dependency order and
//! hands back a [`GatewayHandle`]. All platform I/O arrives through the
//! port traits, so the whole path runs against simulation adapters.
//!
//! ```text
//!  validate ─▶ LinkConnectionManager::start ─▶ PubSubBridge::start
//!                      │ Attached                    │
//!                      ▼                             ▼
//!              link-supervisor task         event pump + FrameRelay tasks
//! ```

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::thread::JoinHandle;

use log::{error, info, warn};

use crate::bridge::PubSubBridge;
use crate::config::GatewayConfig;
use crate::error::Error;
use crate::link::{ConnectionState, LinkConnectionManager, LinkStatus};
use crate::relay::{CommandMailbox, FrameMailbox, FrameRelay, RelayTasks};
use crate::task::{self, TaskSpec};

use super::events::LinkEvent;
use super::health::{GatewayHealth, HealthSnapshot};
use super::ports::{BrokerConnector, LinkDriver, SerialRx, SerialTx};

pub const SUPERVISOR_TASK: TaskSpec = TaskSpec {
    name: "link-supervisor\0",
    priority: 4,
    stack_kb: 4,
};

// ───────────────────────────────────────────────────────────────
// Handle
// ───────────────────────────────────────────────────────────────

/// What a running gateway exposes to the entry point.
pub struct GatewayHandle {
    health: Arc<GatewayHealth>,
    link: Arc<LinkStatus>,
    address: Ipv4Addr,
    frames: Arc<FrameMailbox>,
    commands: Arc<CommandMailbox>,
    pub relay: RelayTasks,
    pub event_pump: JoinHandle<()>,
    pub supervisor: JoinHandle<()>,
}

impl GatewayHandle {
    pub fn health(&self) -> HealthSnapshot {
        self.health.snapshot()
    }

    pub fn link_state(&self) -> ConnectionState {
        self.link.state()
    }

    pub fn link_retries(&self) -> u8 {
        self.link.retries()
    }

    pub fn link_last_reason(&self) -> u16 {
        self.link.last_reason()
    }

    /// Address obtained when the link first attached.
    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn frames(&self) -> &FrameMailbox {
        &self.frames
    }

    pub fn commands(&self) -> &CommandMailbox {
        &self.commands
    }

    /// Emit one health line; warns while degraded.
    pub fn log_health(&self) {
        let h = self.health();
        let line = format!(
            "Health: link={:?} last_disc={} broker={} sub={} pub_ok={} pub_fail={} frames={} overwritten={} cmds={} sent={} write_fail={}",
            self.link_state(),
            self.link_last_reason(),
            h.broker_connected,
            h.command_subscribed,
            h.publishes_ok,
            h.publish_failures,
            h.frames_ingested,
            h.frames_overwritten,
            h.commands_received,
            h.commands_sent,
            h.serial_write_failures,
        );
        if h.is_degraded() || self.link_state() != ConnectionState::Attached {
            warn!("{} [DEGRADED]", line);
        } else {
            info!("{}", line);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Service
// ───────────────────────────────────────────────────────────────

pub struct GatewayService;

impl GatewayService {
    /// Bring the gateway up: link, then broker session, then relay.
    ///
    /// Blocks until the link attaches. Link failure returns
    /// [`Error::Link`] and nothing else is started.
    pub fn start<D, C, R, T>(
        config: GatewayConfig,
        link_driver: D,
        link_events: Receiver<LinkEvent>,
        mut connector: C,
        serial_rx: R,
        serial_tx: T,
    ) -> Result<GatewayHandle, Error>
    where
        D: LinkDriver + Send + 'static,
        C: BrokerConnector,
        R: SerialRx + Send + 'static,
        T: SerialTx + Send + 'static,
    {
        config.validate().map_err(|e| {
            error!("Gateway: configuration rejected — {}", e);
            e
        })?;

        // ── Link ──
        let mut link = LinkConnectionManager::new(link_driver, link_events, &config.wifi);
        let link_status = link.status();
        let address = link.start()?;
        info!("Gateway: link attached as {}", address);

        // ── Broker ──
        let health = Arc::new(GatewayHealth::new());
        let frames = Arc::new(FrameMailbox::new());
        let commands = Arc::new(CommandMailbox::new());

        let (bridge, events) = PubSubBridge::start(
            &mut connector,
            config.broker.clone(),
            Arc::clone(&commands),
            Arc::clone(&health),
        )?;
        let event_pump = bridge.spawn_event_pump(events)?;

        // ── Relay ──
        let relay = Arc::new(FrameRelay::new(
            bridge,
            Arc::clone(&frames),
            Arc::clone(&commands),
            Arc::clone(&health),
            &config.broker,
            &config.serial,
            &config.relay,
        ));
        let relay_tasks = relay.spawn(serial_rx, serial_tx)?;

        let supervisor = task::spawn(&SUPERVISOR_TASK, move || {
            let reason = link.supervise();
            error!("Gateway: link supervision ended — {}", reason);
        })?;

        info!("Gateway: running");
        Ok(GatewayHandle {
            health,
            link: link_status,
            address,
            frames,
            commands,
            relay: relay_tasks,
            event_pump,
            supervisor,
        })
    }
}
