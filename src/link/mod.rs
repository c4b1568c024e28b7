//! Link connection manager.
//!
//! Brings the station interface to an attached state and keeps it there,
//! bounded by a retry budget. Platform callbacks deliver [`LinkEvent`]s
//! over an mpsc channel; the manager owns the [`LinkMachine`] and is the
//! only thing that ever calls the [`LinkDriver`].
//!
//! ```text
//!  WiFi/IP event loop ──LinkEvent──▶ channel ──▶ LinkConnectionManager
//!                                                  │  LinkMachine
//!                                                  ▼
//!                                              LinkDriver::connect()
//! ```
//!
//! [`start`](LinkConnectionManager::start) blocks the caller with a polling
//! wait (`recv_timeout`, never a busy loop) until the link is attached, the
//! retry budget is spent, or the attach timeout elapses. `Failed` is
//! terminal: recovering from it needs a restart.

pub mod state;

use core::sync::atomic::{AtomicU8, AtomicU16, Ordering};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::app::events::LinkEvent;
use crate::app::ports::LinkDriver;
use crate::config::WifiSettings;
use crate::error::LinkError;

pub use state::{ConnectionState, LinkAction, LinkMachine, RetryCounter};

/// Sending side handed to the platform event callbacks.
pub type LinkEventSender = Sender<LinkEvent>;

/// Create the channel that carries platform events to the manager.
pub fn link_channel() -> (LinkEventSender, Receiver<LinkEvent>) {
    mpsc::channel()
}

// ---------------------------------------------------------------------------
// Shared status
// ---------------------------------------------------------------------------

/// Read-only view of the link for other tasks.
#[derive(Debug)]
pub struct LinkStatus {
    state: AtomicU8,
    retries: AtomicU8,
    last_reason: AtomicU16,
}

impl LinkStatus {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Idle as u8),
            retries: AtomicU8::new(0),
            last_reason: AtomicU16::new(0),
        }
    }

    fn publish(&self, machine: &LinkMachine) {
        self.retries
            .store(machine.retries().count(), Ordering::Relaxed);
        self.state.store(machine.state() as u8, Ordering::Release);
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn retries(&self) -> u8 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Reason code of the most recent disconnect (0 before any).
    pub fn last_reason(&self) -> u16 {
        self.last_reason.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

pub struct LinkConnectionManager<D: LinkDriver> {
    driver: D,
    events: Receiver<LinkEvent>,
    machine: LinkMachine,
    status: Arc<LinkStatus>,
    poll_interval: Duration,
    attach_timeout: Duration,
}

impl<D: LinkDriver> LinkConnectionManager<D> {
    pub fn new(driver: D, events: Receiver<LinkEvent>, settings: &WifiSettings) -> Self {
        Self {
            driver,
            events,
            machine: LinkMachine::new(settings.max_retries),
            status: Arc::new(LinkStatus::new()),
            poll_interval: Duration::from_millis(u64::from(settings.poll_interval_ms)),
            attach_timeout: Duration::from_millis(u64::from(settings.attach_timeout_ms)),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.machine.state()
    }

    pub fn retries(&self) -> u8 {
        self.machine.retries().count()
    }

    pub fn status(&self) -> Arc<LinkStatus> {
        Arc::clone(&self.status)
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Start the interface and block until the link is attached or failed.
    pub fn start(&mut self) -> Result<Ipv4Addr, LinkError> {
        if self.machine.state() != ConnectionState::Idle {
            warn!("Link: start() called in state {:?}", self.machine.state());
        }
        self.machine.begin();
        self.status.publish(&self.machine);

        if let Err(e) = self.driver.start() {
            error!("Link: interface start failed — {}", e);
            self.machine.fail();
            self.status.publish(&self.machine);
            return Err(e);
        }
        info!("Link: station interface started, waiting for attach");

        let deadline = Instant::now() + self.attach_timeout;
        loop {
            match self.events.recv_timeout(self.poll_interval) {
                Ok(event) => {
                    if let Some(ip) = self.handle(event)? {
                        return Ok(ip);
                    }
                    // A steady stream of non-terminal events must not
                    // outlast the attach timeout.
                    if Instant::now() >= deadline {
                        return Err(self.attach_timed_out());
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if Instant::now() >= deadline {
                        return Err(self.attach_timed_out());
                    }
                    debug!(
                        "Link: waiting (state={:?}, retries={})",
                        self.machine.state(),
                        self.retries()
                    );
                }
                Err(RecvTimeoutError::Disconnected) => {
                    error!("Link: event source closed while waiting");
                    self.machine.fail();
                    self.status.publish(&self.machine);
                    return Err(LinkError::EventSourceClosed);
                }
            }
        }
    }

    fn attach_timed_out(&mut self) -> LinkError {
        error!(
            "Link: no attach within {:?} (retries={})",
            self.attach_timeout,
            self.retries()
        );
        self.machine.fail();
        self.status.publish(&self.machine);
        LinkError::Timeout
    }

    /// Keep the link attached after [`start`](Self::start) returned.
    ///
    /// Blocks, handling disconnects with the same retry budget, until the
    /// link fails or the event source goes away.
    pub fn supervise(&mut self) -> LinkError {
        loop {
            let Ok(event) = self.events.recv() else {
                warn!("Link: event source closed, supervision ends");
                return LinkError::EventSourceClosed;
            };
            match self.handle(event) {
                Ok(Some(ip)) => info!("Link: re-attached as {}", ip),
                Ok(None) => {}
                Err(e) => {
                    error!("Link: {} — restart required", e);
                    return e;
                }
            }
        }
    }

    /// Apply one event; `Ok(Some(ip))` once attached.
    fn handle(&mut self, event: LinkEvent) -> Result<Option<Ipv4Addr>, LinkError> {
        if let LinkEvent::Disconnected { reason } = event {
            self.status.last_reason.store(reason, Ordering::Relaxed);
        }
        let action = self.machine.on_event(event);
        self.status.publish(&self.machine);

        match (event, action) {
            (_, LinkAction::None) => {
                debug!("Link: {:?} ignored in {:?}", event, self.machine.state());
                Ok(None)
            }
            (LinkEvent::InterfaceStarted, LinkAction::Connect) => {
                info!("Link: interface started, connecting");
                self.issue_connect();
                Ok(None)
            }
            (LinkEvent::Disconnected { reason }, LinkAction::Connect) => {
                let retries = self.machine.retries();
                warn!(
                    "Link: disconnected (reason {}), retry {}/{}",
                    reason,
                    retries.count(),
                    retries.max()
                );
                self.issue_connect();
                Ok(None)
            }
            (_, LinkAction::Connect) => {
                self.issue_connect();
                Ok(None)
            }
            (_, LinkAction::SignalAttached(ip)) => {
                info!("Link: got IP {}", ip);
                Ok(Some(ip))
            }
            (_, LinkAction::SignalFailed) => {
                error!(
                    "Link: failed to attach after {} attempts",
                    self.retries()
                );
                Err(LinkError::RetriesExhausted)
            }
        }
    }

    fn issue_connect(&mut self) {
        // A rejected request produces no disconnect event; the attach
        // timeout bounds the wait in that case.
        if let Err(e) = self.driver.connect() {
            warn!("Link: connect request failed — {}", e);
        }
    }
}
