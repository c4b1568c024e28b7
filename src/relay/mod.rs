//! Frame relay — moves bytes between the serial channel and the broker.
//!
//! Three independently scheduled activities hand data off through two
//! single-slot mailboxes:
//!
//! ```text
//!   SerialRx ──ingest──▶ FrameMailbox ──forward──▶ TelemetryPublisher
//!   SerialTx ◀─command── CommandMailbox ◀──────── PubSubBridge (Received)
//! ```
//!
//! Each activity polls on its own cadence. The only suspension points are
//! the cadence sleep and the bounded serial read; mailbox locks are held
//! for the copy alone. Last write wins in both mailboxes.

pub mod mailbox;

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use crate::app::health::GatewayHealth;
use crate::app::ports::{SerialRx, SerialTx, TelemetryPublisher};
use crate::bridge::QoS;
use crate::config::{BrokerSettings, RelaySettings, SerialSettings};
use crate::error::{BrokerError, Error, SerialError};
use crate::task::{self, TaskSpec};

pub use mailbox::{Generation, Mailbox, StoreOutcome};

/// Size of the inbound frame slot, terminator included.
pub const FRAME_CAPACITY: usize = 50;
/// Size of the outbound command slot, terminator included.
pub const COMMAND_CAPACITY: usize = 50;

pub type FrameMailbox = Mailbox<FRAME_CAPACITY>;
pub type CommandMailbox = Mailbox<COMMAND_CAPACITY>;

/// Appended to every command written to the serial peer.
pub const LINE_TERMINATOR: &[u8] = b"\r\n";
const LINE_CAPACITY: usize = CommandMailbox::MAX_CONTENT + LINE_TERMINATOR.len();

pub const INGEST_TASK: TaskSpec = TaskSpec {
    name: "uart-read\0",
    priority: 10,
    stack_kb: 4,
};

pub const FORWARD_TASK: TaskSpec = TaskSpec {
    name: "mqtt-publish\0",
    priority: 5,
    stack_kb: 4,
};

pub const COMMAND_TASK: TaskSpec = TaskSpec {
    name: "uart-send\0",
    priority: 6,
    stack_kb: 4,
};

// ---------------------------------------------------------------------------
// Per-cycle outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Nothing arrived within the read timeout.
    Idle,
    Stored(StoreOutcome),
    Failed(SerialError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    Empty,
    /// Content present but without the sentinel; left for a later cycle.
    Waiting,
    Published { bytes: usize },
    /// The frame was consumed; the transport reported failure.
    Failed(BrokerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Idle,
    Sent { bytes: usize, cleared: bool },
    /// The command stays queued for the next cycle.
    Failed(SerialError),
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

pub struct FrameRelay<P> {
    publisher: P,
    frames: Arc<FrameMailbox>,
    commands: Arc<CommandMailbox>,
    health: Arc<GatewayHealth>,

    topic: String,
    qos: QoS,
    retain: bool,
    sentinel: String,
    resend_commands: bool,

    read_timeout: Duration,
    ingest_interval: Duration,
    forward_interval: Duration,
    command_interval: Duration,
}

/// Join handles of the three relay activities.
pub struct RelayTasks {
    pub ingest: JoinHandle<()>,
    pub forward: JoinHandle<()>,
    pub command: JoinHandle<()>,
}

fn millis(ms: u32) -> Duration {
    Duration::from_millis(u64::from(ms))
}

impl<P: TelemetryPublisher> FrameRelay<P> {
    pub fn new(
        publisher: P,
        frames: Arc<FrameMailbox>,
        commands: Arc<CommandMailbox>,
        health: Arc<GatewayHealth>,
        broker: &BrokerSettings,
        serial: &SerialSettings,
        relay: &RelaySettings,
    ) -> Self {
        Self {
            publisher,
            frames,
            commands,
            health,
            topic: broker.telemetry_topic.clone(),
            qos: broker.publish_qos,
            retain: broker.retain,
            sentinel: relay.sentinel.clone(),
            resend_commands: relay.resend_commands,
            read_timeout: millis(serial.read_timeout_ms),
            ingest_interval: millis(relay.ingest_interval_ms),
            forward_interval: millis(relay.forward_interval_ms),
            command_interval: millis(relay.command_interval_ms),
        }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn frames(&self) -> &FrameMailbox {
        &self.frames
    }

    pub fn commands(&self) -> &CommandMailbox {
        &self.commands
    }

    // ── serial-ingest ─────────────────────────────────────────

    /// One bounded read; a non-empty frame replaces the mailbox content.
    pub fn ingest_once<R: SerialRx>(&self, rx: &mut R) -> IngestOutcome {
        let mut buf = [0u8; FRAME_CAPACITY];
        let max = FrameMailbox::MAX_CONTENT;

        let n = match rx.read_frame(&mut buf[..max], self.read_timeout) {
            Ok(0) => return IngestOutcome::Idle,
            Ok(n) => n.min(max),
            Err(e) => {
                warn!("UART: read failed — {}", e);
                return IngestOutcome::Failed(e);
            }
        };

        let out = self.frames.store(&buf[..n]);
        self.health.record_frame(out.replaced);
        if out.replaced {
            debug!("UART: unread frame overwritten");
        }
        info!(
            "UART: received {} bytes: {}",
            n,
            String::from_utf8_lossy(&buf[..out.stored])
        );
        IngestOutcome::Stored(out)
    }

    // ── publish-forward ───────────────────────────────────────

    /// Publish the held frame once it carries the sentinel.
    pub fn forward_once(&self) -> ForwardOutcome {
        let sentinel = self.sentinel.as_bytes();
        let Some(frame) = self.frames.take_if(|c| contains_subslice(c, sentinel)) else {
            return if self.frames.is_empty() {
                ForwardOutcome::Empty
            } else {
                ForwardOutcome::Waiting
            };
        };

        match self
            .publisher
            .publish(&self.topic, &frame, self.qos, self.retain)
        {
            Ok(()) => {
                info!("MQTT: published {} bytes to '{}'", frame.len(), self.topic);
                ForwardOutcome::Published { bytes: frame.len() }
            }
            Err(e) => {
                warn!("MQTT: frame dropped, publish failed — {}", e);
                ForwardOutcome::Failed(e)
            }
        }
    }

    // ── command-relay ─────────────────────────────────────────

    /// Write the pending command plus CR-LF in a single call.
    pub fn relay_command_once<T: SerialTx>(&self, tx: &mut T) -> CommandOutcome {
        let (cmd, generation) = self.commands.snapshot_tagged();
        if cmd.is_empty() {
            return CommandOutcome::Idle;
        }

        let mut line: heapless::Vec<u8, LINE_CAPACITY> = heapless::Vec::new();
        // Cannot fail: cmd.len() <= MAX_CONTENT.
        let _ = line.extend_from_slice(&cmd);
        let _ = line.extend_from_slice(LINE_TERMINATOR);

        let result = match tx.write_frame(&line) {
            Ok(n) if n == line.len() => Ok(n),
            Ok(n) => {
                warn!("UART: short write ({} of {} bytes)", n, line.len());
                Err(SerialError::WriteFailed)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(bytes) => {
                self.health.record_command_write(true);
                let cleared = !self.resend_commands && self.commands.clear_if_generation(generation);
                info!("UART: sent command: {}", String::from_utf8_lossy(&cmd));
                CommandOutcome::Sent { bytes, cleared }
            }
            Err(e) => {
                self.health.record_command_write(false);
                warn!("UART: command write failed — {}", e);
                CommandOutcome::Failed(e)
            }
        }
    }
}

impl<P: TelemetryPublisher + Send + Sync + 'static> FrameRelay<P> {
    /// Start the three activities. They run for the process lifetime.
    pub fn spawn<R, T>(self: Arc<Self>, mut rx: R, mut tx: T) -> Result<RelayTasks, Error>
    where
        R: SerialRx + Send + 'static,
        T: SerialTx + Send + 'static,
    {
        let relay = Arc::clone(&self);
        let ingest = task::spawn(&INGEST_TASK, move || loop {
            relay.ingest_once(&mut rx);
            thread::sleep(relay.ingest_interval);
        })?;

        let relay = Arc::clone(&self);
        let forward = task::spawn(&FORWARD_TASK, move || loop {
            relay.forward_once();
            thread::sleep(relay.forward_interval);
        })?;

        let relay = self;
        let command = task::spawn(&COMMAND_TASK, move || loop {
            relay.relay_command_once(&mut tx);
            thread::sleep(relay.command_interval);
        })?;

        Ok(RelayTasks {
            ingest,
            forward,
            command,
        })
    }
}
