//! Gateway health signal.
//!
//! Broker failures are not retried by the engine, so instead of running
//! silently degraded every component records what it observes here. The
//! entry point logs a [`HealthSnapshot`] periodically.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Shared counters and flags, updated lock-free from any task.
#[derive(Debug, Default)]
pub struct GatewayHealth {
    broker_connected: AtomicBool,
    command_subscribed: AtomicBool,
    publishes_ok: AtomicU32,
    publish_failures: AtomicU32,
    commands_received: AtomicU32,
    command_bytes_truncated: AtomicU32,
    commands_sent: AtomicU32,
    serial_write_failures: AtomicU32,
    frames_ingested: AtomicU32,
    frames_overwritten: AtomicU32,
}

/// Point-in-time copy of [`GatewayHealth`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub broker_connected: bool,
    pub command_subscribed: bool,
    pub publishes_ok: u32,
    pub publish_failures: u32,
    pub commands_received: u32,
    pub command_bytes_truncated: u32,
    pub commands_sent: u32,
    pub serial_write_failures: u32,
    pub frames_ingested: u32,
    pub frames_overwritten: u32,
}

impl HealthSnapshot {
    /// The bridge cannot currently deliver in both directions.
    pub fn is_degraded(&self) -> bool {
        !self.broker_connected || !self.command_subscribed
    }
}

fn bump(counter: &AtomicU32, by: u32) {
    counter.fetch_add(by, Ordering::Relaxed);
}

impl GatewayHealth {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Broker session ────────────────────────────────────────

    pub fn set_broker_connected(&self, connected: bool) {
        self.broker_connected.store(connected, Ordering::Relaxed);
        if !connected {
            self.command_subscribed.store(false, Ordering::Relaxed);
        }
    }

    pub fn set_command_subscribed(&self, subscribed: bool) {
        self.command_subscribed.store(subscribed, Ordering::Relaxed);
    }

    pub fn record_publish(&self, ok: bool) {
        if ok {
            bump(&self.publishes_ok, 1);
        } else {
            bump(&self.publish_failures, 1);
        }
    }

    pub fn record_command(&self, truncated: usize) {
        bump(&self.commands_received, 1);
        bump(&self.command_bytes_truncated, truncated as u32);
    }

    // ── Serial side ───────────────────────────────────────────

    pub fn record_frame(&self, overwrote_unread: bool) {
        bump(&self.frames_ingested, 1);
        if overwrote_unread {
            bump(&self.frames_overwritten, 1);
        }
    }

    pub fn record_command_write(&self, ok: bool) {
        if ok {
            bump(&self.commands_sent, 1);
        } else {
            bump(&self.serial_write_failures, 1);
        }
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            broker_connected: self.broker_connected.load(Ordering::Relaxed),
            command_subscribed: self.command_subscribed.load(Ordering::Relaxed),
            publishes_ok: self.publishes_ok.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            commands_received: self.commands_received.load(Ordering::Relaxed),
            command_bytes_truncated: self.command_bytes_truncated.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            serial_write_failures: self.serial_write_failures.load(Ordering::Relaxed),
            frames_ingested: self.frames_ingested.load(Ordering::Relaxed),
            frames_overwritten: self.frames_overwritten.load(Ordering::Relaxed),
        }
    }
}
