//! Link attach state machine.
//!
//! A pure transition function over [`ConnectionState`]: feed it
//! [`LinkEvent`]s, get back the [`LinkAction`] the caller must perform.
//! No I/O happens here, which is what makes the retry bound checkable.
//!
//! ```text
//!   Idle ──begin──▶ Connecting ──AddressAcquired──▶ Attached
//!                     │   ▲                            │
//!          Disconnected│   │Disconnected (budget left)  │Disconnected
//!                     ▼   │                            ▼
//!                   (retry n+1) ◀──────────────── Connecting
//!                     │
//!                     └── budget exhausted ──▶ Failed (terminal)
//! ```

use std::net::Ipv4Addr;

use crate::app::events::LinkEvent;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    Idle = 0,
    Connecting = 1,
    Attached = 2,
    Failed = 3,
}

impl ConnectionState {
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::Connecting,
            2 => Self::Attached,
            _ => Self::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Failed
    }
}

// ---------------------------------------------------------------------------
// Retry counter
// ---------------------------------------------------------------------------

/// Bounded disconnect counter. Invariant: `0 <= count <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryCounter {
    count: u8,
    max: u8,
}

impl RetryCounter {
    pub fn new(max: u8) -> Self {
        Self { count: 0, max }
    }

    pub fn count(&self) -> u8 {
        self.count
    }

    pub fn max(&self) -> u8 {
        self.max
    }

    /// Count one more disconnect. Returns `false` (and leaves the counter
    /// untouched) when the budget is already spent.
    pub fn try_increment(&mut self) -> bool {
        if self.count < self.max {
            self.count += 1;
            true
        } else {
            false
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.count >= self.max
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    None,
    /// Issue an association attempt.
    Connect,
    /// The link is attached; wake the waiter.
    SignalAttached(Ipv4Addr),
    /// The retry budget is spent; wake the waiter with a failure.
    SignalFailed,
}

#[derive(Debug, Clone)]
pub struct LinkMachine {
    state: ConnectionState,
    retries: RetryCounter,
    address: Option<Ipv4Addr>,
}

impl LinkMachine {
    pub fn new(max_retries: u8) -> Self {
        Self {
            state: ConnectionState::Idle,
            retries: RetryCounter::new(max_retries),
            address: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn retries(&self) -> RetryCounter {
        self.retries
    }

    pub fn address(&self) -> Option<Ipv4Addr> {
        self.address
    }

    /// Leave `Idle`; the interface is about to be started.
    pub fn begin(&mut self) {
        if self.state == ConnectionState::Idle {
            self.state = ConnectionState::Connecting;
        }
    }

    /// Abort the attach (driver failure or timeout). Idempotent.
    pub fn fail(&mut self) -> LinkAction {
        if self.state.is_terminal() {
            return LinkAction::None;
        }
        self.state = ConnectionState::Failed;
        self.address = None;
        LinkAction::SignalFailed
    }

    pub fn on_event(&mut self, event: LinkEvent) -> LinkAction {
        if self.state.is_terminal() {
            return LinkAction::None;
        }

        match event {
            LinkEvent::InterfaceStarted => match self.state {
                ConnectionState::Connecting => LinkAction::Connect,
                _ => LinkAction::None,
            },

            LinkEvent::Disconnected { .. } => {
                if self.state == ConnectionState::Idle {
                    return LinkAction::None;
                }
                self.state = ConnectionState::Connecting;
                self.address = None;
                self.retries.try_increment();
                if self.retries.is_exhausted() {
                    self.state = ConnectionState::Failed;
                    LinkAction::SignalFailed
                } else {
                    LinkAction::Connect
                }
            }

            LinkEvent::AddressAcquired(ip) => {
                self.retries.reset();
                self.state = ConnectionState::Attached;
                self.address = Some(ip);
                LinkAction::SignalAttached(ip)
            }
        }
    }
}
