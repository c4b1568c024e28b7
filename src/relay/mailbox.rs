//! Single-slot, overwrite-on-write hand-off buffer.
//!
//! A [`Mailbox`] holds at most one message of up to `N - 1` bytes (one
//! byte of the fixed buffer stays reserved for the terminator the serial
//! peer expects). Content never contains a NUL: a store stops at the first
//! NUL byte, exactly like a C string copy would.
//!
//! Every store bumps a generation number. Readers that act on a copy and
//! clear afterwards compare generations, not bytes, so a repeated identical
//! message that lands in between is still seen as new.
//!
//! The slot is guarded by an `embassy-sync` critical-section mutex. Every
//! accessor holds the lock only for the duration of the copy; nothing
//! sleeps or performs I/O while holding it.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use heapless::Vec;

/// What a [`Mailbox::store`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOutcome {
    /// Bytes now held by the mailbox.
    pub stored: usize,
    /// Bytes dropped past the capacity (excluding anything after a NUL).
    pub truncated: usize,
    /// Unread content was overwritten.
    pub replaced: bool,
}

/// Identifies one [`Mailbox::store`]; wraps on overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u32);

struct Slot<const N: usize> {
    content: Vec<u8, N>,
    generation: u32,
}

pub struct Mailbox<const N: usize> {
    slot: Mutex<CriticalSectionRawMutex, RefCell<Slot<N>>>,
}

impl<const N: usize> Mailbox<N> {
    /// Largest message the mailbox holds.
    pub const MAX_CONTENT: usize = N - 1;

    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(RefCell::new(Slot {
                content: Vec::new(),
                generation: 0,
            })),
        }
    }

    /// Replace the content with `bytes`, last write wins.
    ///
    /// Copies up to the first NUL and at most [`Self::MAX_CONTENT`] bytes.
    /// An input that is empty after the NUL cut leaves the mailbox empty.
    pub fn store(&self, bytes: &[u8]) -> StoreOutcome {
        let visible = match bytes.iter().position(|&b| b == 0) {
            Some(nul) => &bytes[..nul],
            None => bytes,
        };
        let kept = visible.len().min(Self::MAX_CONTENT);

        self.slot.lock(|cell| {
            let mut slot = cell.borrow_mut();
            let replaced = !slot.content.is_empty();
            slot.content.clear();
            // Cannot fail: kept <= N - 1.
            let _ = slot.content.extend_from_slice(&visible[..kept]);
            slot.generation = slot.generation.wrapping_add(1);
            StoreOutcome {
                stored: kept,
                truncated: visible.len() - kept,
                replaced,
            }
        })
    }

    /// Remove and return the content when `accept` approves it.
    ///
    /// Check and removal happen under one lock acquisition, so a concurrent
    /// store lands either wholly before or wholly after the take.
    pub fn take_if(&self, accept: impl FnOnce(&[u8]) -> bool) -> Option<Vec<u8, N>> {
        self.slot.lock(|cell| {
            let mut slot = cell.borrow_mut();
            if slot.content.is_empty() || !accept(&slot.content) {
                return None;
            }
            Some(core::mem::take(&mut slot.content))
        })
    }

    /// Copy of the current content (empty when nothing is held).
    pub fn snapshot(&self) -> Vec<u8, N> {
        self.slot.lock(|cell| cell.borrow().content.clone())
    }

    /// Copy of the current content together with the store that wrote it.
    pub fn snapshot_tagged(&self) -> (Vec<u8, N>, Generation) {
        self.slot.lock(|cell| {
            let slot = cell.borrow();
            (slot.content.clone(), Generation(slot.generation))
        })
    }

    /// Clear the slot only if no store happened since `seen` was taken.
    ///
    /// Returns `false` when a newer message (even an identical one)
    /// replaced it in the meantime.
    pub fn clear_if_generation(&self, seen: Generation) -> bool {
        self.slot.lock(|cell| {
            let mut slot = cell.borrow_mut();
            if slot.generation == seen.0 {
                slot.content.clear();
                true
            } else {
                false
            }
        })
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock(|cell| cell.borrow().content.is_empty())
    }

    pub fn len(&self) -> usize {
        self.slot.lock(|cell| cell.borrow().content.len())
    }
}

impl<const N: usize> Default for Mailbox<N> {
    fn default() -> Self {
        Self::new()
    }
}
