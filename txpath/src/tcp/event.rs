//! Connection events and the callback registry.
use core::{fmt, ops};
use std::sync::Arc;

use super::conn::State;
use crate::nic::Device;
use crate::time::Instant;

/// A set of connection events, delivered as a bitmask.
///
/// The driver posts these on every poll cycle; a registered callback sees the
/// whole mask and may pass it on modified. Which events can be combined in
/// one invocation is constrained by the dispatch framework: an
/// acknowledgment and a retransmission request are never posted together.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Events(pub u16);

impl Events {
    /// An acknowledgment for previously sent data arrived.
    pub const ACK: Events = Events(1 << 0);
    /// The connection asks for a retransmission from the last acknowledged
    /// byte.
    pub const RETRANSMIT: Events = Events(1 << 1);
    /// New incoming data occupies the device buffer this cycle.
    pub const DATA: Events = Events(1 << 2);
    /// An idle poll: the device can take an outgoing segment.
    pub const POLL: Events = Events(1 << 3);
    /// The connection was closed in an orderly fashion.
    pub const CLOSE: Events = Events(1 << 4);
    /// The connection was aborted by the peer.
    pub const ABORT: Events = Events(1 << 5);
    /// The transport gave up on the connection (retransmission limit).
    pub const TIMEOUT: Events = Events(1 << 6);

    /// The empty event set.
    pub const fn none() -> Events {
        Events(0)
    }

    /// The union of two event sets.
    pub const fn union(self, other: Events) -> Events {
        Events(self.0 | other.0)
    }

    /// Whether every event in `other` is also set in `self`.
    pub fn contains(self, other: Events) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether any event in `other` is also set in `self`.
    pub fn intersects(self, other: Events) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether no event is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl ops::BitOr for Events {
    type Output = Events;

    fn bitor(self, rhs: Events) -> Events {
        self.union(rhs)
    }
}

impl ops::BitOrAssign for Events {
    fn bitor_assign(&mut self, rhs: Events) {
        *self = *self | rhs;
    }
}

impl ops::BitAnd for Events {
    type Output = Events;

    fn bitand(self, rhs: Events) -> Events {
        Events(self.0 & rhs.0)
    }
}

impl fmt::Display for Events {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        const NAMES: [(Events, &str); 7] = [
            (Events::ACK, "ack"),
            (Events::RETRANSMIT, "retransmit"),
            (Events::DATA, "data"),
            (Events::POLL, "poll"),
            (Events::CLOSE, "close"),
            (Events::ABORT, "abort"),
            (Events::TIMEOUT, "timeout"),
        ];

        if self.is_empty() {
            return f.write_str("-");
        }

        let mut first = true;
        for (event, name) in NAMES.iter() {
            if self.contains(*event) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// A callback registered on a connection.
///
/// Invoked at poll context, under the connection lock, once per poll cycle
/// whose event mask intersects the registered one. Implementations must
/// neither block nor allocate: the driver is waiting.
pub trait TcpEvent: Send + Sync {
    /// Handle one poll cycle's events, returning the possibly consumed mask.
    fn event(&self, dev: &mut dyn Device, state: &mut State, events: Events, now: Instant) -> Events;
}

/// Handle to an allocated callback registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CbHandle(usize);

struct Slot {
    taken: bool,
    mask: Events,
    handler: Option<Arc<dyn TcpEvent>>,
}

/// The fixed-capacity callback registration table of a connection.
///
/// Registrations go through a small lifecycle: [`alloc`](CallbackList::alloc)
/// claims a slot and arms it, [`strip`](CallbackList::strip) disarms it while
/// keeping the slot claimed (the completion path uses this to fence off any
/// poll already in flight), and [`release`](CallbackList::release) returns
/// the slot to the free pool. Releasing an already free slot is a no-op.
pub struct CallbackList {
    slots: Vec<Slot>,
}

impl CallbackList {
    /// Create a table with `capacity` registration slots.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            slots.push(Slot { taken: false, mask: Events::none(), handler: None });
        }
        CallbackList { slots }
    }

    /// Claim a free slot and arm it with `mask` and `handler`.
    ///
    /// `None` when the table is exhausted.
    pub fn alloc(&mut self, mask: Events, handler: Arc<dyn TcpEvent>) -> Option<CbHandle> {
        let (idx, slot) = self.slots.iter_mut().enumerate().find(|(_, s)| !s.taken)?;
        slot.taken = true;
        slot.mask = mask;
        slot.handler = Some(handler);
        Some(CbHandle(idx))
    }

    /// Disarm a registration without freeing its slot.
    ///
    /// After this no further invocation of the handler can occur, even if
    /// another poll is already walking the table.
    pub fn strip(&mut self, handle: CbHandle) {
        if let Some(slot) = self.slots.get_mut(handle.0) {
            slot.mask = Events::none();
            slot.handler = None;
        }
    }

    /// Return a slot to the free pool, disarming it if needed.
    ///
    /// Idempotent: releasing a slot that was already released is harmless.
    pub fn release(&mut self, handle: CbHandle) {
        if let Some(slot) = self.slots.get_mut(handle.0) {
            slot.taken = false;
            slot.mask = Events::none();
            slot.handler = None;
        }
    }

    /// The number of currently claimed slots.
    pub fn allocated(&self) -> usize {
        self.slots.iter().filter(|s| s.taken).count()
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// The handler of slot `idx`, if armed for any of `events`.
    pub(crate) fn handler_at(&self, idx: usize, events: Events) -> Option<Arc<dyn TcpEvent>> {
        let slot = self.slots.get(idx)?;
        if slot.taken && slot.mask.intersects(events) {
            slot.handler.clone()
        } else {
            None
        }
    }
}
