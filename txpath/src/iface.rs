//! Interface-level hooks consumed by the transmit path.
//!
//! The transmit path does not talk to the rest of the stack directly; it goes
//! through the [`Netif`] capability. That keeps the core testable and leaves
//! the interesting policy — how a driver poll loop is woken, where the
//! resolution cache lives, which clock counts — to the integration.
//! [`Iface`] is the batteries-included software implementation used by the
//! example and by stacks that poll in a dedicated thread.
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::{Condvar, Mutex};

use crate::neighbor::{Cache, HwAddr};
use crate::time::Instant;
use crate::{Error, Result};

/// The collaborator functions the transmit path consumes.
///
/// One implementation per interface; connections keep a shared handle to it.
pub trait Netif: Send + Sync {
    /// Notify the driver that outbound data is pending for `peer`.
    ///
    /// Wakes whatever execution context polls the interface reaching that
    /// peer. Called by the send entry point after its registration is fully
    /// armed, never from poll context.
    fn tx_notify(&self, peer: Ipv4Addr);

    /// Whether the resolution cache currently holds a valid link-layer
    /// mapping for `peer`.
    fn has_neighbor(&self, peer: Ipv4Addr) -> bool;

    /// Resolve `peer`'s link-layer address before any data is sent.
    ///
    /// May block while the resolution protocol runs. An error is surfaced to
    /// the sending caller as [`Error::Unreachable`].
    fn probe_neighbor(&self, peer: Ipv4Addr) -> Result<()>;

    /// The interface's monotonic clock.
    ///
    /// The activity stamp of a send and the poll timestamps compared against
    /// it must come from the same clock.
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A software interface.
///
/// Owns a [`neighbor::Cache`](crate::neighbor::Cache) and a tx-pending
/// mailbox a driver poll loop can park on. Resolution is answered from the
/// cache only: mappings get in through [`fill_neighbor`](Iface::fill_neighbor),
/// typically harvested from incoming traffic by the receive path.
pub struct Iface {
    neighbors: Mutex<Cache>,
    pending: Mutex<VecDeque<Ipv4Addr>>,
    cond: Condvar,
}

impl Iface {
    /// Create an interface with a neighbor cache of `neighbor_capacity`
    /// entries.
    pub fn new(neighbor_capacity: usize) -> Self {
        Iface {
            neighbors: Mutex::new(Cache::new(neighbor_capacity)),
            pending: Mutex::new(VecDeque::new()),
            cond: Condvar::new(),
        }
    }

    /// Record a resolved link-layer mapping.
    ///
    /// `timestamp` bounds the lifetime of the entry, `None` makes it
    /// permanent.
    pub fn fill_neighbor(&self, peer: Ipv4Addr, hw: HwAddr, timestamp: Option<Instant>) {
        self.lock_neighbors().fill(peer, hw, timestamp);
    }

    /// Park until a peer has pending outbound data, then return it.
    pub fn wait_pending(&self) -> Ipv4Addr {
        let mut pending = lock(&self.pending);
        loop {
            if let Some(peer) = pending.pop_front() {
                return peer;
            }
            pending = match self.cond.wait(pending) {
                Ok(guard) => guard,
                Err(poison) => poison.into_inner(),
            };
        }
    }

    /// Non-blocking variant of [`wait_pending`](Iface::wait_pending).
    pub fn try_pending(&self) -> Option<Ipv4Addr> {
        lock(&self.pending).pop_front()
    }

    fn lock_neighbors(&self) -> std::sync::MutexGuard<'_, Cache> {
        lock(&self.neighbors)
    }
}

impl Netif for Iface {
    fn tx_notify(&self, peer: Ipv4Addr) {
        lock(&self.pending).push_back(peer);
        self.cond.notify_one();
    }

    fn has_neighbor(&self, peer: Ipv4Addr) -> bool {
        self.lock_neighbors().lookup(peer, self.now()).is_some()
    }

    fn probe_neighbor(&self, peer: Ipv4Addr) -> Result<()> {
        // A full stack would emit a solicitation here and wait for the
        // answer; the software interface only knows what it was told.
        if self.has_neighbor(peer) {
            Ok(())
        } else {
            Err(Error::Unreachable)
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poison) => poison.into_inner(),
    }
}
