//! Per-connection state and the poll-side dispatch.
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard};

use super::event::{CallbackList, Events};
use super::send::Unbuffered;
use crate::iface::Netif;
use crate::nic::Device;
use crate::time::{Duration, Instant};
use crate::wire::SeqNumber;

/// When the peer's link-layer mapping is checked by the transmit path.
///
/// The check exists because a segment staged without a mapping is replaced by
/// a resolution request on the wire and silently never arrives; the send must
/// then not count those bytes as sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArpPolicy {
    /// Resolve the peer up front, before any segment is staged.
    ///
    /// The probe may block; once it succeeds the mapping is assumed live for
    /// the rest of the send.
    Probe,
    /// Trust the cache to be populated, e.g. because mappings are harvested
    /// from incoming traffic. No check at all.
    Trusted,
    /// Consult the cache once, on the first segment of each send.
    ///
    /// Later segments skip the lookup: the first segment having gone out
    /// proves the mapping was there, and the lookup can be expensive on a
    /// well-filled cache.
    CheckFirst,
}

/// Socket-visible state of the send side, observable by other layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SockState {
    /// No send in progress.
    Idle,
    /// A thread is blocked in [`Conn::send`](super::Conn::send).
    Sending,
}

/// Configuration of a connection, fixed at creation.
#[derive(Clone, Debug)]
pub struct Config {
    /// Largest payload the connection puts in one outgoing segment.
    pub mss: usize,
    /// Initial peer receive window; the receive path updates it afterwards.
    pub window: u32,
    /// Number of callback registration slots.
    pub callbacks: usize,
    /// Minimum remaining length for the segment-pairing heuristic, `None` to
    /// disable splitting.
    pub split: Option<usize>,
    /// Link-layer resolution policy.
    pub arp: ArpPolicy,
    /// Give up a send after this long without acknowledgment activity,
    /// `None` to wait forever.
    pub send_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mss: 536,
            window: 65_535,
            callbacks: 4,
            split: None,
            arp: ArpPolicy::Trusted,
            send_timeout: None,
        }
    }
}

/// The connection state behind the connection lock.
///
/// The fields mirror what the wider stack shares with the transmit path. The
/// receive-path collaborator maintains [`ackno`](State::ackno),
/// [`window`](State::window) and [`sndseq`](State::sndseq); while an
/// unbuffered send is in flight the send path is authoritative for the
/// sequence cursor and overrides it on every emission.
pub struct State {
    /// The outgoing sequence cursor: sequence number of the next byte to
    /// send.
    pub sndseq: SeqNumber,
    /// Number of outstanding, unacknowledged bytes on the connection.
    pub unacked: u32,
    /// The receive window currently advertised by the peer.
    pub window: u32,
    /// Largest payload per outgoing segment.
    pub mss: usize,
    /// Acknowledgment number carried by the packet being dispatched.
    pub ackno: SeqNumber,
    /// The remote peer of the connection.
    pub remote: Ipv4Addr,
    /// Whether the connection is in a connected stream state. Cleared when a
    /// loss event is reported.
    pub connected: bool,
    /// Send-side socket state, visible to other layers.
    pub socket: SockState,
    /// The connection's callback registration table.
    pub callbacks: CallbackList,
    pub(crate) split: Option<usize>,
    pub(crate) arp: ArpPolicy,
    pub(crate) send_timeout: Option<Duration>,
    pub(crate) netif: Arc<dyn Netif>,
    pub(crate) txn: Option<Unbuffered>,
}

/// A handle to one TCP connection.
///
/// Cloneable; the thread-side entry points and the driver-side dispatch use
/// clones of the same handle. All access goes through one lock, which is the
/// critical section that keeps poll-context execution and thread-context
/// setup apart.
#[derive(Clone)]
pub struct Conn {
    shared: Arc<Mutex<State>>,
}

impl Conn {
    /// Create a connected connection towards `remote`.
    ///
    /// The sequence fields start at zero; the allocator that hands out
    /// connections is expected to set [`State::sndseq`] before first use.
    pub fn new(netif: Arc<dyn Netif>, remote: Ipv4Addr, config: Config) -> Self {
        let state = State {
            sndseq: SeqNumber::default(),
            unacked: 0,
            window: config.window,
            mss: config.mss,
            ackno: SeqNumber::default(),
            remote,
            connected: true,
            socket: SockState::Idle,
            callbacks: CallbackList::with_capacity(config.callbacks),
            split: config.split,
            arp: config.arp,
            send_timeout: config.send_timeout,
            netif,
            txn: None,
        };
        Conn { shared: Arc::new(Mutex::new(state)) }
    }

    /// Acquire the connection lock.
    ///
    /// Anything that reads or writes shared connection fields — the receive
    /// path updating the acknowledgment number, tests inspecting progress —
    /// does it through this guard.
    pub fn state(&self) -> MutexGuard<'_, State> {
        // Poisoning is not an error state we can meaningfully propagate; the
        // protocol fields are plain data and stay consistent.
        match self.shared.lock() {
            Ok(guard) => guard,
            Err(poison) => poison.into_inner(),
        }
    }

    /// Whether a send is currently in progress.
    pub fn is_sending(&self) -> bool {
        self.state().socket == SockState::Sending
    }

    /// Configure the send timeout, as from a socket option.
    pub fn set_send_timeout(&self, timeout: Option<Duration>) {
        self.state().send_timeout = timeout;
    }

    /// Dispatch one poll cycle's events to the registered callbacks.
    ///
    /// Called by the driver, at poll context, for the connection that owns
    /// the current device buffer. Every armed registration whose mask
    /// intersects `events` is invoked with the running mask; the final mask
    /// is handed back to the driver.
    pub fn dispatch(&self, dev: &mut dyn Device, events: Events, now: Instant) -> Events {
        let mut st = self.state();
        let mut events = events;
        for idx in 0..st.callbacks.slot_count() {
            if let Some(handler) = st.callbacks.handler_at(idx, events) {
                events = handler.event(dev, &mut *st, events, now);
            }
        }
        events
    }

    /// Deliver an external interruption to a thread waiting in
    /// [`send`](Conn::send).
    ///
    /// The wait returns without handler involvement and the send fails with
    /// [`Error::Interrupted`](crate::Error::Interrupted); teardown of the
    /// registration still happens on the sending thread. A no-op when no
    /// send is in flight.
    pub fn interrupt(&self) {
        let st = self.state();
        if let Some(txn) = &st.txn {
            txn.wake.interrupt();
        }
    }
}
