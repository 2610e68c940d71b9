//! The unbuffered transmit path of an event-driven TCP stack.
//!
//! This library moves a caller-supplied byte buffer onto the wire segment by
//! segment, driven entirely by device poll events, with no intermediate copy
//! buffer. The stack never retains the data: each segment's payload is handed
//! to the device's pending-output slot straight out of the caller's buffer,
//! and retransmission re-reads the same buffer from the last acknowledged
//! offset. The price for bufferless operation is that the submitting thread
//! must stay around — it parks on a wake signal until the peer has
//! acknowledged every requested byte (or the send fails).
//!
//! ## Structure
//!
//! Two execution contexts cooperate on every send:
//!
//! * The *entry point* ([`tcp::Conn::send`]) runs at thread context. It
//!   validates the connection, arms a callback registration on it, notifies
//!   the driver that outbound data is pending and blocks. This is the single
//!   suspension point of the whole path.
//! * The *event handler* runs at poll context, invoked through
//!   [`tcp::Conn::dispatch`] on every device poll cycle. It decides whether
//!   to emit the next segment, rewind for a retransmission, detect completion
//!   or connection loss, and finally wakes the parked thread. It never blocks
//!   and never allocates.
//!
//! The per-send state lives in a control block owned by the entry point for
//! the duration of one call. Both contexts access it under the connection
//! lock, so the handler can never observe a partially armed send and the
//! entry point never reads handler-owned progress before the wake fired.
//!
//! Collaborators outside this core — the driver poll loop, the
//! address-resolution cache, the receive path that maintains the
//! acknowledgment number — are reached through the small trait seams in
//! [`nic`] and [`iface`]. Software implementations of both are included and
//! used by the tests and the `blocking_send` example.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

#[macro_use]
mod macros;

pub mod iface;
pub mod neighbor;
pub mod nic;
pub mod sync;
pub mod tcp;
pub mod time;
pub mod wire;

use core::fmt;

/// The result type of all fallible operations in this crate.
pub type Result<T> = core::result::Result<T, Error>;

/// The error cause of a failed send.
///
/// Every failure of the transmit path resolves to exactly one of these
/// values. The handler records its cause in the send control block; the entry
/// point translates it at the call boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Error {
    /// The operation was not permitted.
    ///
    /// Returned when the layer does not support the request, such as a second
    /// unbuffered send while one is already in flight on the connection.
    Illegal,

    /// The connection is not in a connected state, or was lost while the
    /// send was in flight.
    NotConnected,

    /// The peer's link-layer address could not be resolved.
    Unreachable,

    /// The action could not be completed because there were not enough
    /// resources.
    ///
    /// The only resource the transmit path allocates is a slot in the
    /// connection's callback registration table.
    Exhausted,

    /// The configured send timeout elapsed with data still unacknowledged.
    TimedOut,

    /// The waiting thread was unblocked by an external signal rather than by
    /// completion of the send.
    Interrupted,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Error::Illegal => "operation not permitted",
            Error::NotConnected => "not connected",
            Error::Unreachable => "peer not reachable",
            Error::Exhausted => "out of resources",
            Error::TimedOut => "send timed out",
            Error::Interrupted => "interrupted",
        };
        f.write_str(name)
    }
}

impl std::error::Error for Error {}
