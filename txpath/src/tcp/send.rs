//! The unbuffered send: control block, poll-context handler, blocking entry
//! point.
//!
//! No data is ever queued. The caller's buffer is the retransmission buffer;
//! what the peer has not acknowledged yet is simply read again from it. The
//! price is that the whole operation must complete within one `send` call,
//! with the calling thread parked while the poll context works through the
//! buffer segment by segment.
use std::sync::Arc;

use super::conn::{ArpPolicy, Conn, SockState, State};
use super::event::{CallbackList, CbHandle, Events, TcpEvent};
use crate::iface::Netif;
use crate::nic::Device;
use crate::sync::{Cause, Signal};
use crate::time::Instant;
use crate::wire::SeqNumber;
use crate::{Error, Result};

/// The event mask an unbuffered send arms its registration with.
const SEND_EVENTS: Events = Events::ACK
    .union(Events::RETRANSMIT)
    .union(Events::POLL)
    .union(Events::CLOSE)
    .union(Events::ABORT)
    .union(Events::TIMEOUT);

/// The events that mean the connection is gone.
const LOSS_EVENTS: Events = Events::CLOSE.union(Events::ABORT).union(Events::TIMEOUT);

/// View of the sending caller's buffer.
#[derive(Clone, Copy)]
struct BufView {
    ptr: *const u8,
    len: usize,
}

// SAFETY: the view is only dereferenced by the poll-context handler, under
// the connection lock, while the registration is armed. The entry point does
// not return before revoking the registration, and the caller's borrow
// outlives the call.
unsafe impl Send for BufView {}

impl BufView {
    fn new(buf: &[u8]) -> Self {
        BufView { ptr: buf.as_ptr(), len: buf.len() }
    }

    /// The `len` bytes starting at offset `at`.
    ///
    /// Unsafe: see the `Send` impl for the conditions under which the
    /// underlying buffer is alive.
    unsafe fn slice(&self, at: usize, len: usize) -> &[u8] {
        debug_assert!(at + len <= self.len);
        core::slice::from_raw_parts(self.ptr.add(at), len)
    }
}

/// The send control block.
///
/// Holds the state of one send operation while it is operated upon from the
/// poll context. Owned by the entry point for the duration of one call and
/// parked in the connection's transaction slot while the registration is
/// armed; `sent`, `acked`, `time`, `odd` and `result` belong to the handler
/// until the wake signal fires.
pub(crate) struct Unbuffered {
    /// The armed callback registration; released exactly once, by the entry
    /// point.
    pub(crate) cb: CbHandle,
    /// Wakes the waiting thread, exactly once.
    pub(crate) wake: Arc<Signal>,
    buf: BufView,
    /// Number of bytes to send.
    pub(crate) buflen: usize,
    /// Bytes handed to the device so far (not necessarily acknowledged).
    pub(crate) sent: usize,
    /// Bytes confirmed by the peer.
    pub(crate) acked: usize,
    /// Sequence number of byte 0 of the buffer.
    pub(crate) isn: SeqNumber,
    /// Last acknowledgment activity, for the cooperative send timeout.
    pub(crate) time: Instant,
    /// True on the odd segment of a pairing transaction.
    pub(crate) odd: bool,
    /// Outcome of the send, written once by the handler.
    pub(crate) result: Option<Result<usize>>,
}

/// The poll-context event handler of an unbuffered send.
struct SendHandler;

impl TcpEvent for SendHandler {
    fn event(&self, dev: &mut dyn Device, st: &mut State, events: Events, now: Instant) -> Events {
        let State {
            txn,
            sndseq,
            unacked,
            window,
            mss,
            ackno,
            remote,
            connected,
            callbacks,
            split,
            arp,
            send_timeout,
            netif,
            ..
        } = st;

        // The registration is stripped or released before the transaction is
        // dismantled; a poll that reaches us without one has nothing to do.
        let txn = match txn {
            Some(txn) => txn,
            None => return events,
        };

        net_trace!("tx {}: acked {} sent {}", events, txn.acked, txn.sent);

        if events.contains(Events::ACK) {
            txn.time = now;

            // The acknowledgment number is the circular offset of the next
            // byte the peer expects; relative to the isn it counts the bytes
            // of this buffer the peer has confirmed.
            txn.acked = ackno.offset_from(txn.isn) as usize;
            net_trace!("tx ack: acked {} sent {} of {}", txn.acked, txn.sent, txn.buflen);

            if txn.acked >= txn.buflen {
                // Everything requested is confirmed.
                txn.result = Some(Ok(txn.sent));
                return finish(txn, callbacks, unacked, events);
            }

            // Fall through to send more data if necessary.
        } else if events.contains(Events::RETRANSMIT) {
            // Rewind to the last confirmed byte; the pairing transaction
            // restarts on its even half.
            txn.sent = txn.acked;
            txn.odd = false;
        } else if events.intersects(LOSS_EVENTS) {
            net_debug!("tx: connection lost ({})", events);
            *connected = false;
            txn.result = Some(Err(Error::NotConnected));
            return finish(txn, callbacks, unacked, events);
        }

        // Incoming data owns the device buffer this cycle; sending waits for
        // the next one.
        if !events.contains(Events::DATA) && txn.sent < txn.buflen {
            let mut sndlen = txn.buflen - txn.sent;

            if let Some(threshold) = *split {
                // RFC 1122 lets the peer delay its ACK up to 500ms, but it
                // must answer every second segment. Splitting an otherwise
                // final segment into a non-trivial pair provokes the answer
                // sooner. Never split below the threshold; only the first
                // even and the last odd segment can be that small.
                if sndlen >= threshold {
                    let next = sndlen as isize - *mss as isize;
                    if !txn.odd {
                        // The whole remainder would fit in this one segment;
                        // this is the case that must split.
                        if next <= 0 {
                            sndlen = sndlen / 2 + 1;
                        }
                    } else if next > 0 && next < *mss as isize {
                        // The next even segment would come out undersized;
                        // split now so it does not.
                        sndlen /= 2;
                    }
                }
                txn.odd = !txn.odd;
            }

            if sndlen > *mss {
                sndlen = *mss;
            }

            // Never fill the peer's window exactly; the accounting in the
            // rest of the stack needs the headroom.
            if txn.sent.wrapping_sub(txn.acked).wrapping_add(sndlen) < *window as usize {
                // The receive path moves the cursor on every ACK; while an
                // unbuffered send is in flight this path owns it.
                *sndseq = txn.isn + txn.sent;
                net_trace!("tx seg: seq {} len {}", sndseq, sndlen);

                // SAFETY: invoked through the armed registration, connection
                // lock held.
                let payload = unsafe { txn.buf.slice(txn.sent, sndlen) };
                dev.stage(payload);

                // Count the bytes only if they can reach the peer. The cache
                // lookup may be expensive, so only the first segment pays for
                // it; a later segment implies the first already went through.
                let advance = match arp {
                    ArpPolicy::CheckFirst => txn.sent != 0 || netif.has_neighbor(*remote),
                    ArpPolicy::Probe | ArpPolicy::Trusted => true,
                };
                if advance {
                    txn.sent += sndlen;
                    net_trace!("tx seg: acked {} sent {} of {}", txn.acked, txn.sent, txn.buflen);
                }
            }
        }

        if let Some(timeout) = *send_timeout {
            // All data is staged and the send is only waiting on ACKs or
            // retransmission requests now.
            if txn.sent >= txn.buflen && now.duration_since(txn.time) >= timeout {
                net_debug!("tx: send timeout");
                txn.result = Some(Err(Error::TimedOut));
                return finish(txn, callbacks, unacked, events);
            }
        }

        // Keep waiting; the driver polls again later.
        events
    }
}

/// Terminate the wait.
///
/// The order is load-bearing: stripping the registration first guarantees no
/// further invocation, which in turn is what makes posting the wake signal a
/// one-time event.
fn finish(
    txn: &mut Unbuffered,
    callbacks: &mut CallbackList,
    unacked: &mut u32,
    events: Events,
) -> Events {
    debug_assert!(txn.result.is_some());

    callbacks.strip(txn.cb);

    // There are no outstanding, unacknowledged bytes anymore.
    *unacked = 0;

    txn.wake.post();
    events
}

impl Conn {
    /// Send `buf` on this connection, blocking until the peer has
    /// acknowledged all of it.
    ///
    /// The buffer is not copied anywhere: segments are staged to the device
    /// straight out of it, and retransmissions re-read it. The calling thread
    /// parks on a wake signal — the single suspension point of the transmit
    /// path — while the poll context works through the buffer.
    ///
    /// Returns the number of bytes sent, which on success equals
    /// `buf.len()`. There is no partial success: a send that fails reports
    /// no byte count, whatever the peer actually received.
    ///
    /// ## Errors
    ///
    /// - [`Error::NotConnected`]: not a connected stream, or the connection
    ///   was lost mid-send.
    /// - [`Error::Unreachable`]: the up-front resolution probe failed
    ///   (policy [`ArpPolicy::Probe`] only).
    /// - [`Error::Exhausted`]: no free callback registration slot.
    /// - [`Error::TimedOut`]: the configured send timeout elapsed without
    ///   acknowledgment activity.
    /// - [`Error::Interrupted`]: the wait was unblocked by
    ///   [`interrupt`](Conn::interrupt) instead of by completion.
    /// - [`Error::Illegal`]: an unbuffered send is already in flight on this
    ///   connection.
    pub fn send(&self, buf: &[u8]) -> Result<usize> {
        let (netif, remote, probe) = {
            let st = self.state();
            if !st.connected {
                return Err(Error::NotConnected);
            }
            (st.netif.clone(), st.remote, st.arp == ArpPolicy::Probe)
        };

        // Make sure the link-layer mapping exists before staging anything.
        // This may block on the resolution exchange, so no lock is held.
        if probe {
            netif.probe_neighbor(remote).map_err(|_| Error::Unreachable)?;
        }

        let wake = Arc::new(Signal::new());
        let cb;
        {
            let mut st = self.state();

            if st.txn.is_some() {
                // One unbuffered send at a time per connection.
                return Err(Error::Illegal);
            }

            // Observable to anyone querying the socket from here on.
            st.socket = SockState::Sending;

            if buf.is_empty() {
                // Nothing to transmit; straight to teardown.
                st.socket = SockState::Idle;
                return Ok(0);
            }

            cb = match st.callbacks.alloc(SEND_EVENTS, Arc::new(SendHandler)) {
                Some(cb) => cb,
                None => {
                    st.socket = SockState::Idle;
                    return Err(Error::Exhausted);
                }
            };

            // There is no outstanding, unacknowledged data before this
            // initial sequence number.
            let isn = st.sndseq;
            st.unacked = 0;

            st.txn = Some(Unbuffered {
                cb,
                wake: wake.clone(),
                buf: BufView::new(buf),
                buflen: buf.len(),
                sent: 0,
                acked: 0,
                isn,
                time: netif.now(),
                odd: false,
                result: None,
            });
        }

        // The registration is fully armed; tell the driver there is data.
        netif.tx_notify(remote);

        // The single suspension point of the whole path.
        let cause = wake.wait();

        let result = {
            let mut st = self.state();
            // The handler already stripped the registration on the completed
            // paths; releasing again covers the interrupted one. Release is
            // idempotent either way.
            st.callbacks.release(cb);
            let result = st.txn.take().and_then(|txn| txn.result);
            st.socket = SockState::Idle;
            result
        };

        match (result, cause) {
            (Some(Err(err)), _) => Err(err),
            (_, Cause::Interrupted) => Err(Error::Interrupted),
            (Some(Ok(sent)), Cause::Posted) => Ok(sent),
            // The handler records a result before it ever posts.
            (None, Cause::Posted) => Ok(0),
        }
    }
}
