//! The TCP transmit machinery.
//!
//! This layer owns the per-connection state the transmit path shares with
//! the rest of a stack, the event callback registry through which the driver
//! drives it, and the unbuffered send itself.
//!
//! ## Structure
//!
//! A [`Conn`] is a cloneable handle to one connection. All of its state sits
//! behind a single lock — the equivalent of the classic "disable network
//! interrupts" critical section: the driver's [`dispatch`](Conn::dispatch)
//! and the sending thread's setup both run under it, so an event handler can
//! never observe a half-initialized send.
//!
//! Unlike standard stacks, where stack state and user code must be assumed
//! to live in different protection domains, it poses no problem here to
//! expose the connection fields directly. The receive-path collaborator is
//! expected to update [`State::ackno`], [`State::window`] and
//! [`State::sndseq`] through the [`Conn::state`] guard before dispatching
//! the matching events.
//!
//! ## Sending
//!
//! [`Conn::send`] submits a borrowed buffer and parks the calling thread.
//! From there on everything happens at poll context: on each cycle the armed
//! event handler emits the next segment (window and pacing permitting),
//! rewinds on a retransmission request, and completes — or fails — the send
//! based solely on the peer's acknowledgment number. The waiting thread is
//! woken exactly once, after the handler has stripped its own registration.

mod conn;
mod event;
mod send;

pub use self::conn::{ArpPolicy, Config, Conn, SockState, State};
pub use self::event::{CallbackList, CbHandle, Events, TcpEvent};
