//! The wake primitive pairing the blocking entry point with the poll-context
//! handler.
//!
//! A [`Signal`] is a binary wait/signal object with an initial count of zero.
//! One thread parks on it; the poll context posts it exactly once when the
//! operation it guards has finished. An external interruption can unblock the
//! waiter without involving the poll context at all. Whichever cause arrives
//! first is latched and wins; a later post does not overwrite it, so the
//! waiter observes exactly one cause per wait.
use std::sync::{Condvar, Mutex, MutexGuard};

/// Why a wait on a [`Signal`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cause {
    /// The poll context completed the operation and posted the signal.
    Posted,
    /// The waiting thread was unblocked by an external interruption.
    Interrupted,
}

/// A binary wait/signal object, initial count zero.
#[derive(Debug, Default)]
pub struct Signal {
    state: Mutex<Option<Cause>>,
    cond: Condvar,
}

impl Signal {
    /// Create an unsignalled `Signal`.
    pub fn new() -> Self {
        Signal::default()
    }

    /// Post the signal from the poll context.
    ///
    /// Must happen at most once per wait. The completion path guarantees this
    /// by stripping its event registration before posting: with the
    /// registration gone there is no further invocation that could post
    /// again.
    pub fn post(&self) {
        let mut state = self.lock();
        debug_assert!(*state != Some(Cause::Posted), "signal posted twice");
        if state.is_none() {
            *state = Some(Cause::Posted);
        }
        self.cond.notify_one();
    }

    /// Unblock the waiter without completing the operation.
    ///
    /// Models an external signal delivered to the waiting thread. Lost if the
    /// signal was already posted: completion wins the race.
    pub fn interrupt(&self) {
        let mut state = self.lock();
        if state.is_none() {
            *state = Some(Cause::Interrupted);
        }
        self.cond.notify_one();
    }

    /// Block until the signal is posted or the wait is interrupted.
    pub fn wait(&self) -> Cause {
        let mut state = self.lock();
        loop {
            if let Some(cause) = *state {
                return cause;
            }
            state = match self.cond.wait(state) {
                Ok(guard) => guard,
                Err(poison) => poison.into_inner(),
            };
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Cause>> {
        // A poisoned lock still holds a consistent Option; keep going.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poison) => poison.into_inner(),
        }
    }

    #[cfg(test)]
    pub(crate) fn peek(&self) -> Option<Cause> {
        *self.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn post_then_wait() {
        let signal = Signal::new();
        signal.post();
        assert_eq!(signal.wait(), Cause::Posted);
    }

    #[test]
    fn first_cause_wins() {
        let signal = Signal::new();
        signal.interrupt();
        signal.post();
        assert_eq!(signal.wait(), Cause::Interrupted);
        assert_eq!(signal.peek(), Some(Cause::Interrupted));
    }

    #[test]
    fn interrupt_lost_after_post() {
        let signal = Signal::new();
        signal.post();
        signal.interrupt();
        assert_eq!(signal.wait(), Cause::Posted);
    }

    #[test]
    fn wakes_parked_thread() {
        let signal = Arc::new(Signal::new());
        let waiter = {
            let signal = signal.clone();
            thread::spawn(move || signal.wait())
        };
        // Give the waiter a chance to actually park.
        thread::sleep(std::time::Duration::from_millis(10));
        signal.post();
        assert_eq!(waiter.join().unwrap(), Cause::Posted);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "signal posted twice")]
    fn double_post_is_a_bug() {
        let signal = Signal::new();
        signal.post();
        signal.post();
    }
}
