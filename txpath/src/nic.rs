//! The device-facing side of the transmit path.
//!
//! A device in this crate is only the thing the event handler hands outgoing
//! payload to. The driver owns a single pending-output slot per poll cycle;
//! staging places the next segment's payload there, and the driver completes
//! the actual wire transmission asynchronously when its cycle ends. There is
//! no queue at this level — a segment that cannot be transmitted is simply
//! staged again on a later cycle, re-read from the caller's buffer.

/// A network device, reduced to its pending-output slot.
pub trait Device {
    /// Hand `payload` to the device's pending-output slot.
    ///
    /// The bytes come straight out of the sending caller's buffer; the device
    /// must consume or copy them before the poll cycle ends. Staging does not
    /// mean the payload reaches the wire: the driver may replace it, for
    /// example with a link-layer resolution request when the peer's hardware
    /// address is still unknown.
    fn stage(&mut self, payload: &[u8]);
}

/// A software device with a single pending-output slot.
///
/// The software analogue of a polled NIC, for tests, examples and loopback
/// arrangements: whatever the handler stages is held until the driver side
/// [`take`](SlotDevice::take)s it.
#[derive(Debug, Default)]
pub struct SlotDevice {
    staged: Option<Vec<u8>>,
}

impl SlotDevice {
    /// Create a device with an empty slot.
    pub fn new() -> Self {
        SlotDevice::default()
    }

    /// Whether a segment is currently staged.
    pub fn pending(&self) -> bool {
        self.staged.is_some()
    }

    /// Drain the pending-output slot.
    pub fn take(&mut self) -> Option<Vec<u8>> {
        self.staged.take()
    }
}

impl Device for SlotDevice {
    fn stage(&mut self, payload: &[u8]) {
        if self.staged.is_some() {
            net_debug!("slot device: staged segment overwritten before the driver drained it");
        }
        self.staged = Some(payload.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_and_drain() {
        let mut dev = SlotDevice::new();
        assert!(!dev.pending());

        dev.stage(b"abc");
        assert!(dev.pending());
        assert_eq!(dev.take().as_deref(), Some(&b"abc"[..]));
        assert_eq!(dev.take(), None);
    }

    #[test]
    fn restaging_overwrites() {
        let mut dev = SlotDevice::new();
        dev.stage(b"first");
        dev.stage(b"second");
        assert_eq!(dev.take().as_deref(), Some(&b"second"[..]));
    }
}
