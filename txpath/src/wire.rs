//! Wire-level types reused by the transmit path.
//!
//! This core introduces no packet format of its own; the only wire concept it
//! manipulates is the TCP sequence number space, which is circular. All
//! arithmetic here is modulo 2<sup>32</sup> on purpose — "has everything been
//! acknowledged" can only be answered with wraparound-aware comparisons.
use core::{cmp, fmt, ops};

/// A TCP sequence number.
///
/// A sequence number is a monotonically advancing integer modulo
/// 2<sup>32</sup>. Sequence numbers do not have a discontiguity when compared
/// pairwise across a signed overflow.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Hash)]
pub struct SeqNumber(pub i32);

impl SeqNumber {
    /// The number of sequence steps from `earlier` to `self`, modulo
    /// 2<sup>32</sup>.
    ///
    /// This is the raw circular distance: an `earlier` that is actually ahead
    /// of `self` yields a value close to the top of the sequence space, not
    /// an error. The acknowledged-byte computation relies on exactly this.
    pub fn offset_from(self, earlier: SeqNumber) -> u32 {
        self.0.wrapping_sub(earlier.0) as u32
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0 as u32)
    }
}

impl ops::Add<usize> for SeqNumber {
    type Output = SeqNumber;

    fn add(self, rhs: usize) -> SeqNumber {
        if rhs > i32::MAX as usize {
            panic!("attempt to add to sequence number with unsigned overflow")
        }
        SeqNumber(self.0.wrapping_add(rhs as i32))
    }
}

impl ops::AddAssign<usize> for SeqNumber {
    fn add_assign(&mut self, rhs: usize) {
        *self = *self + rhs;
    }
}

impl ops::Sub<usize> for SeqNumber {
    type Output = SeqNumber;

    fn sub(self, rhs: usize) -> SeqNumber {
        if rhs > i32::MAX as usize {
            panic!("attempt to subtract from sequence number with unsigned overflow")
        }
        SeqNumber(self.0.wrapping_sub(rhs as i32))
    }
}

impl cmp::PartialOrd for SeqNumber {
    fn partial_cmp(&self, other: &SeqNumber) -> Option<cmp::Ordering> {
        self.0.wrapping_sub(other.0).partial_cmp(&0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_and_compare() {
        let isn = SeqNumber(1000);
        assert_eq!(isn + 200, SeqNumber(1200));
        assert!(isn + 200 > isn);
        assert_eq!((isn + 200) - 200, isn);
    }

    #[test]
    fn offsets_are_circular() {
        let isn = SeqNumber(1000);
        assert_eq!((isn + 200).offset_from(isn), 200);

        // Across the unsigned wrap.
        let high = SeqNumber(-3); // 0xffff_fffd
        assert_eq!((high + 10).offset_from(high), 10);
        assert_eq!(SeqNumber(7).offset_from(high), 10);

        // Across the signed wrap.
        let mid = SeqNumber(i32::MAX);
        assert_eq!((mid + 5).offset_from(mid), 5);
        assert!(mid + 5 > mid);
    }

    #[test]
    fn backwards_offset_wraps() {
        let isn = SeqNumber(100);
        // A stale acknowledgment below the isn is a huge circular distance,
        // not a negative one.
        assert_eq!(SeqNumber(99).offset_from(isn), u32::MAX);
    }
}
