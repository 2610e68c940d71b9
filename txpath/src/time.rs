/*! Time structures.

The `time` module contains structures used to represent both absolute and
relative time, plus the small helpers the cooperative send timeout is built
from.

 - [Instant] is used to represent absolute time.
 - [Duration] is used to represent relative time.

[Instant]: struct.Instant.html
[Duration]: struct.Duration.html
*/
use core::{cmp, fmt, ops};
pub use core::time::Duration;

/// A representation of an absolute time value.
///
/// The `Instant` type is a wrapper around an `i64` value that represents a
/// number of milliseconds, monotonically increasing since an arbitrary moment
/// in time, such as system startup.
///
/// * A value of `0` is inherently arbitrary.
/// * A value less than `0` indicates a time before the starting point.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instant {
    /// Milliseconds since the starting point.
    pub millis: i64,
}

/// An expiration time, inversion of `Option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// Expires at a definite point in time.
    When(Instant),
    /// Never expires.
    Never,
}

use self::Expiration::{Never, When};

impl Instant {
    /// Create a new `Instant` from a number of milliseconds.
    pub fn from_millis<T: Into<i64>>(millis: T) -> Instant {
        Instant { millis: millis.into() }
    }

    /// Create a new `Instant` from a number of seconds.
    pub fn from_secs<T: Into<i64>>(secs: T) -> Instant {
        Instant { millis: secs.into() * 1000 }
    }

    /// The current instant of the process-wide monotonic clock.
    ///
    /// The starting point is the first observation of the clock, so early
    /// values are small but never negative.
    pub fn now() -> Instant {
        use std::sync::OnceLock;
        static EPOCH: OnceLock<std::time::Instant> = OnceLock::new();
        let epoch = *EPOCH.get_or_init(std::time::Instant::now);
        Instant::from_millis(epoch.elapsed().as_millis() as i64)
    }

    /// The fractional number of milliseconds that have passed since the
    /// beginning of time.
    pub fn millis(&self) -> i64 {
        self.millis % 1000
    }

    /// The number of whole seconds that have passed since the beginning of
    /// time.
    pub fn secs(&self) -> i64 {
        self.millis / 1000
    }

    /// The total number of milliseconds that have passed since the beginning
    /// of time.
    pub fn total_millis(&self) -> i64 {
        self.millis
    }

    /// Time elapsed from `earlier` to `self`.
    ///
    /// Zero if `earlier` is not actually earlier; elapsed time never runs
    /// backwards.
    pub fn duration_since(self, earlier: Instant) -> Duration {
        Duration::from_millis(self.millis.saturating_sub(earlier.millis).max(0) as u64)
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}s", self.secs(), self.millis())
    }
}

impl ops::Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        Instant::from_millis(self.millis + rhs.as_millis() as i64)
    }
}

impl ops::AddAssign<Duration> for Instant {
    fn add_assign(&mut self, rhs: Duration) {
        self.millis += rhs.as_millis() as i64;
    }
}

impl ops::Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, rhs: Duration) -> Instant {
        Instant::from_millis(self.millis - rhs.as_millis() as i64)
    }
}

impl ops::SubAssign<Duration> for Instant {
    fn sub_assign(&mut self, rhs: Duration) {
        self.millis -= rhs.as_millis() as i64;
    }
}

impl ops::Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Duration {
        self.duration_since(rhs)
    }
}

impl Default for Expiration {
    fn default() -> Self {
        Expiration::Never
    }
}

impl From<Option<Instant>> for Expiration {
    fn from(opt: Option<Instant>) -> Self {
        match opt {
            Some(instant) => When(instant),
            None => Never,
        }
    }
}

impl From<Expiration> for Option<Instant> {
    fn from(opt: Expiration) -> Self {
        match opt {
            When(instant) => Some(instant),
            Never => None,
        }
    }
}

impl cmp::PartialOrd<Self> for Expiration {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl cmp::Ord for Expiration {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        match (*self, *other) {
            (Never, Never) => cmp::Ordering::Equal,
            (Never, When(_)) => cmp::Ordering::Greater,
            (When(_), Never) => cmp::Ordering::Less,
            (When(ref a), When(ref b)) => a.cmp(b),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn instant_ops() {
        assert_eq!(Instant::from_millis(4) + Duration::from_millis(6), Instant::from_millis(10));
        assert_eq!(Instant::from_millis(7) - Duration::from_millis(5), Instant::from_millis(2));
    }

    #[test]
    fn instant_getters() {
        let instant = Instant::from_millis(5674);
        assert_eq!(instant.secs(), 5);
        assert_eq!(instant.millis(), 674);
        assert_eq!(instant.total_millis(), 5674);
    }

    #[test]
    fn instant_display() {
        assert_eq!(format!("{}", Instant::from_millis(5674)), "5.674s");
        assert_eq!(format!("{}", Instant::from_millis(5000)), "5.0s");
    }

    #[test]
    fn elapsed_time() {
        let start = Instant::from_millis(1000);
        assert_eq!(Instant::from_millis(1500).duration_since(start), Duration::from_millis(500));
        // Never negative, even with a confused clock.
        assert_eq!(Instant::from_millis(500).duration_since(start), Duration::from_millis(0));
    }

    #[test]
    fn expiration_order() {
        let early = Expiration::When(Instant::from_millis(1));
        let late = Expiration::When(Instant::from_millis(2));
        assert!(early < late);
        assert!(late < Expiration::Never);
        assert_eq!(Expiration::default(), Expiration::Never);
    }

    #[test]
    fn monotonic_now() {
        let a = Instant::now();
        let b = Instant::now();
        assert!(a.millis >= 0);
        assert!(b >= a);
    }
}
