//! Simulation time: nanoseconds since a fixed epoch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// A span of simulated time in nanoseconds.
pub type Nanos = i64;

/// A point in simulated time, in nanoseconds since a fixed epoch.
///
/// Negative values are the "invalid" sentinel: a timestamp that has not yet
/// been learned (e.g. market hours before the exchange has answered).
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Sentinel for "not yet known".
    pub const INVALID: Timestamp = Timestamp(-1);

    /// The epoch itself. Also the `set_wakeup` sentinel for "next possible time".
    pub const ZERO: Timestamp = Timestamp(0);

    /// Nanoseconds since the epoch.
    #[inline]
    pub fn nanos(self) -> i64 {
        self.0
    }

    /// A valid timestamp is non-negative.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }

    /// Maximum of two timestamps.
    #[inline]
    pub fn max(self, other: Self) -> Self {
        Timestamp(self.0.max(other.0))
    }
}

impl Add<Nanos> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Nanos) -> Timestamp {
        Timestamp(self.0 + rhs)
    }
}

impl AddAssign<Nanos> for Timestamp {
    fn add_assign(&mut self, rhs: Nanos) {
        self.0 += rhs;
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = Nanos;

    /// Elapsed nanoseconds between two timestamps.
    fn sub(self, rhs: Timestamp) -> Nanos {
        self.0 - rhs.0
    }
}

impl Sub<Nanos> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Nanos) -> Timestamp {
        Timestamp(self.0 - rhs)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}ns", self.0)
        } else {
            write!(f, "invalid")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_sentinel() {
        assert!(!Timestamp::INVALID.is_valid());
        assert!(Timestamp::ZERO.is_valid());
        assert!(Timestamp(1_000_000_000).is_valid());
    }

    #[test]
    fn test_ordering() {
        assert!(Timestamp(100) < Timestamp(200));
        assert!(Timestamp::INVALID < Timestamp::ZERO);
    }

    #[test]
    fn test_arithmetic() {
        let t = Timestamp(1_000);
        assert_eq!(t + 500, Timestamp(1_500));
        assert_eq!(Timestamp(1_500) - t, 500);

        let mut t = Timestamp(0);
        t += 42;
        assert_eq!(t, Timestamp(42));
    }
}
