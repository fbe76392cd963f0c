//! Fixed-point monetary types.
//!
//! Prices and cash balances are integer cents throughout the simulator, and
//! quantities are whole shares. Sticking to integer arithmetic keeps runs
//! bit-for-bit reproducible across platforms; floats only appear at the
//! display and statistics boundary.

use derive_more::{Add, AddAssign, From, Into, Neg, Sub, SubAssign, Sum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Mul;

/// Cents per dollar, for display and float conversion.
pub const CENTS_PER_DOLLAR: i64 = 100;

fn fmt_cents(cents: i64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
        f,
        "${}.{:02}",
        cents / CENTS_PER_DOLLAR,
        (cents % CENTS_PER_DOLLAR).abs()
    )
}

// =============================================================================
// Quantity (shares)
// =============================================================================

/// A number of shares.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[derive(Add, Sub, AddAssign, SubAssign, Sum, From, Into)]
pub struct Quantity(pub u64);

impl Quantity {
    pub const ZERO: Quantity = Quantity(0);

    /// Raw share count.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Subtraction clamped at zero.
    #[inline]
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Quantity(self.0.saturating_sub(rhs.0))
    }

    /// The smaller of two quantities.
    #[inline]
    pub fn min(self, other: Self) -> Self {
        Quantity(self.0.min(other.0))
    }
}

impl fmt::Debug for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Qty({})", self.0)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// Lets tests and assertions write `quantity == 50`.
impl PartialEq<u64> for Quantity {
    fn eq(&self, other: &u64) -> bool {
        self.0 == *other
    }
}

// =============================================================================
// Price and Cash (cents)
// =============================================================================

/// A quoted price in integer cents: `Price(10_000)` is $100.00.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[derive(Add, Sub, Neg, AddAssign, SubAssign, From, Into)]
pub struct Price(pub i64);

/// An account balance in integer cents. Semantically the same scale as
/// [`Price`] but represents money held rather than a quote.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[derive(Add, Sub, Neg, AddAssign, SubAssign, From, Into)]
pub struct Cash(pub i64);

macro_rules! cents_newtype {
    ($name:ident) => {
        impl $name {
            pub const ZERO: $name = $name(0);

            /// Convert from a dollar amount, rounding to the nearest cent.
            #[inline]
            pub fn from_float(dollars: f64) -> Self {
                Self((dollars * CENTS_PER_DOLLAR as f64).round() as i64)
            }

            /// Convert to dollars for display and statistics.
            #[inline]
            pub fn to_float(self) -> f64 {
                self.0 as f64 / CENTS_PER_DOLLAR as f64
            }

            /// Raw cents.
            #[inline]
            pub fn raw(self) -> i64 {
                self.0
            }

            #[inline]
            pub fn is_positive(self) -> bool {
                self.0 > 0
            }

            #[inline]
            pub fn is_negative(self) -> bool {
                self.0 < 0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt_cents(self.0, f)
            }
        }
    };
}

cents_newtype!(Price);
cents_newtype!(Cash);

// =============================================================================
// Cross-type arithmetic
// =============================================================================

impl Mul<Quantity> for Price {
    type Output = Cash;

    /// Notional value of `qty` shares at this price.
    fn mul(self, qty: Quantity) -> Cash {
        Cash(self.0 * qty.0 as i64)
    }
}

impl Mul<Price> for Quantity {
    type Output = Cash;

    fn mul(self, price: Price) -> Cash {
        Cash(price.0 * self.0 as i64)
    }
}
