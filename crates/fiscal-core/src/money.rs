//! # Money
//!
//! Amounts are whole cents in an `i64`. Rounding happens in exactly one
//! place, [`Money::apply_rate`], once per line amount; every total above a
//! line is an exact integer sum.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  unit price × quantity − discount ──► base          (exact)            │
//! │  base × VAT rate                  ──► vat           (rounded once)     │
//! │  base × retention rate            ──► retention     (rounded once)     │
//! │  base + vat − retention           ──► line total    (exact)            │
//! │  Σ line totals                    ──► net total     (exact)            │
//! │  net total − receipts − advances  ──► outstanding   (exact)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ```rust
//! use fiscal_core::money::Money;
//! use fiscal_core::types::Rate;
//!
//! let base = Money::from_cents(100_000);
//! assert_eq!(base.apply_rate(Rate::from_bps(1400)).to_string(), "140.00");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use crate::types::Rate;

/// A signed amount in cents. Single currency, so no currency tag.
///
/// Signed because intermediate differences (total minus paid) can dip
/// below zero before [`Money::non_negative`] floors them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// `max(self, 0)`.
    ///
    /// ```rust
    /// use fiscal_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(-40).non_negative(), Money::zero());
    /// ```
    #[inline]
    pub const fn non_negative(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// `self × rate`, rounded half away from zero to the cent.
    ///
    /// ```rust
    /// use fiscal_core::money::Money;
    /// use fiscal_core::types::Rate;
    ///
    /// // 10.00 at 8.25% = 0.825 → 0.83
    /// assert_eq!(Money::from_cents(1000).apply_rate(Rate::from_bps(825)).cents(), 83);
    /// ```
    pub fn apply_rate(&self, rate: Rate) -> Money {
        let scaled = self.0.unsigned_abs() as i128 * rate.bps() as i128;
        let rounded = ((scaled + 5_000) / 10_000) as i64;
        Money(if self.0 < 0 { -rounded } else { rounded })
    }

    /// Price of `quantity` units.
    #[inline]
    pub const fn times(&self, quantity: i64) -> Self {
        Money(self.0 * quantity)
    }
}

/// Two decimals, no currency symbol: `1140.00`, `-5.50`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.0.unsigned_abs();
        if self.0 < 0 {
            f.write_str("-")?;
        }
        write!(f, "{}.{:02}", magnitude / 100, magnitude % 100)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Money;

    fn mul(self, quantity: i64) -> Money {
        self.times(quantity)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        Money(iter.map(|m| m.0).sum())
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}
