//! # Line Tax Calculator
//!
//! Computes taxable base, VAT, retention and total for one line, and sums
//! lines into document totals.
//!
//! ## Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  base      = max(quantity × unit_price − discount, 0)                   │
//! │  vat       = vat_applicable ? round(base × vat_rate)        : 0         │
//! │  retention = is_service     ? round(base × retention_rate)  : 0         │
//! │  total     = base + vat − retention                                     │
//! │                                                                         │
//! │  round = half away from zero, to the cent (Money::apply_rate)           │
//! │  Document totals are exact sums of line values, never re-rounded.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::AddAssign;

use crate::money::Money;
use crate::types::Rate;

/// Resolved inputs for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxableLine {
    pub quantity: i64,
    pub unit_price: Money,
    pub discount: Money,
    pub vat_applicable: bool,
    pub vat_rate: Rate,
    pub is_service: bool,
    pub retention_rate: Rate,
}

/// Computed amounts for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LineAmounts {
    pub base: Money,
    pub vat: Money,
    pub retention: Money,
    pub total: Money,
}

/// Computes the amounts of a single line.
///
/// ## Example
/// ```rust
/// use fiscal_core::money::Money;
/// use fiscal_core::tax::{compute_line, TaxableLine};
/// use fiscal_core::types::Rate;
///
/// let amounts = compute_line(&TaxableLine {
///     quantity: 1,
///     unit_price: Money::from_cents(100_000),
///     discount: Money::zero(),
///     vat_applicable: true,
///     vat_rate: Rate::from_bps(1400),
///     is_service: true,
///     retention_rate: Rate::from_bps(650),
/// });
/// assert_eq!(amounts.vat.cents(), 14_000);
/// assert_eq!(amounts.retention.cents(), 6_500);
/// assert_eq!(amounts.total.cents(), 107_500);
/// ```
pub fn compute_line(line: &TaxableLine) -> LineAmounts {
    let gross = line.unit_price.times(line.quantity);
    let base = (gross - line.discount).non_negative();

    let vat = if line.vat_applicable {
        base.apply_rate(line.vat_rate)
    } else {
        Money::zero()
    };

    let retention = if line.is_service {
        base.apply_rate(line.retention_rate)
    } else {
        Money::zero()
    };

    LineAmounts {
        base,
        vat,
        retention,
        total: base + vat - retention,
    }
}

// =============================================================================
// Document Totals
// =============================================================================

/// Exact sums of line amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub taxable_base: Money,
    pub vat: Money,
    pub retention: Money,
    pub net_total: Money,
}

impl AddAssign<&LineAmounts> for DocumentTotals {
    fn add_assign(&mut self, line: &LineAmounts) {
        self.taxable_base += line.base;
        self.vat += line.vat;
        self.retention += line.retention;
        self.net_total += line.total;
    }
}

impl<'a> Sum<&'a LineAmounts> for DocumentTotals {
    fn sum<I: Iterator<Item = &'a LineAmounts>>(iter: I) -> Self {
        iter.fold(DocumentTotals::default(), |mut acc, line| {
            acc += line;
            acc
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn goods(quantity: i64, unit_cents: i64, vat_bps: u32) -> TaxableLine {
        TaxableLine {
            quantity,
            unit_price: Money::from_cents(unit_cents),
            discount: Money::zero(),
            vat_applicable: true,
            vat_rate: Rate::from_bps(vat_bps),
            is_service: false,
            retention_rate: Rate::from_bps(650),
        }
    }

    #[test]
    fn test_goods_line_with_vat() {
        let amounts = compute_line(&goods(1, 100_000, 1400));
        assert_eq!(amounts.base.cents(), 100_000);
        assert_eq!(amounts.vat.cents(), 14_000);
        assert_eq!(amounts.retention, Money::zero());
        assert_eq!(amounts.total.cents(), 114_000);
    }

    #[test]
    fn test_service_line_with_retention() {
        let line = TaxableLine {
            is_service: true,
            ..goods(1, 100_000, 1400)
        };
        let amounts = compute_line(&line);
        assert_eq!(amounts.retention.cents(), 6_500);
        assert_eq!(amounts.total.cents(), 107_500);
    }

    #[test]
    fn test_discount_larger_than_gross_floors_base() {
        let line = TaxableLine {
            discount: Money::from_cents(5_000),
            ..goods(2, 1_000, 1400)
        };
        let amounts = compute_line(&line);
        assert_eq!(amounts.base, Money::zero());
        assert_eq!(amounts.total, Money::zero());
    }

    #[test]
    fn test_vat_exempt_line() {
        let line = TaxableLine {
            vat_applicable: false,
            ..goods(3, 333, 1400)
        };
        let amounts = compute_line(&line);
        assert_eq!(amounts.vat, Money::zero());
        assert_eq!(amounts.total.cents(), 999);
    }

    #[test]
    fn test_totals_are_exact_sums() {
        let lines = [
            compute_line(&goods(1, 333, 1400)),
            compute_line(&goods(1, 333, 1400)),
            compute_line(&goods(1, 333, 1400)),
        ];
        let totals: DocumentTotals = lines.iter().sum();
        // 3.33 at 14% = 0.4662 → 0.47 per line, not round(9.99 × 14%) = 1.40
        assert_eq!(totals.vat.cents(), 141);
        assert_eq!(totals.net_total.cents(), 999 + 141);
    }

    proptest! {
        #[test]
        fn prop_net_total_equals_sum_of_line_totals(
            specs in prop::collection::vec(
                (1i64..1_000, 0i64..1_000_000, 0i64..50_000, 0u32..=10_000, any::<bool>(), 0u32..=10_000),
                1..20,
            )
        ) {
            let lines: Vec<LineAmounts> = specs
                .iter()
                .map(|&(qty, price, discount, vat, service, retention)| {
                    compute_line(&TaxableLine {
                        quantity: qty,
                        unit_price: Money::from_cents(price),
                        discount: Money::from_cents(discount),
                        vat_applicable: true,
                        vat_rate: Rate::from_bps(vat),
                        is_service: service,
                        retention_rate: Rate::from_bps(retention),
                    })
                })
                .collect();
            let totals: DocumentTotals = lines.iter().sum();
            let sum: Money = lines.iter().map(|l| l.total).sum();
            prop_assert_eq!(totals.net_total, sum);
            prop_assert_eq!(totals.net_total, totals.taxable_base + totals.vat - totals.retention);
        }

        #[test]
        fn prop_base_never_negative(qty in 1i64..1_000, price in 0i64..100_000, discount in 0i64..10_000_000) {
            let amounts = compute_line(&TaxableLine {
                discount: Money::from_cents(discount),
                ..goods(qty, price, 1400)
            });
            prop_assert!(!amounts.base.is_negative());
        }
    }
}
