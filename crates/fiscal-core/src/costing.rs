//! # Weighted-Average Costing
//!
//! Pure arithmetic of the inventory costing engine. The engine crate loads
//! the product, calls [`apply_movement`], and persists the result together
//! with a ledger entry.
//!
//! ## Weighted Average
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  IN with unit cost:                                                     │
//! │    new_avg = (old_qty × old_avg + in_qty × unit_cost)                   │
//! │              ─────────────────────────────────────────                  │
//! │                     max(1, old_qty + in_qty)                            │
//! │                                                                         │
//! │    5 @ 80.00 + 10 @ 100.00  →  15 @ 93.33                               │
//! │                                                                         │
//! │  IN without unit cost: quantity changes, average stays                 │
//! │  OUT: quantity decreases, average stays; never below zero              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::StockDirection;

/// Quantity and average unit cost of one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPosition {
    pub quantity: i64,
    pub average_cost: Money,
}

/// Applies one movement to a position.
///
/// `product` is only used for the error message.
///
/// ## Example
/// ```rust
/// use fiscal_core::costing::{apply_movement, StockPosition};
/// use fiscal_core::money::Money;
/// use fiscal_core::types::StockDirection;
///
/// let before = StockPosition { quantity: 5, average_cost: Money::from_cents(8_000) };
/// let after = apply_movement("BOLT", before, StockDirection::In, 10, Some(Money::from_cents(10_000))).unwrap();
/// assert_eq!(after.quantity, 15);
/// assert_eq!(after.average_cost.cents(), 9_333);
/// ```
pub fn apply_movement(
    product: &str,
    position: StockPosition,
    direction: StockDirection,
    quantity: i64,
    unit_cost: Option<Money>,
) -> CoreResult<StockPosition> {
    match direction {
        StockDirection::Out => {
            if quantity > position.quantity {
                return Err(CoreError::InsufficientStock {
                    product: product.to_string(),
                    available: position.quantity,
                    requested: quantity,
                });
            }
            Ok(StockPosition {
                quantity: position.quantity - quantity,
                average_cost: position.average_cost,
            })
        }
        StockDirection::In => {
            let new_quantity = position.quantity + quantity;
            let average_cost = match unit_cost {
                Some(cost) => weighted_average(position, quantity, cost),
                None => position.average_cost,
            };
            Ok(StockPosition {
                quantity: new_quantity,
                average_cost,
            })
        }
    }
}

/// Rounded half away from zero to the cent.
fn weighted_average(position: StockPosition, in_quantity: i64, unit_cost: Money) -> Money {
    // Negative legacy stock would distort the average; treat it as empty
    let old_quantity = position.quantity.max(0) as i128;
    let in_quantity = in_quantity as i128;

    let value = old_quantity * position.average_cost.cents() as i128
        + in_quantity * unit_cost.cents() as i128;
    let divisor = (old_quantity + in_quantity).max(1);

    let magnitude = (value.abs() + divisor / 2) / divisor;
    let signed = if value < 0 { -magnitude } else { magnitude };
    Money::from_cents(signed as i64)
}

// =============================================================================
// Unit Tests
// =============================================================================
