//! # Settlement Arithmetic
//!
//! The single recomputation used by every settlement-affecting event
//! (receipt issued, receipt cancelled, advance linked, advance released).
//!
//! ## Balance Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Invoice (FT)                                                           │
//! │    covered     = Σ active receipts + Σ advance allocations              │
//! │    outstanding = max(0, net_total − covered)                            │
//! │                                                                         │
//! │    covered == 0         → emitted                                       │
//! │    0 < covered < total  → partially_paid                                │
//! │    covered >= total     → paid                                          │
//! │                                                                         │
//! │  Advance (FA)                                                           │
//! │    remaining = max(0, net_total − Σ allocations)                        │
//! │    remaining == 0       → paid, otherwise emitted                       │
//! │                                                                         │
//! │  Cancelled and expired documents never change state here.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::DocumentState;

// =============================================================================
// Invoice Settlement
// =============================================================================

/// Everything that counts towards paying one invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SettlementSnapshot {
    pub net_total: Money,
    /// Sum of non-cancelled receipts.
    pub receipts: Money,
    /// Sum of advance allocations.
    pub allocations: Money,
}

impl SettlementSnapshot {
    pub fn covered(&self) -> Money {
        self.receipts + self.allocations
    }

    /// Never negative.
    ///
    /// ## Example
    /// ```rust
    /// use fiscal_core::money::Money;
    /// use fiscal_core::settlement::SettlementSnapshot;
    ///
    /// let snapshot = SettlementSnapshot {
    ///     net_total: Money::from_cents(114_000),
    ///     receipts: Money::from_cents(50_000),
    ///     allocations: Money::zero(),
    /// };
    /// assert_eq!(snapshot.outstanding().cents(), 64_000);
    /// ```
    pub fn outstanding(&self) -> Money {
        (self.net_total - self.covered()).non_negative()
    }

    /// State implied by the balance alone.
    pub fn settled_state(&self) -> DocumentState {
        let covered = self.covered();
        if covered.is_zero() {
            DocumentState::Emitted
        } else if covered >= self.net_total {
            DocumentState::Paid
        } else {
            DocumentState::PartiallyPaid
        }
    }

    /// Rejects an amount larger than the outstanding balance.
    pub fn check_payment(&self, document: &str, amount: Money) -> CoreResult<()> {
        let outstanding = self.outstanding();
        if amount > outstanding {
            return Err(CoreError::AmountExceedsOutstandingBalance {
                document: document.to_string(),
                requested: amount,
                outstanding,
            });
        }
        Ok(())
    }

    /// Snapshot after an additional receipt.
    pub fn with_receipt(mut self, amount: Money) -> Self {
        self.receipts += amount;
        self
    }

    /// Snapshot after an additional advance allocation.
    pub fn with_allocation(mut self, amount: Money) -> Self {
        self.allocations += amount;
        self
    }
}

/// Next state of an invoice given its current state and balance.
pub fn next_invoice_state(current: DocumentState, snapshot: &SettlementSnapshot) -> DocumentState {
    if current.is_closed() {
        current
    } else {
        snapshot.settled_state()
    }
}

// =============================================================================
// Advance Balance
// =============================================================================

/// Allocation state of one advance invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdvanceBalance {
    pub net_total: Money,
    pub allocated: Money,
}

impl AdvanceBalance {
    pub fn remaining(&self) -> Money {
        (self.net_total - self.allocated).non_negative()
    }

    /// Rejects an allocation larger than the unallocated remainder.
    pub fn check_allocation(&self, document: &str, amount: Money) -> CoreResult<()> {
        let remaining = self.remaining();
        if amount > remaining {
            return Err(CoreError::AmountExceedsOutstandingBalance {
                document: document.to_string(),
                requested: amount,
                outstanding: remaining,
            });
        }
        Ok(())
    }

    pub fn with_allocation(mut self, amount: Money) -> Self {
        self.allocated += amount;
        self
    }
}

/// Next state of an advance invoice given its current state and allocations.
pub fn next_advance_state(current: DocumentState, balance: &AdvanceBalance) -> DocumentState {
    if current.is_closed() {
        current
    } else if balance.allocated.is_positive() && balance.remaining().is_zero() {
        DocumentState::Paid
    } else {
        DocumentState::Emitted
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
