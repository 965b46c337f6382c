//! # fiscal-core: Pure Business Rules of the Fiscal Engine
//!
//! This crate holds every rule of the fiscal-document lifecycle that can be
//! expressed without I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Fiscal Engine Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Upstream API layer (not in this repo)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    fiscal-engine                                │   │
//! │  │   emit, issue_receipt, link_advance, cancel, sweep, move_stock │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ fiscal-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────────┐  │   │
//! │  │   │ registry │ │   tax    │ │settlement│ │ costing          │  │   │
//! │  │   │ DocType  │ │ lines    │ │ balances │ │ weighted average │  │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────────────┘  │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────────┐  │   │
//! │  │   │  money   │ │  types   │ │validation│ │ integrity        │  │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    fiscal-db (Database Layer)                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`registry`] - Document types and their behaviour records
//! - [`tax`] - Line tax calculator
//! - [`settlement`] - Outstanding balances and settlement states
//! - [`costing`] - Weighted-average stock costing
//! - [`integrity`] - Integrity stamp
//! - [`types`] - Domain records (documents, lines, series, products, ledger)
//! - [`request`] - Emission input
//! - [`money`] - Money type with integer arithmetic
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use fiscal_core::money::Money;
//! use fiscal_core::registry::DocumentType;
//! use fiscal_core::types::DocumentState;
//!
//! let behavior = DocumentType::InvoiceReceipt.behavior();
//! assert!(behavior.affects_stock);
//! assert_eq!(behavior.initial_state, DocumentState::Paid);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod costing;
pub mod error;
pub mod integrity;
pub mod money;
pub mod registry;
pub mod request;
pub mod settlement;
pub mod tax;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use registry::{DocumentBehavior, DocumentType};
pub use request::{EmissionRequest, LineInput, PaymentInput};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Digits of the zero-padded sequence in a formatted number.
pub const SEQUENCE_WIDTH: usize = 6;

/// Maximum quantity on one line or stock movement.
pub const MAX_LINE_QUANTITY: i64 = 1_000_000;

/// Formats a display number: `FT2025` + `42` → `FT2025-000042`.
///
/// ## Example
/// ```rust
/// assert_eq!(fiscal_core::format_number("FT2025", 42), "FT2025-000042");
/// ```
pub fn format_number(series: &str, sequence: i64) -> String {
    format!("{}-{:0width$}", series, sequence, width = SEQUENCE_WIDTH)
}
