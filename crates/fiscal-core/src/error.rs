//! # Error Types
//!
//! Domain-specific error types for fiscal-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  fiscal-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Field-level input failures                     │
//! │                                                                         │
//! │  fiscal-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  fiscal-engine errors                                                  │
//! │  └── EngineError      - What callers see (with an ErrorCode)           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every one of these aborts the current operation; the transaction is
//! dropped and nothing is persisted.

use thiserror::Error;

use crate::money::Money;
use crate::registry::DocumentType;
use crate::types::DocumentState;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Missing or inconsistent input, or a wrong origin-document type.
    #[error("Invalid document data: {0}")]
    InvalidDocumentData(#[from] ValidationError),

    /// A referenced document, line, product, series, client or sale is absent.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// No active series matches the type and year.
    ///
    /// ## When This Occurs
    /// - No series was ever created for the type
    /// - The series for the current year was not opened yet and no yearless
    ///   series exists
    /// - The matching series was deactivated
    #[error("No active series for {document_type} in {year}")]
    NoActiveSeries {
        document_type: DocumentType,
        year: i32,
    },

    /// Settlement amount larger than what is still owed.
    ///
    /// ## When This Occurs
    /// ```text
    /// FT net 1140.00, receipts 500.00 → outstanding 640.00
    ///      │
    ///      ▼
    /// issue_receipt(700.00)
    ///      │
    ///      ▼
    /// AmountExceedsOutstandingBalance { requested: 700.00, outstanding: 640.00 }
    /// ```
    /// Also raised by advance linking when the amount exceeds the advance's
    /// unallocated remainder.
    #[error("Amount {requested} exceeds outstanding balance {outstanding} of {document}")]
    AmountExceedsOutstandingBalance {
        document: String,
        requested: Money,
        outstanding: Money,
    },

    /// Stock movement would take a product below zero.
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    #[error("Document {document} is already cancelled")]
    AlreadyCancelled { document: String },

    /// Cancellation blocked by documents that still point at this one.
    ///
    /// ## When This Occurs
    /// - An NC/ND/FRt/RC derived from the document is not cancelled
    /// - An FA is still allocated to a non-cancelled invoice
    #[error("Document {document} has active derived documents: {derived:?}")]
    HasActiveDerivedDocuments {
        document: String,
        derived: Vec<String>,
    },

    /// The document's type or state does not allow the operation.
    ///
    /// ## When This Occurs
    /// - Receipt against an invoice that is paid, cancelled or not an FT
    /// - Linking an advance that is not in emitted state
    #[error("Document {document} is {state}, cannot {action}")]
    InvalidStateTransition {
        document: String,
        state: DocumentState,
        action: &'static str,
    },
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any database work starts, then wrapped in
/// [`CoreError::InvalidDocumentData`].
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Fields contradict each other or the document type's rules.
    #[error("{reason}")]
    Inconsistent { reason: String },
}

impl ValidationError {
    pub fn required(field: &str) -> Self {
        ValidationError::Required {
            field: field.to_string(),
        }
    }

    pub fn inconsistent(reason: impl Into<String>) -> Self {
        ValidationError::Inconsistent {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
