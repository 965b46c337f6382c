//! # Document Type Registry
//!
//! One enumerated type, one immutable behaviour record per variant.
//!
//! ## Why a Registry?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every rule that depends on the document type is read through          │
//! │  DocumentType::behavior(). Nothing else compares type codes.           │
//! │                                                                         │
//! │  Type │ Stock │ Sale │ Auto-RC │ Initial │ Due        │ Origin from     │
//! │  ─────┼───────┼──────┼─────────┼─────────┼────────────┼───────────────  │
//! │  FT   │ out   │ yes  │ yes*    │ emitted │ +30 days   │ FP              │
//! │  FR   │ out   │ yes  │ no      │ paid    │ +0 days    │ FP              │
//! │  FP   │ -     │ no   │ no      │ emitted │ +30 days   │ -               │
//! │  FA   │ -     │ no   │ no      │ emitted │ delivery+30│ FP              │
//! │  NC   │ in    │ no   │ no      │ emitted │ none       │ FT, FR (req.)   │
//! │  ND   │ -     │ yes  │ no      │ emitted │ +15 days   │ FT, FR (req.)   │
//! │  RC   │ -     │ no   │ no      │ paid    │ none       │ FT (req.)       │
//! │  FRt  │ -     │ no   │ no      │ emitted │ none       │ FT, FR (req.)   │
//! │                                                                         │
//! │  * only when payment data is supplied with the invoice                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::types::{DocumentState, StockDirection, StockReason};

// =============================================================================
// Document Type
// =============================================================================

/// The fiscal document types handled by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
pub enum DocumentType {
    /// FT - standard invoice.
    #[serde(rename = "FT")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "FT"))]
    Invoice,
    /// FR - invoice-receipt, paid at emission.
    #[serde(rename = "FR")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "FR"))]
    InvoiceReceipt,
    /// FP - proforma invoice (non-fiscal draft).
    #[serde(rename = "FP")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "FP"))]
    Proforma,
    /// FA - advance-payment invoice.
    #[serde(rename = "FA")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "FA"))]
    AdvanceInvoice,
    /// NC - credit note.
    #[serde(rename = "NC")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "NC"))]
    CreditNote,
    /// ND - debit note.
    #[serde(rename = "ND")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "ND"))]
    DebitNote,
    /// RC - receipt.
    #[serde(rename = "RC")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "RC"))]
    Receipt,
    /// FRt - rectification invoice.
    #[serde(rename = "FRt")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "FRt"))]
    Rectification,
}

impl DocumentType {
    /// Every document type, in registry order.
    pub const ALL: [DocumentType; 8] = [
        DocumentType::Invoice,
        DocumentType::InvoiceReceipt,
        DocumentType::Proforma,
        DocumentType::AdvanceInvoice,
        DocumentType::CreditNote,
        DocumentType::DebitNote,
        DocumentType::Receipt,
        DocumentType::Rectification,
    ];

    /// The fiscal code stored in the database and printed on documents.
    pub const fn code(&self) -> &'static str {
        match self {
            DocumentType::Invoice => "FT",
            DocumentType::InvoiceReceipt => "FR",
            DocumentType::Proforma => "FP",
            DocumentType::AdvanceInvoice => "FA",
            DocumentType::CreditNote => "NC",
            DocumentType::DebitNote => "ND",
            DocumentType::Receipt => "RC",
            DocumentType::Rectification => "FRt",
        }
    }

    /// Returns the immutable behaviour record for this type.
    pub const fn behavior(&self) -> &'static DocumentBehavior {
        match self {
            DocumentType::Invoice => &INVOICE,
            DocumentType::InvoiceReceipt => &INVOICE_RECEIPT,
            DocumentType::Proforma => &PROFORMA,
            DocumentType::AdvanceInvoice => &ADVANCE_INVOICE,
            DocumentType::CreditNote => &CREDIT_NOTE,
            DocumentType::DebitNote => &DEBIT_NOTE,
            DocumentType::Receipt => &RECEIPT,
            DocumentType::Rectification => &RECTIFICATION,
        }
    }

    /// Returns true if a document of this type may derive from `origin`.
    pub fn accepts_origin(&self, origin: DocumentType) -> bool {
        self.behavior().allowed_origins.contains(&origin)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DocumentType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentType::ALL
            .into_iter()
            .find(|t| t.code() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "document_type".to_string(),
                allowed: DocumentType::ALL.iter().map(|t| t.code().to_string()).collect(),
            })
    }
}

// =============================================================================
// Behaviour Record
// =============================================================================

/// How the due date of a document is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuePolicy {
    /// The document never has a due date (explicit values are ignored).
    None,
    /// Due `n` days after emission unless an explicit date is given.
    Days(i64),
    /// Expected delivery date, `n` days after emission unless given.
    ExpectedDelivery(i64),
}

/// Static behaviour of one document type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentBehavior {
    /// Emission moves stock for goods lines.
    pub affects_stock: bool,
    /// Direction of the emission movement when `affects_stock` is set.
    pub stock_direction: StockDirection,
    /// Reason code recorded on emission movements.
    pub stock_reason: StockReason,
    /// Counts towards sales figures.
    pub counts_as_sale: bool,
    /// Embedded payment data on emission produces a linked receipt.
    pub generates_receipt_on_emission: bool,
    /// State right after emission.
    pub initial_state: DocumentState,
    /// Due date rule.
    pub due: DuePolicy,
    /// The document needs a registered client, a walk-in name or an origin
    /// document. An origin counts even when it names no client; a sale
    /// reference counts only once it resolves to a client.
    pub requires_client: bool,
    /// Payment data is mandatory.
    pub requires_payment: bool,
    /// An origin document is mandatory.
    pub requires_origin: bool,
    /// The document carries tax lines (at least one is required).
    pub carries_lines: bool,
    /// Types an origin document may have.
    pub allowed_origins: &'static [DocumentType],
}

impl DocumentBehavior {
    /// Computes the due date for a document emitted on `emitted_on`.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::NaiveDate;
    /// use fiscal_core::registry::DocumentType;
    ///
    /// let emitted = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    /// let due = DocumentType::DebitNote.behavior().due_date(emitted, None);
    /// assert_eq!(due, NaiveDate::from_ymd_opt(2025, 1, 16));
    /// ```
    pub fn due_date(&self, emitted_on: NaiveDate, explicit: Option<NaiveDate>) -> Option<NaiveDate> {
        match self.due {
            DuePolicy::None => None,
            DuePolicy::Days(days) | DuePolicy::ExpectedDelivery(days) => {
                Some(explicit.unwrap_or(emitted_on + Duration::days(days)))
            }
        }
    }
}

const SALE_ORIGINS: &[DocumentType] = &[DocumentType::Invoice, DocumentType::InvoiceReceipt];
const PROFORMA_ORIGINS: &[DocumentType] = &[DocumentType::Proforma];

const INVOICE: DocumentBehavior = DocumentBehavior {
    affects_stock: true,
    stock_direction: StockDirection::Out,
    stock_reason: StockReason::Sale,
    counts_as_sale: true,
    generates_receipt_on_emission: true,
    initial_state: DocumentState::Emitted,
    due: DuePolicy::Days(30),
    requires_client: true,
    requires_payment: false,
    requires_origin: false,
    carries_lines: true,
    allowed_origins: PROFORMA_ORIGINS,
};

const INVOICE_RECEIPT: DocumentBehavior = DocumentBehavior {
    affects_stock: true,
    stock_direction: StockDirection::Out,
    stock_reason: StockReason::Sale,
    counts_as_sale: true,
    generates_receipt_on_emission: false,
    initial_state: DocumentState::Paid,
    due: DuePolicy::Days(0),
    requires_client: false,
    requires_payment: true,
    requires_origin: false,
    carries_lines: true,
    allowed_origins: PROFORMA_ORIGINS,
};

const PROFORMA: DocumentBehavior = DocumentBehavior {
    affects_stock: false,
    stock_direction: StockDirection::Out,
    stock_reason: StockReason::Adjustment,
    counts_as_sale: false,
    generates_receipt_on_emission: false,
    initial_state: DocumentState::Emitted,
    due: DuePolicy::Days(30),
    requires_client: false,
    requires_payment: false,
    requires_origin: false,
    carries_lines: true,
    allowed_origins: &[],
};

const ADVANCE_INVOICE: DocumentBehavior = DocumentBehavior {
    affects_stock: false,
    stock_direction: StockDirection::Out,
    stock_reason: StockReason::Adjustment,
    counts_as_sale: false,
    generates_receipt_on_emission: false,
    initial_state: DocumentState::Emitted,
    due: DuePolicy::ExpectedDelivery(30),
    requires_client: true,
    requires_payment: false,
    requires_origin: false,
    carries_lines: true,
    allowed_origins: PROFORMA_ORIGINS,
};

const CREDIT_NOTE: DocumentBehavior = DocumentBehavior {
    affects_stock: true,
    stock_direction: StockDirection::In,
    stock_reason: StockReason::CreditNote,
    counts_as_sale: false,
    generates_receipt_on_emission: false,
    initial_state: DocumentState::Emitted,
    due: DuePolicy::None,
    requires_client: false,
    requires_payment: false,
    requires_origin: true,
    carries_lines: true,
    allowed_origins: SALE_ORIGINS,
};

const DEBIT_NOTE: DocumentBehavior = DocumentBehavior {
    affects_stock: false,
    stock_direction: StockDirection::Out,
    stock_reason: StockReason::Adjustment,
    counts_as_sale: true,
    generates_receipt_on_emission: false,
    initial_state: DocumentState::Emitted,
    due: DuePolicy::Days(15),
    requires_client: false,
    requires_payment: false,
    requires_origin: true,
    carries_lines: true,
    allowed_origins: SALE_ORIGINS,
};

const RECEIPT: DocumentBehavior = DocumentBehavior {
    affects_stock: false,
    stock_direction: StockDirection::Out,
    stock_reason: StockReason::Adjustment,
    counts_as_sale: false,
    generates_receipt_on_emission: false,
    initial_state: DocumentState::Paid,
    due: DuePolicy::None,
    requires_client: true,
    requires_payment: true,
    requires_origin: true,
    carries_lines: false,
    allowed_origins: &[DocumentType::Invoice],
};

const RECTIFICATION: DocumentBehavior = DocumentBehavior {
    affects_stock: false,
    stock_direction: StockDirection::Out,
    stock_reason: StockReason::Adjustment,
    counts_as_sale: false,
    generates_receipt_on_emission: false,
    initial_state: DocumentState::Emitted,
    due: DuePolicy::None,
    requires_client: false,
    requires_payment: false,
    requires_origin: true,
    carries_lines: true,
    allowed_origins: SALE_ORIGINS,
};

// =============================================================================
// Unit Tests
// =============================================================================
