//! # Emission Requests
//!
//! Input shapes accepted by the emission orchestrator. Built by the caller,
//! checked by [`crate::validation::validate_emission`] before any I/O.
//!
//! ## Usage
//! ```rust
//! use fiscal_core::money::Money;
//! use fiscal_core::registry::DocumentType;
//! use fiscal_core::request::{EmissionRequest, LineInput};
//!
//! let request = EmissionRequest::new(DocumentType::Invoice)
//!     .with_client("client-1")
//!     .with_line(LineInput::new("Consulting", 1, Money::from_cents(100_000)).service());
//! assert_eq!(request.lines.len(), 1);
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::registry::DocumentType;
use crate::types::{PaymentMethod, Rate};

// =============================================================================
// Emission Request
// =============================================================================

/// Everything needed to emit one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionRequest {
    pub document_type: DocumentType,

    /// Registered client. Exclusive with `client_name`.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Walk-in client name.
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub client_tax_id: Option<String>,

    #[serde(default)]
    pub origin_document_id: Option<String>,
    /// Prior sale used to resolve the client when none is given.
    #[serde(default)]
    pub sale_id: Option<String>,

    /// Defaults to the time of the call.
    #[serde(default)]
    pub emitted_at: Option<DateTime<Utc>>,
    /// Overrides the type's default due date (expected delivery for FA).
    #[serde(default)]
    pub due_date: Option<NaiveDate>,

    #[serde(default)]
    pub lines: Vec<LineInput>,
    #[serde(default)]
    pub payment: Option<PaymentInput>,

    #[serde(default)]
    pub external_reference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl EmissionRequest {
    pub fn new(document_type: DocumentType) -> Self {
        Self {
            document_type,
            client_id: None,
            client_name: None,
            client_tax_id: None,
            origin_document_id: None,
            sale_id: None,
            emitted_at: None,
            due_date: None,
            lines: Vec::new(),
            payment: None,
            external_reference: None,
            notes: None,
        }
    }

    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Walk-in client identified only by name and optional tax id.
    pub fn with_walk_in(mut self, name: impl Into<String>, tax_id: Option<String>) -> Self {
        self.client_name = Some(name.into());
        self.client_tax_id = tax_id;
        self
    }

    pub fn with_origin(mut self, document_id: impl Into<String>) -> Self {
        self.origin_document_id = Some(document_id.into());
        self
    }

    pub fn with_sale(mut self, sale_id: impl Into<String>) -> Self {
        self.sale_id = Some(sale_id.into());
        self
    }

    pub fn emitted_at(mut self, at: DateTime<Utc>) -> Self {
        self.emitted_at = Some(at);
        self
    }

    pub fn due_on(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }

    pub fn with_line(mut self, line: LineInput) -> Self {
        self.lines.push(line);
        self
    }

    pub fn with_payment(mut self, payment: PaymentInput) -> Self {
        self.payment = Some(payment);
        self
    }

    pub fn with_external_reference(mut self, reference: impl Into<String>) -> Self {
        self.external_reference = Some(reference.into());
        self
    }
}

// =============================================================================
// Line Input
// =============================================================================

/// One requested line. Rates left as `None` are resolved from the product,
/// then from the engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineInput {
    #[serde(default)]
    pub product_id: Option<String>,
    /// Line of the origin document this one copies.
    #[serde(default)]
    pub origin_line_id: Option<String>,
    /// May be empty when `product_id` is set; the product name is used.
    #[serde(default)]
    pub description: String,
    pub quantity: i64,
    pub unit_price: Money,
    #[serde(default)]
    pub discount: Money,
    #[serde(default = "default_true")]
    pub vat_applicable: bool,
    #[serde(default)]
    pub vat_rate: Option<Rate>,
    #[serde(default)]
    pub retention_rate: Option<Rate>,
    /// Defaults to the product kind, or goods for free-text lines.
    #[serde(default)]
    pub is_service: Option<bool>,
}

fn default_true() -> bool {
    true
}

impl LineInput {
    pub fn new(description: impl Into<String>, quantity: i64, unit_price: Money) -> Self {
        Self {
            product_id: None,
            origin_line_id: None,
            description: description.into(),
            quantity,
            unit_price,
            discount: Money::zero(),
            vat_applicable: true,
            vat_rate: None,
            retention_rate: None,
            is_service: None,
        }
    }

    pub fn with_product(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    pub fn with_origin_line(mut self, line_id: impl Into<String>) -> Self {
        self.origin_line_id = Some(line_id.into());
        self
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount = discount;
        self
    }

    pub fn with_vat_rate(mut self, rate: Rate) -> Self {
        self.vat_rate = Some(rate);
        self
    }

    /// VAT-exempt line.
    pub fn without_vat(mut self) -> Self {
        self.vat_applicable = false;
        self
    }

    pub fn with_retention_rate(mut self, rate: Rate) -> Self {
        self.retention_rate = Some(rate);
        self
    }

    pub fn service(mut self) -> Self {
        self.is_service = Some(true);
        self
    }
}

// =============================================================================
// Payment Input
// =============================================================================

/// Payment data embedded in an FR, RC or (for an automatic receipt) an FT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInput {
    pub method: PaymentMethod,
    /// None settles the full outstanding amount.
    #[serde(default)]
    pub amount: Option<Money>,
    #[serde(default)]
    pub reference: Option<String>,
}

impl PaymentInput {
    pub fn new(method: PaymentMethod) -> Self {
        Self {
            method,
            amount: None,
            reference: None,
        }
    }

    pub fn amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}
