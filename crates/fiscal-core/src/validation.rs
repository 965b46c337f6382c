//! # Validation Module
//!
//! Input validation for emission requests and master data.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (pure, before the transaction opens)             │
//! │  ├── Required fields per document type (via the registry)              │
//! │  ├── Client / walk-in exclusivity                                      │
//! │  └── Line quantities, prices, rates                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Engine (inside the transaction)                              │
//! │  ├── Origin document exists, has an allowed type, is not cancelled     │
//! │  └── Origin lines belong to the origin document                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  ├── UNIQUE (type, series, year, sequence)                             │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::request::{EmissionRequest, LineInput};
use crate::types::Rate;
use crate::MAX_LINE_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Emission
// =============================================================================

/// Checks an emission request against its document type's rules.
///
/// ## Rules
/// - `client_id` and a walk-in `client_name` are mutually exclusive
/// - FT/FA/RC need a client, a walk-in name, an origin or a prior sale
/// - NC/ND/RC/FRt need an origin document; FP never has one
/// - FR and RC need payment data; only FT/FR/RC accept it
/// - RC carries no lines, every other type at least one
///
/// ## Example
/// ```rust
/// use fiscal_core::registry::DocumentType;
/// use fiscal_core::request::EmissionRequest;
/// use fiscal_core::validation::validate_emission;
///
/// // A credit note without origin is rejected
/// let request = EmissionRequest::new(DocumentType::CreditNote);
/// assert!(validate_emission(&request).is_err());
/// ```
pub fn validate_emission(request: &EmissionRequest) -> ValidationResult<()> {
    let document_type = request.document_type;
    let behavior = document_type.behavior();

    let client_id = non_blank(&request.client_id);
    let client_name = non_blank(&request.client_name);

    if client_id.is_some() && client_name.is_some() {
        return Err(ValidationError::inconsistent(
            "client_id and a walk-in client name are mutually exclusive",
        ));
    }
    if let Some(name) = client_name {
        validate_text("client_name", name, 200)?;
    }
    if let Some(tax_id) = non_blank(&request.client_tax_id) {
        validate_text("client_tax_id", tax_id, 32)?;
    }

    let origin = non_blank(&request.origin_document_id);
    // A sale reference is checked again once the directory resolves it
    let has_client = client_id.is_some()
        || client_name.is_some()
        || origin.is_some()
        || non_blank(&request.sale_id).is_some();

    if behavior.requires_client && !has_client {
        return Err(ValidationError::required("client_id"));
    }
    if behavior.requires_origin && origin.is_none() {
        return Err(ValidationError::required("origin_document_id"));
    }
    if origin.is_some() && behavior.allowed_origins.is_empty() {
        return Err(ValidationError::inconsistent(format!(
            "{} cannot derive from another document",
            document_type
        )));
    }

    match &request.payment {
        None if behavior.requires_payment => return Err(ValidationError::required("payment")),
        Some(_) if !behavior.requires_payment && !behavior.generates_receipt_on_emission => {
            return Err(ValidationError::inconsistent(format!(
                "{} does not accept payment data",
                document_type
            )));
        }
        Some(payment) => {
            if let Some(amount) = payment.amount {
                if !amount.is_positive() {
                    return Err(ValidationError::MustBePositive {
                        field: "payment amount".to_string(),
                    });
                }
            }
            if let Some(reference) = non_blank(&payment.reference) {
                validate_text("payment reference", reference, 100)?;
            }
        }
        None => {}
    }

    if behavior.carries_lines {
        if request.lines.is_empty() {
            return Err(ValidationError::required("lines"));
        }
    } else if !request.lines.is_empty() {
        return Err(ValidationError::inconsistent(format!(
            "{} carries no lines",
            document_type
        )));
    }

    for line in &request.lines {
        validate_line(line)?;
        if line.origin_line_id.is_some() && origin.is_none() {
            return Err(ValidationError::inconsistent(
                "origin_line_id requires an origin document",
            ));
        }
    }

    if let Some(reference) = non_blank(&request.external_reference) {
        validate_text("external_reference", reference, 100)?;
    }
    if let Some(notes) = non_blank(&request.notes) {
        validate_text("notes", notes, 1000)?;
    }

    Ok(())
}

/// Checks one requested line.
pub fn validate_line(line: &LineInput) -> ValidationResult<()> {
    if line.product_id.is_none() && line.description.trim().is_empty() {
        return Err(ValidationError::required("description"));
    }
    if line.description.len() > 500 {
        return Err(ValidationError::TooLong {
            field: "description".to_string(),
            max: 500,
        });
    }

    validate_quantity(line.quantity)?;

    if line.unit_price.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "unit_price".to_string(),
        });
    }
    if line.discount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "discount".to_string(),
        });
    }
    if let Some(rate) = line.vat_rate {
        validate_rate("vat_rate", rate)?;
    }
    if let Some(rate) = line.retention_rate {
        validate_rate("retention_rate", rate)?;
    }

    Ok(())
}

// =============================================================================
// Master Data Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only alphanumeric characters, hyphens, underscores
///
/// ## Example
/// ```rust
/// use fiscal_core::validation::validate_sku;
///
/// assert!(validate_sku("BOLT-M8").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("A".repeat(100).as_str()).is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    validate_code("sku", sku, 50)
}

/// Validates a series label ("FT2025", "A", "NC-LX").
pub fn validate_series_label(series: &str) -> ValidationResult<()> {
    validate_code("series", series, 20)
}

/// Validates a product name.
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_text("name", name, 200)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line or movement quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a rate in basis points (0% to 100%).
pub fn validate_rate(field: &str, rate: Rate) -> ValidationResult<()> {
    if rate.bps() > Rate::MAX_BPS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: Rate::MAX_BPS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Helpers
// =============================================================================

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::required(field));
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

fn validate_code(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    validate_text(field, value, max)?;

    if !value
        .trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::inconsistent(format!(
            "{} must contain only letters, numbers, hyphens, and underscores",
            field
        )));
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
