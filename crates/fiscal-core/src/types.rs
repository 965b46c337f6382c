//! # Domain Types
//!
//! Records and enums shared by every layer of the fiscal engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ FiscalDocument  │◄──│  DocumentLine   │   │  AdvanceLink    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  document_id    │   │  advance_id FA  │       │
//! │  │  number         │   │  origin_line_id │   │  invoice_id FT  │       │
//! │  │  state          │   │  base/vat/ret   │   │  amount_cents   │       │
//! │  │  origin_doc_id ─┼─┐ │  line_total     │   └─────────────────┘       │
//! │  └─────────────────┘ │ └─────────────────┘                              │
//! │          ▲───────────┘  (self-reference: NC/ND/RC/FRt → FT/FR)          │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  FiscalSeries   │   │    Product      │◄──│ StockMovement   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  (type, series, │   │  kind           │   │  before/after   │       │
//! │  │   year)         │   │  current_stock  │   │  avg cost after │       │
//! │  │  last_number    │   │  average_cost   │   │  reason         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (number, sku, series label) - human-readable

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;
use crate::registry::DocumentType;

// =============================================================================
// Rate
// =============================================================================

/// A percentage rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1400 bps = 14% (VAT), 650 bps = 6.5% (service retention)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rate(u32);

impl Rate {
    /// The largest meaningful rate (100%).
    pub const MAX_BPS: u32 = 10_000;

    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    /// Checks if the rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::zero()
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Actor
// =============================================================================

/// Identity of whoever performs a mutating operation.
///
/// Always passed explicitly by the caller; the engine never reads it from
/// ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor(String);

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Actor(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Document State
// =============================================================================

/// Lifecycle state of a fiscal document.
///
/// ## State Machine
/// ```text
///            receipt/link < total          receipt/link = total
///  emitted ───────────────────► partially_paid ──────────────► paid
///     │  ◄──────────────────────────── (receipt cancelled) ─────┘
///     │
///     ├──► cancelled   (any non-cancelled state)
///     └──► expired     (FA only, overdue and never linked)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Emitted,
    PartiallyPaid,
    Paid,
    Cancelled,
    Expired,
}

impl DocumentState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DocumentState::Emitted => "emitted",
            DocumentState::PartiallyPaid => "partially_paid",
            DocumentState::Paid => "paid",
            DocumentState::Cancelled => "cancelled",
            DocumentState::Expired => "expired",
        }
    }

    /// Cancelled and expired documents accept no further settlement.
    pub const fn is_closed(&self) -> bool {
        matches!(self, DocumentState::Cancelled | DocumentState::Expired)
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Card payment on an external terminal.
    Card,
    /// Bank transfer.
    BankTransfer,
    /// Anything else (cheque, mobile wallet...).
    Other,
}

// =============================================================================
// Inventory Enums
// =============================================================================

/// Whether a product is tracked in stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    /// Physical goods: stock and average cost are maintained.
    Goods,
    /// Services: never move stock, may carry retention.
    Service,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum StockDirection {
    In,
    Out,
}

impl StockDirection {
    pub const fn reversed(&self) -> Self {
        match self {
            StockDirection::In => StockDirection::Out,
            StockDirection::Out => StockDirection::In,
        }
    }
}

/// Reason code recorded on each stock ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum StockReason {
    Purchase,
    Sale,
    CreditNote,
    Adjustment,
    /// Reversal of a cancelled document's movement.
    Cancellation,
}

// =============================================================================
// Fiscal Document
// =============================================================================

/// One issued fiscal document. Never physically deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FiscalDocument {
    /// Unique identifier (UUID v4).
    pub id: String,
    pub document_type: DocumentType,
    /// Series label, e.g. "FT2025".
    pub series: String,
    pub sequence_number: i64,
    /// Year of the series the number was drawn from (None for yearless series).
    pub fiscal_year: Option<i32>,
    /// Formatted display number, e.g. "FT2025-000042".
    pub number: String,
    pub emitted_at: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub cancelled_at: Option<DateTime<Utc>>,

    /// Registered client. Exclusive with the walk-in name/tax-id pair.
    pub client_id: Option<String>,
    pub client_name: Option<String>,
    pub client_tax_id: Option<String>,

    /// Document this one derives from (NC/ND/RC/FRt → FT/FR, FT/FR/FA → FP).
    pub origin_document_id: Option<String>,
    /// Prior sale the client was resolved from.
    pub sale_id: Option<String>,

    pub taxable_base_cents: i64,
    pub vat_cents: i64,
    pub retention_cents: i64,
    pub net_total_cents: i64,

    pub state: DocumentState,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<String>,
    pub created_by: String,

    /// Recorded on FR and RC.
    pub payment_method: Option<PaymentMethod>,
    pub payment_reference: Option<String>,

    /// Hex SHA-256 integrity stamp.
    pub integrity_hash: String,
    pub external_reference: Option<String>,
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FiscalDocument {
    #[inline]
    pub fn taxable_base(&self) -> Money {
        Money::from_cents(self.taxable_base_cents)
    }

    #[inline]
    pub fn vat(&self) -> Money {
        Money::from_cents(self.vat_cents)
    }

    #[inline]
    pub fn retention(&self) -> Money {
        Money::from_cents(self.retention_cents)
    }

    #[inline]
    pub fn net_total(&self) -> Money {
        Money::from_cents(self.net_total_cents)
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.state == DocumentState::Cancelled
    }
}

// =============================================================================
// Document Line
// =============================================================================

/// One line of a document. Created with its document, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DocumentLine {
    pub id: String,
    pub document_id: String,
    /// None for free-text lines.
    pub product_id: Option<String>,
    /// Line of the origin document this one was copied from.
    pub origin_line_id: Option<String>,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_cents: i64,
    pub taxable_base_cents: i64,
    pub vat_rate_bps: u32,
    pub vat_cents: i64,
    pub retention_rate_bps: u32,
    pub retention_cents: i64,
    pub line_total_cents: i64,
    pub is_service: bool,
    pub display_order: i64,
    pub created_at: DateTime<Utc>,
}

impl DocumentLine {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Advance Link
// =============================================================================

/// Allocation of part of an advance invoice (FA) to a regular invoice (FT).
/// At most one row per (advance, invoice) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AdvanceLink {
    pub id: String,
    pub advance_id: String,
    pub invoice_id: String,
    pub amount_cents: i64,
    pub linked_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AdvanceLink {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Fiscal Series
// =============================================================================

/// Numbering counter for a (type, series, optional year) combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FiscalSeries {
    pub id: String,
    pub document_type: DocumentType,
    pub series: String,
    /// None = valid for every year.
    pub year: Option<i32>,
    pub last_number: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// Stock-relevant subset of a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// Stock Keeping Unit - business identifier.
    pub sku: String,
    pub name: String,
    pub kind: ProductKind,
    /// Default VAT rate in basis points.
    pub vat_rate_bps: u32,
    /// Default retention rate for services (None = engine default).
    pub retention_rate_bps: Option<u32>,
    pub current_stock: i64,
    pub min_stock: i64,
    /// Weighted-average unit cost in cents.
    pub average_cost_cents: i64,
    /// Whether product is active (soft delete).
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn vat_rate(&self) -> Rate {
        Rate::from_bps(self.vat_rate_bps)
    }

    #[inline]
    pub fn retention_rate(&self) -> Option<Rate> {
        self.retention_rate_bps.map(Rate::from_bps)
    }

    #[inline]
    pub fn average_cost(&self) -> Money {
        Money::from_cents(self.average_cost_cents)
    }

    #[inline]
    pub fn is_service(&self) -> bool {
        self.kind == ProductKind::Service
    }

    /// Stock at or below the configured minimum.
    pub fn is_low_stock(&self) -> bool {
        self.kind == ProductKind::Goods && self.current_stock <= self.min_stock
    }
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Append-only stock ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub direction: StockDirection,
    pub quantity: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub unit_cost_cents: Option<i64>,
    pub average_cost_before_cents: i64,
    pub average_cost_after_cents: i64,
    /// Document id or other origin.
    pub reference: Option<String>,
    pub reason: StockReason,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_from_bps() {
        let rate = Rate::from_bps(650);
        assert_eq!(rate.bps(), 650);
        assert!((rate.percentage() - 6.5).abs() < 0.001);
        assert_eq!(rate.to_string(), "6.50%");
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&DocumentState::PartiallyPaid).unwrap();
        assert_eq!(json, "\"partially_paid\"");
        assert_eq!(DocumentState::PartiallyPaid.to_string(), "partially_paid");
    }

    #[test]
    fn test_closed_states() {
        assert!(DocumentState::Cancelled.is_closed());
        assert!(DocumentState::Expired.is_closed());
        assert!(!DocumentState::Paid.is_closed());
    }

    #[test]
    fn test_direction_reversed() {
        assert_eq!(StockDirection::In.reversed(), StockDirection::Out);
        assert_eq!(StockDirection::Out.reversed(), StockDirection::In);
    }

    #[test]
    fn test_stock_reason_serialization() {
        let json = serde_json::to_string(&StockReason::CreditNote).unwrap();
        assert_eq!(json, "\"credit_note\"");
    }
}
