//! # Repository Module
//!
//! Database repository implementations for the fiscal engine.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories Borrow a Connection                     │
//! │                                                                         │
//! │  let mut tx = db.begin().await?;                                       │
//! │       │                                                                 │
//! │       ├── SeriesRepository::new(&mut tx).allocate(..)                  │
//! │       ├── DocumentRepository::new(&mut tx).insert(..)                  │
//! │       ├── ProductRepository::new(&mut tx).lock(..)                     │
//! │       └── StockMovementRepository::new(&mut tx).insert(..)             │
//! │       │                                                                 │
//! │  tx.commit().await?;   ← all or nothing                                 │
//! │                                                                         │
//! │  The same repositories work on a pooled connection for reads.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`SeriesRepository`] - Numbering series and counter allocation
//! - [`DocumentRepository`] - Documents, lines, derived documents, states
//! - [`AdvanceLinkRepository`] - FA → FT allocations
//! - [`ProductRepository`] - Stock-relevant product data
//! - [`StockMovementRepository`] - Append-only stock ledger

pub mod document;
pub mod link;
pub mod movement;
pub mod product;
pub mod series;

pub use document::DocumentRepository;
pub use link::AdvanceLinkRepository;
pub use movement::StockMovementRepository;
pub use product::ProductRepository;
pub use series::SeriesRepository;

/// Generates a new entity ID (UUID v4).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Utc};
    use fiscal_core::{DocumentState, DocumentType, FiscalDocument, Product, ProductKind};

    use crate::{Database, DbConfig};

    pub async fn memory_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub fn document(id: &str, document_type: DocumentType, sequence: i64) -> FiscalDocument {
        let now: DateTime<Utc> = Utc::now();
        FiscalDocument {
            id: id.to_string(),
            document_type,
            series: document_type.code().to_string(),
            sequence_number: sequence,
            fiscal_year: Some(2025),
            number: fiscal_core::format_number(document_type.code(), sequence),
            emitted_at: now,
            due_date: None,
            cancelled_at: None,
            client_id: Some("client-1".to_string()),
            client_name: None,
            client_tax_id: None,
            origin_document_id: None,
            sale_id: None,
            taxable_base_cents: 100_000,
            vat_cents: 14_000,
            retention_cents: 0,
            net_total_cents: 114_000,
            state: DocumentState::Emitted,
            cancellation_reason: None,
            cancelled_by: None,
            created_by: "tester".to_string(),
            payment_method: None,
            payment_reference: None,
            integrity_hash: "0".repeat(64),
            external_reference: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn product(id: &str, sku: &str, kind: ProductKind, stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: id.to_string(),
            sku: sku.to_string(),
            name: format!("Product {}", sku),
            kind,
            vat_rate_bps: 1400,
            retention_rate_bps: None,
            current_stock: stock,
            min_stock: 2,
            average_cost_cents: 8_000,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
