//! # Fiscal Engine Handle
//!
//! [`FiscalEngine`] owns the pool, the configuration and the client
//! directory. The operations live in sibling modules as further `impl`
//! blocks; this one holds construction, shared transaction helpers and the
//! read-only queries.
//!
//! ## Transaction Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  public operation                                                       │
//! │     │  directory lookups (no connection held)                          │
//! │     ▼                                                                   │
//! │  let mut tx = db.begin()                                                │
//! │     │  first statement is a write (allocate / touch / lock)            │
//! │     │  → SQLite write lock held until commit                           │
//! │     ▼                                                                   │
//! │  reads + writes through fiscal-db repositories                         │
//! │     │                                                                   │
//! │     ├── Err(..) → tx dropped → ROLLBACK                                 │
//! │     └── Ok(..)  → tx.commit()                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::directory::ClientDirectory;
use crate::error::EngineResult;
use fiscal_core::settlement::SettlementSnapshot;
use fiscal_core::validation::ValidationResult;
use fiscal_core::{
    integrity, AdvanceLink, CoreError, DocumentLine, DocumentType, FiscalDocument, FiscalSeries,
    Product, StockMovement, ValidationError,
};
use fiscal_db::{
    AdvanceLinkRepository, Database, DocumentRepository, ProductRepository, SeriesRepository,
    StockMovementRepository,
};

/// The fiscal-document lifecycle engine.
///
/// Cheap to clone; clones share the pool and the directory.
#[derive(Clone)]
pub struct FiscalEngine {
    pub(crate) db: Database,
    pub(crate) config: Arc<EngineConfig>,
    pub(crate) directory: Arc<dyn ClientDirectory>,
}

impl FiscalEngine {
    /// Wraps an existing database handle.
    pub fn new(
        db: Database,
        config: EngineConfig,
        directory: Arc<dyn ClientDirectory>,
    ) -> EngineResult<Self> {
        config.validate()?;
        Ok(FiscalEngine {
            db,
            config: Arc::new(config),
            directory,
        })
    }

    /// Opens the database described by `config` (running migrations) and
    /// builds the engine on top of it.
    pub async fn connect(
        config: EngineConfig,
        directory: Arc<dyn ClientDirectory>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let db = Database::new(config.db_config()).await?;
        Self::new(db, config, directory)
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // Document Queries
    // =========================================================================

    pub async fn document(&self, id: &str) -> EngineResult<FiscalDocument> {
        let mut conn = self.db.acquire().await?;
        load_document(&mut conn, id).await
    }

    pub async fn document_lines(&self, document_id: &str) -> EngineResult<Vec<DocumentLine>> {
        let mut conn = self.db.acquire().await?;
        Ok(DocumentRepository::new(&mut conn).lines(document_id).await?)
    }

    /// Documents whose origin is `id`, cancelled ones included.
    pub async fn derived_documents(&self, id: &str) -> EngineResult<Vec<FiscalDocument>> {
        let mut conn = self.db.acquire().await?;
        Ok(DocumentRepository::new(&mut conn).derived(id).await?)
    }

    pub async fn receipts_for(&self, invoice_id: &str) -> EngineResult<Vec<FiscalDocument>> {
        let mut conn = self.db.acquire().await?;
        Ok(DocumentRepository::new(&mut conn).receipts_for(invoice_id).await?)
    }

    /// Links where the document is the advance or the invoice.
    pub async fn advance_links_for(&self, document_id: &str) -> EngineResult<Vec<AdvanceLink>> {
        let mut conn = self.db.acquire().await?;
        Ok(AdvanceLinkRepository::new(&mut conn)
            .for_document(document_id)
            .await?)
    }

    /// Current balance of an FT.
    pub async fn settlement(&self, invoice_id: &str) -> EngineResult<SettlementSnapshot> {
        let mut conn = self.db.acquire().await?;
        let invoice = load_document(&mut conn, invoice_id).await?;
        ensure_type(&invoice, DocumentType::Invoice, "document type")?;
        crate::settlement::invoice_snapshot(&mut conn, &invoice).await
    }

    /// Recomputes the integrity hash and compares it with the stored one.
    pub async fn verify_integrity(&self, document_id: &str) -> EngineResult<bool> {
        let document = self.document(document_id).await?;
        Ok(integrity::verify(
            &document,
            &self.config.fiscal.integrity_secret,
        ))
    }

    // =========================================================================
    // Stock Queries
    // =========================================================================

    pub async fn product(&self, id: &str) -> EngineResult<Product> {
        let mut conn = self.db.acquire().await?;
        ProductRepository::new(&mut conn)
            .get(id)
            .await?
            .ok_or_else(|| CoreError::not_found("product", id).into())
    }

    /// Ledger of one product, oldest first.
    pub async fn stock_movements(&self, product_id: &str) -> EngineResult<Vec<StockMovement>> {
        let mut conn = self.db.acquire().await?;
        Ok(StockMovementRepository::new(&mut conn)
            .for_product(product_id)
            .await?)
    }

    /// Active goods at or below their minimum stock.
    pub async fn low_stock_products(&self) -> EngineResult<Vec<Product>> {
        let mut conn = self.db.acquire().await?;
        Ok(ProductRepository::new(&mut conn).low_stock().await?)
    }

    pub async fn list_series(&self) -> EngineResult<Vec<FiscalSeries>> {
        let mut conn = self.db.acquire().await?;
        Ok(SeriesRepository::new(&mut conn).list().await?)
    }
}

// =============================================================================
// Shared Transaction Helpers
// =============================================================================

pub(crate) async fn load_document(
    conn: &mut SqliteConnection,
    id: &str,
) -> EngineResult<FiscalDocument> {
    DocumentRepository::new(conn)
        .get(id)
        .await?
        .ok_or_else(|| CoreError::not_found("document", id).into())
}

/// Takes the write lock through the document row, then loads it.
pub(crate) async fn lock_document(
    conn: &mut SqliteConnection,
    id: &str,
    now: DateTime<Utc>,
) -> EngineResult<FiscalDocument> {
    if !DocumentRepository::new(&mut *conn).touch(id, now).await? {
        return Err(CoreError::not_found("document", id).into());
    }
    load_document(conn, id).await
}

/// Rejects a document of the wrong type.
pub(crate) fn ensure_type(
    document: &FiscalDocument,
    expected: DocumentType,
    field: &str,
) -> ValidationResult<()> {
    if document.document_type == expected {
        Ok(())
    } else {
        Err(ValidationError::NotAllowed {
            field: format!("{} of {}", field, document.number),
            allowed: vec![expected.code().to_string()],
        })
    }
}
