//! # Document Repository
//!
//! Fiscal documents, their lines, and the queries the engine needs to walk
//! the origin relation.
//!
//! ## Origin Relation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   FP ◄── FT ◄──┬── RC   (receipts: settle the FT)                       │
//! │                ├── NC   (credit note: lines may point at FT lines)      │
//! │                ├── ND                                                   │
//! │                └── FRt                                                  │
//! │                                                                         │
//! │   origin_document_id and origin_line_id are plain nullable foreign      │
//! │   keys, resolved through idx_fiscal_documents_origin and               │
//! │   idx_document_lines_origin.                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use fiscal_core::{DocumentLine, DocumentState, FiscalDocument, Money};

/// Repository for document operations.
pub struct DocumentRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> DocumentRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        DocumentRepository { conn }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub async fn insert(&mut self, doc: &FiscalDocument) -> DbResult<()> {
        debug!(number = %doc.number, document_type = %doc.document_type, "Inserting document");

        sqlx::query(
            r#"
            INSERT INTO fiscal_documents (
                id, document_type, series, sequence_number, fiscal_year, number,
                emitted_at, due_date, cancelled_at,
                client_id, client_name, client_tax_id,
                origin_document_id, sale_id,
                taxable_base_cents, vat_cents, retention_cents, net_total_cents,
                state, cancellation_reason, cancelled_by, created_by,
                payment_method, payment_reference,
                integrity_hash, external_reference, notes,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9,
                ?10, ?11, ?12,
                ?13, ?14,
                ?15, ?16, ?17, ?18,
                ?19, ?20, ?21, ?22,
                ?23, ?24,
                ?25, ?26, ?27,
                ?28, ?29
            )
            "#,
        )
        .bind(&doc.id)
        .bind(doc.document_type)
        .bind(&doc.series)
        .bind(doc.sequence_number)
        .bind(doc.fiscal_year)
        .bind(&doc.number)
        .bind(doc.emitted_at)
        .bind(doc.due_date)
        .bind(doc.cancelled_at)
        .bind(&doc.client_id)
        .bind(&doc.client_name)
        .bind(&doc.client_tax_id)
        .bind(&doc.origin_document_id)
        .bind(&doc.sale_id)
        .bind(doc.taxable_base_cents)
        .bind(doc.vat_cents)
        .bind(doc.retention_cents)
        .bind(doc.net_total_cents)
        .bind(doc.state)
        .bind(&doc.cancellation_reason)
        .bind(&doc.cancelled_by)
        .bind(&doc.created_by)
        .bind(doc.payment_method)
        .bind(&doc.payment_reference)
        .bind(&doc.integrity_hash)
        .bind(&doc.external_reference)
        .bind(&doc.notes)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    pub async fn insert_line(&mut self, line: &DocumentLine) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO document_lines (
                id, document_id, product_id, origin_line_id, description,
                quantity, unit_price_cents, discount_cents, taxable_base_cents,
                vat_rate_bps, vat_cents, retention_rate_bps, retention_cents,
                line_total_cents, is_service, display_order, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(&line.id)
        .bind(&line.document_id)
        .bind(&line.product_id)
        .bind(&line.origin_line_id)
        .bind(&line.description)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.discount_cents)
        .bind(line.taxable_base_cents)
        .bind(line.vat_rate_bps)
        .bind(line.vat_cents)
        .bind(line.retention_rate_bps)
        .bind(line.retention_cents)
        .bind(line.line_total_cents)
        .bind(line.is_service)
        .bind(line.display_order)
        .bind(line.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Writes the row's `updated_at` and nothing else.
    ///
    /// Used as the first statement of a settlement or cancellation
    /// transaction: it takes the write lock before any balance is read.
    /// Returns false if the document doesn't exist.
    pub async fn touch(&mut self, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query("UPDATE fiscal_documents SET updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(now)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_state(
        &mut self,
        id: &str,
        state: DocumentState,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(document_id = %id, state = %state, "Updating document state");

        sqlx::query("UPDATE fiscal_documents SET state = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(state)
            .bind(now)
            .execute(&mut *self.conn)
            .await?;

        Ok(())
    }

    pub async fn mark_cancelled(
        &mut self,
        id: &str,
        reason: &str,
        actor: &str,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE fiscal_documents SET
                state = 'cancelled',
                cancellation_reason = ?2,
                cancelled_by = ?3,
                cancelled_at = ?4,
                updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(reason)
        .bind(actor)
        .bind(at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Flips overdue, never-linked FA documents in emitted state to expired.
    pub async fn expire_overdue_advances(
        &mut self,
        as_of: NaiveDate,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE fiscal_documents
               SET state = 'expired', updated_at = ?2
             WHERE document_type = 'FA'
               AND state = 'emitted'
               AND due_date IS NOT NULL
               AND due_date < ?1
               AND NOT EXISTS (
                   SELECT 1 FROM advance_links l WHERE l.advance_id = fiscal_documents.id)
            "#,
        )
        .bind(as_of)
        .bind(now)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get(&mut self, id: &str) -> DbResult<Option<FiscalDocument>> {
        let doc = sqlx::query_as::<_, FiscalDocument>("SELECT * FROM fiscal_documents WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(doc)
    }

    pub async fn lines(&mut self, document_id: &str) -> DbResult<Vec<DocumentLine>> {
        let lines = sqlx::query_as::<_, DocumentLine>(
            "SELECT * FROM document_lines WHERE document_id = ?1 ORDER BY display_order",
        )
        .bind(document_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(lines)
    }

    pub async fn line(&mut self, id: &str) -> DbResult<Option<DocumentLine>> {
        let line = sqlx::query_as::<_, DocumentLine>("SELECT * FROM document_lines WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(line)
    }

    /// Documents whose origin is `origin_id`, oldest first.
    pub async fn derived(&mut self, origin_id: &str) -> DbResult<Vec<FiscalDocument>> {
        let docs = sqlx::query_as::<_, FiscalDocument>(
            "SELECT * FROM fiscal_documents WHERE origin_document_id = ?1 ORDER BY emitted_at, sequence_number",
        )
        .bind(origin_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(docs)
    }

    /// Receipts issued against an invoice, cancelled ones included.
    pub async fn receipts_for(&mut self, invoice_id: &str) -> DbResult<Vec<FiscalDocument>> {
        let docs = sqlx::query_as::<_, FiscalDocument>(
            r#"
            SELECT * FROM fiscal_documents
             WHERE origin_document_id = ?1 AND document_type = 'RC'
             ORDER BY emitted_at, sequence_number
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(docs)
    }

    /// Sum of non-cancelled receipts against an invoice.
    pub async fn active_receipts_total(&mut self, invoice_id: &str) -> DbResult<Money> {
        let cents: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(net_total_cents), 0) FROM fiscal_documents
             WHERE origin_document_id = ?1
               AND document_type = 'RC'
               AND state != 'cancelled'
            "#,
        )
        .bind(invoice_id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(Money::from_cents(cents))
    }

    /// Units already credited against an origin line by non-cancelled NCs.
    pub async fn credited_quantity(&mut self, origin_line_id: &str) -> DbResult<i64> {
        let quantity: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(l.quantity), 0)
              FROM document_lines l
              JOIN fiscal_documents d ON d.id = l.document_id
             WHERE l.origin_line_id = ?1
               AND d.document_type = 'NC'
               AND d.state != 'cancelled'
            "#,
        )
        .bind(origin_line_id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(quantity)
    }
}
