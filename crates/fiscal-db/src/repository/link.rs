//! # Advance Link Repository
//!
//! Allocations from advance invoices (FA) to regular invoices (FT).
//! One row per (advance, invoice) pair; linking the same pair again adds to
//! the existing amount.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::new_id;
use fiscal_core::{AdvanceLink, Money};

/// Repository for advance link operations.
pub struct AdvanceLinkRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> AdvanceLinkRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        AdvanceLinkRepository { conn }
    }

    /// Inserts the pair or adds `amount` to its existing allocation.
    pub async fn upsert(
        &mut self,
        advance_id: &str,
        invoice_id: &str,
        amount: Money,
        actor: &str,
        now: DateTime<Utc>,
    ) -> DbResult<AdvanceLink> {
        debug!(advance_id = %advance_id, invoice_id = %invoice_id, amount = %amount, "Upserting advance link");

        let link = sqlx::query_as::<_, AdvanceLink>(
            r#"
            INSERT INTO advance_links (id, advance_id, invoice_id, amount_cents, linked_by, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT (advance_id, invoice_id) DO UPDATE SET
                amount_cents = amount_cents + excluded.amount_cents,
                linked_by = excluded.linked_by,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(advance_id)
        .bind(invoice_id)
        .bind(amount.cents())
        .bind(actor)
        .bind(now)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(link)
    }

    /// Total allocated from an advance.
    pub async fn allocated_from(&mut self, advance_id: &str) -> DbResult<Money> {
        let cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM advance_links WHERE advance_id = ?1",
        )
        .bind(advance_id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(Money::from_cents(cents))
    }

    /// Total allocated to an invoice.
    pub async fn allocated_to(&mut self, invoice_id: &str) -> DbResult<Money> {
        let cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM advance_links WHERE invoice_id = ?1",
        )
        .bind(invoice_id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(Money::from_cents(cents))
    }

    /// Links where the document is either the advance or the invoice.
    pub async fn for_document(&mut self, document_id: &str) -> DbResult<Vec<AdvanceLink>> {
        let links = sqlx::query_as::<_, AdvanceLink>(
            "SELECT * FROM advance_links WHERE advance_id = ?1 OR invoice_id = ?1 ORDER BY created_at",
        )
        .bind(document_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(links)
    }

    /// Numbers of non-cancelled invoices an advance is allocated to.
    pub async fn active_invoice_numbers(&mut self, advance_id: &str) -> DbResult<Vec<String>> {
        let numbers: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT d.number
              FROM advance_links l
              JOIN fiscal_documents d ON d.id = l.invoice_id
             WHERE l.advance_id = ?1 AND d.state != 'cancelled'
             ORDER BY d.number
            "#,
        )
        .bind(advance_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(numbers)
    }

    /// Removes every allocation to an invoice and returns the removed rows.
    pub async fn delete_for_invoice(&mut self, invoice_id: &str) -> DbResult<Vec<AdvanceLink>> {
        let removed = sqlx::query_as::<_, AdvanceLink>(
            "DELETE FROM advance_links WHERE invoice_id = ?1 RETURNING *",
        )
        .bind(invoice_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{document, memory_db};
    use crate::repository::DocumentRepository;
    use fiscal_core::DocumentType;

    #[tokio::test]
    async fn test_upsert_accumulates_per_pair() {
        let db = memory_db().await;
        let mut conn = db.acquire().await.unwrap();
        let now = Utc::now();

        {
            let mut docs = DocumentRepository::new(&mut conn);
            docs.insert(&document("fa-1", DocumentType::AdvanceInvoice, 1)).await.unwrap();
            docs.insert(&document("ft-1", DocumentType::Invoice, 1)).await.unwrap();
        }

        let mut links = AdvanceLinkRepository::new(&mut conn);
        let first = links
            .upsert("fa-1", "ft-1", Money::from_cents(10_000), "tester", now)
            .await
            .unwrap();
        let second = links
            .upsert("fa-1", "ft-1", Money::from_cents(5_000), "tester", now)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.amount_cents, 15_000);
        assert_eq!(links.allocated_from("fa-1").await.unwrap().cents(), 15_000);
        assert_eq!(links.allocated_to("ft-1").await.unwrap().cents(), 15_000);
        assert_eq!(links.for_document("ft-1").await.unwrap().len(), 1);
        assert_eq!(links.active_invoice_numbers("fa-1").await.unwrap(), vec!["FT-000001"]);

        let removed = links.delete_for_invoice("ft-1").await.unwrap();
        assert_eq!(removed.len(), 1);
        assert!(links.allocated_from("fa-1").await.unwrap().is_zero());
    }
}
