//! # Stock Movement Repository
//!
//! Append-only stock ledger. Rows are never updated or deleted.

use sqlx::SqliteConnection;

use crate::error::DbResult;
use fiscal_core::StockMovement;

pub struct StockMovementRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> StockMovementRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        StockMovementRepository { conn }
    }

    pub async fn insert(&mut self, movement: &StockMovement) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, product_id, direction, quantity, quantity_before, quantity_after,
                unit_cost_cents, average_cost_before_cents, average_cost_after_cents,
                reference, reason, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.product_id)
        .bind(movement.direction)
        .bind(movement.quantity)
        .bind(movement.quantity_before)
        .bind(movement.quantity_after)
        .bind(movement.unit_cost_cents)
        .bind(movement.average_cost_before_cents)
        .bind(movement.average_cost_after_cents)
        .bind(&movement.reference)
        .bind(movement.reason)
        .bind(&movement.created_by)
        .bind(movement.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Ledger of one product, oldest first.
    pub async fn for_product(&mut self, product_id: &str) -> DbResult<Vec<StockMovement>> {
        let rows = sqlx::query_as::<_, StockMovement>(
            "SELECT * FROM stock_movements WHERE product_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(product_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows)
    }

    /// Movements recorded against a reference (usually a document id).
    pub async fn for_reference(&mut self, reference: &str) -> DbResult<Vec<StockMovement>> {
        let rows = sqlx::query_as::<_, StockMovement>(
            "SELECT * FROM stock_movements WHERE reference = ?1 ORDER BY created_at, rowid",
        )
        .bind(reference)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows)
    }
}
