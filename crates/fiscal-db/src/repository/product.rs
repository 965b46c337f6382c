//! # Product Repository
//!
//! Stock-relevant product data. Quantity and average cost are written only
//! through [`ProductRepository::update_position`], which the inventory costing
//! engine calls after [`ProductRepository::lock`].

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use fiscal_core::{Money, Product};

/// Repository for product database operations.
pub struct ProductRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ProductRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        ProductRepository { conn }
    }

    pub async fn insert(&mut self, product: &Product) -> DbResult<()> {
        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, kind, vat_rate_bps, retention_rate_bps,
                current_stock, min_stock, average_cost_cents, is_active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.kind)
        .bind(product.vat_rate_bps)
        .bind(product.retention_rate_bps)
        .bind(product.current_stock)
        .bind(product.min_stock)
        .bind(product.average_cost_cents)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    pub async fn get(&mut self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(product)
    }

    /// Writes `updated_at` so the transaction holds the write lock before
    /// the stock position is read. Returns false if the product doesn't exist.
    pub async fn lock(&mut self, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query("UPDATE products SET updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(now)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update_position(
        &mut self,
        id: &str,
        quantity: i64,
        average_cost: Money,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE products SET
                current_stock = ?2,
                average_cost_cents = ?3,
                updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(average_cost.cents())
        .bind(now)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Active goods at or below their minimum stock.
    pub async fn low_stock(&mut self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
             WHERE is_active = 1
               AND kind = 'goods'
               AND current_stock <= min_stock
             ORDER BY current_stock, sku
            "#,
        )
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(products)
    }

    pub async fn count(&mut self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&mut *self.conn)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{memory_db, product};
    use fiscal_core::ProductKind;

    #[tokio::test]
    async fn test_insert_get_and_update_position() {
        let db = memory_db().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = ProductRepository::new(&mut conn);
        let now = Utc::now();

        repo.insert(&product("p-1", "BOLT-M8", ProductKind::Goods, 5)).await.unwrap();
        assert!(repo.lock("p-1", now).await.unwrap());
        assert!(!repo.lock("p-x", now).await.unwrap());

        repo.update_position("p-1", 15, Money::from_cents(9_333), now).await.unwrap();
        let loaded = repo.get("p-1").await.unwrap().unwrap();
        assert_eq!(loaded.current_stock, 15);
        assert_eq!(loaded.average_cost().cents(), 9_333);
        assert_eq!(loaded.kind, ProductKind::Goods);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_low_stock_excludes_services() {
        let db = memory_db().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = ProductRepository::new(&mut conn);

        repo.insert(&product("p-1", "LOW", ProductKind::Goods, 1)).await.unwrap();
        repo.insert(&product("p-2", "OK", ProductKind::Goods, 50)).await.unwrap();
        repo.insert(&product("p-3", "SRV", ProductKind::Service, 0)).await.unwrap();

        let low = repo.low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].sku, "LOW");
    }
}
