//! # Series Repository
//!
//! Numbering series and counter allocation.
//!
//! ## Allocation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPDATE fiscal_series SET last_number = last_number + 1                 │
//! │   WHERE id = (active series for type, year-specific before yearless)   │
//! │  RETURNING *                                                            │
//! │                                                                         │
//! │  One statement: the increment is the first write of the transaction,  │
//! │  so it takes SQLite's write lock and holds it until commit. A second   │
//! │  emitter waits on the busy timeout and then sees the new counter.      │
//! │  Rollback undoes the increment together with the document.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::new_id;
use fiscal_core::{DocumentType, FiscalSeries};

/// Repository for series operations.
pub struct SeriesRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> SeriesRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        SeriesRepository { conn }
    }

    /// Creates an active series with its counter at zero.
    pub async fn insert(
        &mut self,
        document_type: DocumentType,
        series: &str,
        year: Option<i32>,
        now: DateTime<Utc>,
    ) -> DbResult<FiscalSeries> {
        let row = sqlx::query_as::<_, FiscalSeries>(
            r#"
            INSERT INTO fiscal_series (id, document_type, series, year, last_number, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 0, 1, ?5, ?5)
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(document_type)
        .bind(series)
        .bind(year)
        .bind(now)
        .fetch_one(&mut *self.conn)
        .await?;

        debug!(series = %row.series, document_type = %document_type, "Series created");
        Ok(row)
    }

    /// Increments the counter of the active series matching the type and
    /// year and returns the updated row. `None` when no series matches.
    ///
    /// A series for the exact year wins over a yearless one.
    pub async fn allocate(
        &mut self,
        document_type: DocumentType,
        year: i32,
        now: DateTime<Utc>,
    ) -> DbResult<Option<FiscalSeries>> {
        let row = sqlx::query_as::<_, FiscalSeries>(
            r#"
            UPDATE fiscal_series
               SET last_number = last_number + 1,
                   updated_at = ?3
             WHERE id = (
                   SELECT id FROM fiscal_series
                    WHERE document_type = ?1
                      AND is_active = 1
                      AND (year = ?2 OR year IS NULL)
                    ORDER BY year IS NULL, created_at
                    LIMIT 1)
            RETURNING *
            "#,
        )
        .bind(document_type)
        .bind(year)
        .bind(now)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(row)
    }

    /// Deactivates a series. Returns false if it doesn't exist.
    pub async fn deactivate(&mut self, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query("UPDATE fiscal_series SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(now)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get(&mut self, id: &str) -> DbResult<Option<FiscalSeries>> {
        let row = sqlx::query_as::<_, FiscalSeries>("SELECT * FROM fiscal_series WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(row)
    }

    pub async fn list(&mut self) -> DbResult<Vec<FiscalSeries>> {
        let rows = sqlx::query_as::<_, FiscalSeries>(
            "SELECT * FROM fiscal_series ORDER BY document_type, year, series",
        )
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::test_support::memory_db;

    #[tokio::test]
    async fn test_allocate_increments_counter() {
        let db = memory_db().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = SeriesRepository::new(&mut conn);
        let now = Utc::now();

        repo.insert(DocumentType::Invoice, "FT2025", Some(2025), now).await.unwrap();

        let first = repo.allocate(DocumentType::Invoice, 2025, now).await.unwrap().unwrap();
        let second = repo.allocate(DocumentType::Invoice, 2025, now).await.unwrap().unwrap();
        assert_eq!(first.last_number, 1);
        assert_eq!(second.last_number, 2);
        assert_eq!(second.series, "FT2025");
    }

    #[tokio::test]
    async fn test_year_specific_series_wins_over_yearless() {
        let db = memory_db().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = SeriesRepository::new(&mut conn);
        let now = Utc::now();

        repo.insert(DocumentType::Invoice, "FT", None, now).await.unwrap();
        repo.insert(DocumentType::Invoice, "FT2025", Some(2025), now).await.unwrap();

        let row = repo.allocate(DocumentType::Invoice, 2025, now).await.unwrap().unwrap();
        assert_eq!(row.series, "FT2025");

        // Other years fall back to the yearless series
        let row = repo.allocate(DocumentType::Invoice, 2026, now).await.unwrap().unwrap();
        assert_eq!(row.series, "FT");
    }

    #[tokio::test]
    async fn test_no_matching_series() {
        let db = memory_db().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = SeriesRepository::new(&mut conn);
        let now = Utc::now();

        let series = repo.insert(DocumentType::Invoice, "FT2024", Some(2024), now).await.unwrap();
        assert!(repo.allocate(DocumentType::Invoice, 2025, now).await.unwrap().is_none());
        assert!(repo.allocate(DocumentType::Receipt, 2024, now).await.unwrap().is_none());

        assert!(repo.deactivate(&series.id, now).await.unwrap());
        assert!(repo.allocate(DocumentType::Invoice, 2024, now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_series_rejected() {
        let db = memory_db().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = SeriesRepository::new(&mut conn);
        let now = Utc::now();

        repo.insert(DocumentType::Invoice, "FT", None, now).await.unwrap();
        let err = repo.insert(DocumentType::Invoice, "FT", None, now).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }
}
