//! # Sequence Allocator
//!
//! Hands out document numbers and administers the series they come from.
//!
//! ## Numbering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  allocate(FT, 2025)                                                     │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  fiscal_series: FT / "FT2025" / 2025 / last_number 41 → 42              │
//! │     │            (year-specific series preferred over yearless)        │
//! │     ▼                                                                   │
//! │  "FT2025-000042"                                                        │
//! │                                                                         │
//! │  Runs inside the caller's transaction: a rollback returns the number.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::engine::FiscalEngine;
use crate::error::EngineResult;
use fiscal_core::validation::validate_series_label;
use fiscal_core::{format_number, Actor, CoreError, DocumentType, FiscalSeries, ValidationError};
use fiscal_db::SeriesRepository;

/// A number taken from a series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AllocatedNumber {
    pub series: String,
    pub sequence: i64,
    pub fiscal_year: Option<i32>,
    pub number: String,
}

/// Increments the active series for the type and year.
pub(crate) async fn allocate_number(
    conn: &mut SqliteConnection,
    document_type: DocumentType,
    year: i32,
    now: DateTime<Utc>,
) -> EngineResult<AllocatedNumber> {
    let series = SeriesRepository::new(conn)
        .allocate(document_type, year, now)
        .await?
        .ok_or(CoreError::NoActiveSeries {
            document_type,
            year,
        })?;

    let number = format_number(&series.series, series.last_number);
    debug!(number = %number, document_type = %document_type, "Number allocated");

    Ok(AllocatedNumber {
        series: series.series,
        sequence: series.last_number,
        fiscal_year: series.year,
        number,
    })
}

impl FiscalEngine {
    /// Opens a new active series with its counter at zero.
    ///
    /// `year: None` creates a series that serves every year without a
    /// year-specific one.
    pub async fn create_series(
        &self,
        document_type: DocumentType,
        series: &str,
        year: Option<i32>,
        actor: &Actor,
    ) -> EngineResult<FiscalSeries> {
        validate_series_label(series)?;
        if let Some(year) = year {
            if !(2000..=9999).contains(&year) {
                return Err(ValidationError::OutOfRange {
                    field: "year".to_string(),
                    min: 2000,
                    max: 9999,
                }
                .into());
            }
        }

        let mut tx = self.db.begin().await?;
        let created = SeriesRepository::new(&mut tx)
            .insert(document_type, series, year, Utc::now())
            .await?;
        tx.commit().await?;

        info!(
            series = %created.series,
            document_type = %document_type,
            year = ?year,
            actor = %actor,
            "Series created"
        );
        Ok(created)
    }

    /// Stops a series from issuing numbers. Issued documents are unaffected.
    pub async fn deactivate_series(&self, id: &str, actor: &Actor) -> EngineResult<FiscalSeries> {
        let mut tx = self.db.begin().await?;
        let mut repo = SeriesRepository::new(&mut tx);
        if !repo.deactivate(id, Utc::now()).await? {
            return Err(CoreError::not_found("series", id).into());
        }
        let series = repo
            .get(id)
            .await?
            .ok_or_else(|| CoreError::not_found("series", id))?;
        tx.commit().await?;

        info!(series = %series.series, actor = %actor, "Series deactivated");
        Ok(series)
    }
}
