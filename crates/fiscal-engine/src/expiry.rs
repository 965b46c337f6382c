//! # Expiry Sweeper
//!
//! Batch job run by an external scheduler: advance invoices that passed their
//! expected delivery date without ever being allocated become `expired`.

use chrono::{NaiveDate, Utc};
use tracing::info;

use crate::engine::FiscalEngine;
use crate::error::EngineResult;
use fiscal_db::DocumentRepository;

impl FiscalEngine {
    /// Expires every emitted FA due before `as_of` with no advance link.
    /// Returns the number of documents expired.
    pub async fn sweep_expired_advances(&self, as_of: NaiveDate) -> EngineResult<u64> {
        let mut tx = self.db.begin().await?;
        let expired = DocumentRepository::new(&mut tx)
            .expire_overdue_advances(as_of, Utc::now())
            .await?;
        tx.commit().await?;

        info!(as_of = %as_of, expired, "Expired advance sweep complete");
        Ok(expired)
    }
}
