//! # Advance-Link Manager
//!
//! Allocates part of an advance invoice (FA) to a regular invoice (FT).
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  FA 500.00 (emitted)                  FT 1140.00 (emitted)              │
//! │        │                                    ▲                           │
//! │        └──── link 300.00 ───────────────────┘                           │
//! │                                                                         │
//! │  amount <= FA remaining   (500.00 − Σ allocations)                      │
//! │  amount <= FT outstanding (1140.00 − Σ receipts − Σ allocations)        │
//! │                                                                         │
//! │  FA: remaining 200.00 → stays emitted   (0.00 → paid)                   │
//! │  FT: covered 300.00   → partially_paid                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use tracing::{info, warn};

use crate::engine::{ensure_type, lock_document, FiscalEngine};
use crate::error::EngineResult;
use crate::settlement::{invoice_snapshot, recompute_advance, recompute_invoice};
use fiscal_core::settlement::AdvanceBalance;
use fiscal_core::{
    Actor, AdvanceLink, CoreError, DocumentState, DocumentType, FiscalDocument, Money,
    ValidationError,
};
use fiscal_db::AdvanceLinkRepository;

/// Both documents after the link, with the link row.
#[derive(Debug, Clone)]
pub struct AdvanceLinkOutcome {
    pub advance: FiscalDocument,
    pub invoice: FiscalDocument,
    pub link: AdvanceLink,
}

impl FiscalEngine {
    /// Allocates `amount` of an FA to an FT. Linking the same pair again
    /// adds to the existing allocation.
    pub async fn link_advance(
        &self,
        advance_id: &str,
        invoice_id: &str,
        amount: Money,
        actor: &Actor,
    ) -> EngineResult<AdvanceLinkOutcome> {
        if !amount.is_positive() {
            return Err(ValidationError::MustBePositive {
                field: "amount".to_string(),
            }
            .into());
        }

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let advance = lock_document(&mut tx, advance_id, now).await?;
        ensure_type(&advance, DocumentType::AdvanceInvoice, "advance")?;
        if advance.state != DocumentState::Emitted {
            return Err(CoreError::InvalidStateTransition {
                document: advance.number,
                state: advance.state,
                action: "allocate an advance",
            }
            .into());
        }

        let invoice = lock_document(&mut tx, invoice_id, now).await?;
        ensure_type(&invoice, DocumentType::Invoice, "invoice")?;
        if invoice.state == DocumentState::Paid || invoice.state.is_closed() {
            return Err(CoreError::InvalidStateTransition {
                document: invoice.number,
                state: invoice.state,
                action: "receive an advance",
            }
            .into());
        }

        let balance = AdvanceBalance {
            net_total: advance.net_total(),
            allocated: AdvanceLinkRepository::new(&mut tx)
                .allocated_from(&advance.id)
                .await?,
        };
        let snapshot = invoice_snapshot(&mut tx, &invoice).await?;
        let checked = balance
            .check_allocation(&advance.number, amount)
            .and_then(|_| snapshot.check_payment(&invoice.number, amount));
        if let Err(err) = checked {
            warn!(
                advance = %advance.number,
                invoice = %invoice.number,
                requested = %amount,
                remaining = %balance.remaining(),
                outstanding = %snapshot.outstanding(),
                "Advance link rejected"
            );
            return Err(err.into());
        }

        let link = AdvanceLinkRepository::new(&mut tx)
            .upsert(&advance.id, &invoice.id, amount, actor.as_str(), now)
            .await?;
        let advance = recompute_advance(&mut tx, &advance.id, now).await?;
        let invoice = recompute_invoice(&mut tx, &invoice.id, now).await?;
        tx.commit().await?;

        info!(
            advance = %advance.number,
            invoice = %invoice.number,
            amount = %amount,
            advance_state = %advance.state,
            invoice_state = %invoice.state,
            actor = %actor,
            "Advance linked"
        );
        Ok(AdvanceLinkOutcome {
            advance,
            invoice,
            link,
        })
    }
}
