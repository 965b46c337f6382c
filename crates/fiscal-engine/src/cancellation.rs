//! # Cancellation Handler
//!
//! ## Cancellation Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  already cancelled                         → AlreadyCancelled           │
//! │  active NC / ND / FRt / FT… derived from it → HasActiveDerivedDocuments │
//! │  FA still allocated to a live invoice      → HasActiveDerivedDocuments  │
//! │                                                                         │
//! │  otherwise, in one transaction:                                         │
//! │    1. FT: cancel its active receipts (cascade)                          │
//! │    2. reverse the stock movements booked by the document                │
//! │    3. FT: drop its advance links, recompute each advance                │
//! │    4. mark cancelled (reason, actor, timestamp)                         │
//! │    5. RC: recompute the invoice it settled                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A paid document can be cancelled; for an FT its receipts go with it.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::engine::{load_document, lock_document, FiscalEngine};
use crate::error::EngineResult;
use crate::inventory::{move_stock_in_tx, StockMoveRequest};
use crate::settlement::{recompute_advance, recompute_invoice};
use fiscal_core::{Actor, CoreError, DocumentType, FiscalDocument, StockReason, ValidationError};
use fiscal_db::{AdvanceLinkRepository, DocumentRepository, StockMovementRepository};

impl FiscalEngine {
    /// Cancels a document and everything that must go with it.
    pub async fn cancel(
        &self,
        document_id: &str,
        reason: &str,
        actor: &Actor,
    ) -> EngineResult<FiscalDocument> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ValidationError::required("reason").into());
        }
        if reason.len() > 500 {
            return Err(ValidationError::TooLong {
                field: "reason".to_string(),
                max: 500,
            }
            .into());
        }

        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let document = lock_document(&mut tx, document_id, now).await?;
        let cancelled = cancel_in_tx(&mut tx, document, reason, actor, now).await?;
        tx.commit().await?;

        info!(
            document_id = %cancelled.id,
            number = %cancelled.number,
            document_type = %cancelled.document_type,
            actor = %actor,
            "Document cancelled"
        );
        Ok(cancelled)
    }
}

async fn cancel_in_tx(
    conn: &mut SqliteConnection,
    document: FiscalDocument,
    reason: &str,
    actor: &Actor,
    now: DateTime<Utc>,
) -> EngineResult<FiscalDocument> {
    if document.is_cancelled() {
        return Err(CoreError::AlreadyCancelled {
            document: document.number,
        }
        .into());
    }

    let (receipts, blocking): (Vec<_>, Vec<_>) = DocumentRepository::new(&mut *conn)
        .derived(&document.id)
        .await?
        .into_iter()
        .filter(|derived| !derived.is_cancelled())
        .partition(|derived| derived.document_type == DocumentType::Receipt);

    if !blocking.is_empty() {
        return Err(CoreError::HasActiveDerivedDocuments {
            document: document.number,
            derived: blocking.into_iter().map(|d| d.number).collect(),
        }
        .into());
    }

    if document.document_type == DocumentType::AdvanceInvoice {
        let invoices = AdvanceLinkRepository::new(&mut *conn)
            .active_invoice_numbers(&document.id)
            .await?;
        if !invoices.is_empty() {
            return Err(CoreError::HasActiveDerivedDocuments {
                document: document.number,
                derived: invoices,
            }
            .into());
        }
    }

    // Receipts only ever derive from FT, and carry nothing to reverse
    for receipt in &receipts {
        DocumentRepository::new(&mut *conn)
            .mark_cancelled(&receipt.id, reason, actor.as_str(), now)
            .await?;
        debug!(receipt = %receipt.number, invoice = %document.number, "Receipt cancelled with its invoice");
    }

    if document.document_type.behavior().affects_stock {
        reverse_stock(&mut *conn, &document, actor, now).await?;
    }

    if document.document_type == DocumentType::Invoice {
        let released = AdvanceLinkRepository::new(&mut *conn)
            .delete_for_invoice(&document.id)
            .await?;
        for link in released {
            let advance = recompute_advance(&mut *conn, &link.advance_id, now).await?;
            debug!(advance = %advance.number, amount = %link.amount(), "Advance allocation released");
        }
    }

    DocumentRepository::new(&mut *conn)
        .mark_cancelled(&document.id, reason, actor.as_str(), now)
        .await?;

    if document.document_type == DocumentType::Receipt {
        if let Some(invoice_id) = &document.origin_document_id {
            let invoice = recompute_invoice(&mut *conn, invoice_id, now).await?;
            debug!(invoice = %invoice.number, state = %invoice.state, "Invoice reopened");
        }
    }

    load_document(conn, &document.id).await
}

/// Books the opposite of every movement the document recorded.
async fn reverse_stock(
    conn: &mut SqliteConnection,
    document: &FiscalDocument,
    actor: &Actor,
    now: DateTime<Utc>,
) -> EngineResult<()> {
    let movements = StockMovementRepository::new(&mut *conn)
        .for_reference(&document.id)
        .await?;

    for movement in movements
        .into_iter()
        .filter(|m| m.reason != StockReason::Cancellation)
    {
        let reversal = StockMoveRequest::new(
            movement.product_id,
            movement.quantity,
            movement.direction.reversed(),
            StockReason::Cancellation,
        )
        .with_reference(document.id.clone());
        move_stock_in_tx(&mut *conn, &reversal, actor, now).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::test_support::{
        actor, advance_request, engine_with_series, invoice_request, register_goods,
    };
    use fiscal_core::{DocumentState, EmissionRequest, LineInput, Money, PaymentMethod};

    #[tokio::test]
    async fn test_cancel_requires_reason_and_is_not_repeatable() {
        let engine = engine_with_series().await;
        let invoice = engine.emit(invoice_request(10_000), &actor()).await.unwrap().document;

        let err = engine.cancel(&invoice.id, "  ", &actor()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidDocumentData);

        let cancelled = engine.cancel(&invoice.id, "Wrong client", &actor()).await.unwrap();
        assert_eq!(cancelled.state, DocumentState::Cancelled);
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Wrong client"));
        assert_eq!(cancelled.cancelled_by.as_deref(), Some("tester"));
        assert!(cancelled.cancelled_at.is_some());

        let err = engine.cancel(&invoice.id, "Again", &actor()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyCancelled);
    }

    #[tokio::test]
    async fn test_paid_invoice_cascades_receipts() {
        let engine = engine_with_series().await;
        let invoice = engine.emit(invoice_request(10_000), &actor()).await.unwrap().document;
        engine
            .issue_receipt(&invoice.id, Money::from_cents(5_000), PaymentMethod::Cash, None, &actor())
            .await
            .unwrap();
        engine
            .issue_receipt(&invoice.id, Money::from_cents(6_400), PaymentMethod::Cash, None, &actor())
            .await
            .unwrap();

        engine.cancel(&invoice.id, "Voided", &actor()).await.unwrap();

        let receipts = engine.receipts_for(&invoice.id).await.unwrap();
        assert_eq!(receipts.len(), 2);
        assert!(receipts.iter().all(|r| r.state == DocumentState::Cancelled));
    }

    #[tokio::test]
    async fn test_cancelling_receipt_reopens_invoice() {
        let engine = engine_with_series().await;
        let invoice = engine.emit(invoice_request(10_000), &actor()).await.unwrap().document;
        let settlement = engine
            .issue_receipt(&invoice.id, invoice.net_total(), PaymentMethod::Cash, None, &actor())
            .await
            .unwrap();
        assert_eq!(settlement.invoice.state, DocumentState::Paid);

        engine
            .cancel(&settlement.receipt.id, "Bounced", &actor())
            .await
            .unwrap();
        let invoice = engine.document(&invoice.id).await.unwrap();
        assert_eq!(invoice.state, DocumentState::Emitted);
        assert_eq!(engine.settlement(&invoice.id).await.unwrap().outstanding().cents(), 11_400);
    }

    #[tokio::test]
    async fn test_invoice_cancellation_releases_advance() {
        let engine = engine_with_series().await;
        let advance = engine.emit(advance_request(11_400), &actor()).await.unwrap().document;
        let invoice = engine.emit(invoice_request(10_000), &actor()).await.unwrap().document;
        engine
            .link_advance(&advance.id, &invoice.id, Money::from_cents(11_400), &actor())
            .await
            .unwrap();

        let err = engine.cancel(&advance.id, "Refund", &actor()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::HasActiveDerivedDocuments);

        engine.cancel(&invoice.id, "Voided", &actor()).await.unwrap();
        let advance = engine.document(&advance.id).await.unwrap();
        assert_eq!(advance.state, DocumentState::Emitted);
        assert!(engine.advance_links_for(&advance.id).await.unwrap().is_empty());

        engine.cancel(&advance.id, "Refund", &actor()).await.unwrap();
    }

    #[tokio::test]
    async fn test_credit_note_cancellation_pushes_stock_out_again() {
        let engine = engine_with_series().await;
        let product = register_goods(&engine, "BOLT", 10).await;
        let invoice = engine
            .emit(
                EmissionRequest::new(DocumentType::Invoice)
                    .with_walk_in("Walk-in", None)
                    .with_line(LineInput::new("Bolt", 4, Money::from_cents(500)).with_product(&product.id)),
                &actor(),
            )
            .await
            .unwrap()
            .document;
        let note = engine
            .emit(
                EmissionRequest::new(DocumentType::CreditNote)
                    .with_origin(&invoice.id)
                    .with_line(LineInput::new("Bolt", 2, Money::from_cents(500)).with_product(&product.id)),
                &actor(),
            )
            .await
            .unwrap()
            .document;
        assert_eq!(engine.product(&product.id).await.unwrap().current_stock, 8);

        engine.cancel(&note.id, "Issued by mistake", &actor()).await.unwrap();
        assert_eq!(engine.product(&product.id).await.unwrap().current_stock, 6);

        let ledger = engine.stock_movements(&product.id).await.unwrap();
        let last = ledger.last().unwrap();
        assert_eq!(last.reason, StockReason::Cancellation);
        assert_eq!(last.reference.as_deref(), Some(note.id.as_str()));
    }
}
