//! # Settlement Tracker
//!
//! Receipts (RC) against invoices (FT) and the recomputation every
//! settlement-affecting event runs afterwards.
//!
//! ## Receipt Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  touch(FT)                 write lock before any balance is read        │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  FT? not paid/cancelled/expired?                                        │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  snapshot = net, Σ active RC, Σ advance allocations                     │
//! │  amount <= snapshot.outstanding()  else AmountExceedsOutstandingBalance │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  allocate RC number → insert RC (paid, no lines, no due date)           │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  recompute_invoice(FT) → emitted | partially_paid | paid                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Datelike, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use crate::config::FiscalSettings;
use crate::engine::{ensure_type, load_document, lock_document, FiscalEngine};
use crate::error::EngineResult;
use crate::sequence::allocate_number;
use fiscal_core::integrity::compute_hash;
use fiscal_core::settlement::{
    next_advance_state, next_invoice_state, AdvanceBalance, SettlementSnapshot,
};
use fiscal_core::{
    Actor, CoreError, DocumentState, DocumentType, FiscalDocument, Money, PaymentMethod,
    ValidationError,
};
use fiscal_db::{new_id, AdvanceLinkRepository, DocumentRepository};

/// A receipt and the invoice it settled, after the state recomputation.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub receipt: FiscalDocument,
    pub invoice: FiscalDocument,
}

/// Everything a receipt needs besides the invoice.
pub(crate) struct ReceiptDraft<'a> {
    pub invoice_id: &'a str,
    /// Defaults to the outstanding balance.
    pub amount: Option<Money>,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub emitted_at: DateTime<Utc>,
    pub external_reference: Option<String>,
    pub notes: Option<String>,
}

impl FiscalEngine {
    /// Issues a receipt of `amount` against an FT.
    pub async fn issue_receipt(
        &self,
        invoice_id: &str,
        amount: Money,
        method: PaymentMethod,
        reference: Option<&str>,
        actor: &Actor,
    ) -> EngineResult<Settlement> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let settlement = issue_receipt_in_tx(
            &mut tx,
            &self.config.fiscal,
            ReceiptDraft {
                invoice_id,
                amount: Some(amount),
                method,
                reference: reference.map(str::to_string),
                emitted_at: now,
                external_reference: None,
                notes: None,
            },
            actor,
            now,
        )
        .await?;
        tx.commit().await?;

        info!(
            receipt = %settlement.receipt.number,
            invoice = %settlement.invoice.number,
            amount = %amount,
            state = %settlement.invoice.state,
            actor = %actor,
            "Receipt issued"
        );
        Ok(settlement)
    }
}

pub(crate) async fn issue_receipt_in_tx(
    conn: &mut SqliteConnection,
    settings: &FiscalSettings,
    draft: ReceiptDraft<'_>,
    actor: &Actor,
    now: DateTime<Utc>,
) -> EngineResult<Settlement> {
    let invoice = lock_document(&mut *conn, draft.invoice_id, now).await?;
    ensure_type(&invoice, DocumentType::Invoice, "receipt origin")?;
    if invoice.state == DocumentState::Paid || invoice.state.is_closed() {
        return Err(CoreError::InvalidStateTransition {
            document: invoice.number.clone(),
            state: invoice.state,
            action: "issue a receipt",
        }
        .into());
    }

    let snapshot = invoice_snapshot(&mut *conn, &invoice).await?;
    let amount = draft.amount.unwrap_or_else(|| snapshot.outstanding());
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        }
        .into());
    }
    if let Err(err) = snapshot.check_payment(&invoice.number, amount) {
        warn!(
            invoice = %invoice.number,
            requested = %amount,
            outstanding = %snapshot.outstanding(),
            "Receipt rejected"
        );
        return Err(err.into());
    }

    let allocated = allocate_number(
        &mut *conn,
        DocumentType::Receipt,
        draft.emitted_at.year(),
        now,
    )
    .await?;

    let integrity_hash = compute_hash(
        &allocated.number,
        draft.emitted_at,
        amount,
        invoice.client_id.as_deref(),
        &settings.integrity_secret,
    );
    let receipt = FiscalDocument {
        id: new_id(),
        document_type: DocumentType::Receipt,
        series: allocated.series,
        sequence_number: allocated.sequence,
        fiscal_year: allocated.fiscal_year,
        number: allocated.number,
        emitted_at: draft.emitted_at,
        due_date: None,
        cancelled_at: None,
        client_id: invoice.client_id.clone(),
        client_name: invoice.client_name.clone(),
        client_tax_id: invoice.client_tax_id.clone(),
        origin_document_id: Some(invoice.id.clone()),
        sale_id: None,
        taxable_base_cents: 0,
        vat_cents: 0,
        retention_cents: 0,
        net_total_cents: amount.cents(),
        state: DocumentType::Receipt.behavior().initial_state,
        cancellation_reason: None,
        cancelled_by: None,
        created_by: actor.as_str().to_string(),
        payment_method: Some(draft.method),
        payment_reference: draft.reference,
        integrity_hash,
        external_reference: draft.external_reference,
        notes: draft.notes,
        created_at: now,
        updated_at: now,
    };
    DocumentRepository::new(&mut *conn).insert(&receipt).await?;

    let invoice = recompute_invoice(conn, &invoice.id, now).await?;
    Ok(Settlement { receipt, invoice })
}

/// Net total, active receipts and advance allocations of an FT.
pub(crate) async fn invoice_snapshot(
    conn: &mut SqliteConnection,
    invoice: &FiscalDocument,
) -> EngineResult<SettlementSnapshot> {
    let receipts = DocumentRepository::new(&mut *conn)
        .active_receipts_total(&invoice.id)
        .await?;
    let allocations = AdvanceLinkRepository::new(&mut *conn)
        .allocated_to(&invoice.id)
        .await?;

    Ok(SettlementSnapshot {
        net_total: invoice.net_total(),
        receipts,
        allocations,
    })
}

/// Re-derives an FT's state from its receipts and allocations.
///
/// Idempotent; closed invoices keep their state.
pub(crate) async fn recompute_invoice(
    conn: &mut SqliteConnection,
    invoice_id: &str,
    now: DateTime<Utc>,
) -> EngineResult<FiscalDocument> {
    let mut invoice = load_document(&mut *conn, invoice_id).await?;
    let snapshot = invoice_snapshot(&mut *conn, &invoice).await?;
    let next = next_invoice_state(invoice.state, &snapshot);
    if next != invoice.state {
        DocumentRepository::new(conn)
            .set_state(&invoice.id, next, now)
            .await?;
        debug!(invoice = %invoice.number, from = %invoice.state, to = %next, "Invoice state recomputed");
        invoice.state = next;
        invoice.updated_at = now;
    }
    Ok(invoice)
}

/// Re-derives an FA's state from its allocations.
pub(crate) async fn recompute_advance(
    conn: &mut SqliteConnection,
    advance_id: &str,
    now: DateTime<Utc>,
) -> EngineResult<FiscalDocument> {
    let mut advance = load_document(&mut *conn, advance_id).await?;
    let balance = AdvanceBalance {
        net_total: advance.net_total(),
        allocated: AdvanceLinkRepository::new(&mut *conn)
            .allocated_from(&advance.id)
            .await?,
    };
    let next = next_advance_state(advance.state, &balance);
    if next != advance.state {
        DocumentRepository::new(conn)
            .set_state(&advance.id, next, now)
            .await?;
        debug!(advance = %advance.number, from = %advance.state, to = %next, "Advance state recomputed");
        advance.state = next;
        advance.updated_at = now;
    }
    Ok(advance)
}
