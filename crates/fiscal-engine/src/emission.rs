//! # Emission Orchestrator
//!
//! Turns an [`EmissionRequest`] into a persisted document, in one
//! transaction.
//!
//! ## Emission Steps
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate_emission(request)               (no I/O)                      │
//! │  directory: client exists? sale → client  (no connection held)         │
//! │  ─────────────────────── BEGIN ───────────────────────                  │
//! │  1. allocate number           first write, holds the lock              │
//! │  2. load origin               type allowed? not cancelled?             │
//! │  3. resolve client            explicit → origin → sale → walk-in        │
//! │  4. lines                     product rates, retention, origin lines    │
//! │  5. totals, due date, integrity hash                                   │
//! │  6. insert header + lines                                              │
//! │  7. stock moves               goods lines, direction from registry     │
//! │  8. FT + payment              receipt in the same transaction          │
//! │  ─────────────────────── COMMIT ──────────────────────                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Receipts requested through [`FiscalEngine::emit`] take the settlement
//! path instead.

use chrono::{DateTime, Datelike, Utc};
use sqlx::SqliteConnection;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::FiscalSettings;
use crate::engine::{load_document, FiscalEngine};
use crate::error::EngineResult;
use crate::inventory::{move_stock_in_tx, StockMoveRequest};
use crate::sequence::allocate_number;
use crate::settlement::{issue_receipt_in_tx, ReceiptDraft};
use fiscal_core::integrity::compute_hash;
use fiscal_core::tax::{compute_line, DocumentTotals, LineAmounts, TaxableLine};
use fiscal_core::types::Rate;
use fiscal_core::validation::validate_emission;
use fiscal_core::{
    Actor, CoreError, DocumentLine, DocumentType, EmissionRequest, FiscalDocument, LineInput,
    Product, ValidationError,
};
use fiscal_db::{new_id, DocumentRepository, ProductRepository};

/// Result of an emission.
#[derive(Debug, Clone)]
pub struct Emission {
    pub document: FiscalDocument,
    pub lines: Vec<DocumentLine>,
    /// Receipt generated from an FT's embedded payment.
    pub receipt: Option<FiscalDocument>,
}

/// Who the document is issued to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Counterparty {
    Registered(String),
    WalkIn { name: String, tax_id: Option<String> },
    Unknown,
}

impl Counterparty {
    fn of(document: &FiscalDocument) -> Self {
        match (&document.client_id, &document.client_name) {
            (Some(id), _) => Counterparty::Registered(id.clone()),
            (None, Some(name)) => Counterparty::WalkIn {
                name: name.clone(),
                tax_id: document.client_tax_id.clone(),
            },
            (None, None) => Counterparty::Unknown,
        }
    }

    /// (client_id, client_name, client_tax_id) columns.
    fn into_columns(self) -> (Option<String>, Option<String>, Option<String>) {
        match self {
            Counterparty::Registered(id) => (Some(id), None, None),
            Counterparty::WalkIn { name, tax_id } => (None, Some(name), tax_id),
            Counterparty::Unknown => (None, None, None),
        }
    }
}

impl FiscalEngine {
    /// Emits a document of any type.
    pub async fn emit(&self, request: EmissionRequest, actor: &Actor) -> EngineResult<Emission> {
        validate_emission(&request)?;

        if request.document_type == DocumentType::Receipt {
            return self.emit_receipt(request, actor).await;
        }

        let sale_client = self.resolve_directory(&request).await?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let emission = emit_in_tx(
            &mut tx,
            &self.config.fiscal,
            &request,
            sale_client,
            actor,
            now,
        )
        .await?;
        tx.commit().await?;

        info!(
            document_id = %emission.document.id,
            number = %emission.document.number,
            document_type = %emission.document.document_type,
            net_total = %emission.document.net_total(),
            state = %emission.document.state,
            receipt = ?emission.receipt.as_ref().map(|r| r.number.as_str()),
            actor = %actor,
            "Document emitted"
        );
        Ok(emission)
    }

    async fn emit_receipt(&self, request: EmissionRequest, actor: &Actor) -> EngineResult<Emission> {
        let payment = request
            .payment
            .ok_or_else(|| ValidationError::required("payment"))?;
        let invoice_id = request
            .origin_document_id
            .ok_or_else(|| ValidationError::required("origin_document_id"))?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let settlement = issue_receipt_in_tx(
            &mut tx,
            &self.config.fiscal,
            ReceiptDraft {
                invoice_id: &invoice_id,
                amount: payment.amount,
                method: payment.method,
                reference: payment.reference,
                emitted_at: request.emitted_at.unwrap_or(now),
                external_reference: request.external_reference,
                notes: request.notes,
            },
            actor,
            now,
        )
        .await?;
        tx.commit().await?;

        info!(
            number = %settlement.receipt.number,
            invoice = %settlement.invoice.number,
            amount = %settlement.receipt.net_total(),
            actor = %actor,
            "Receipt emitted"
        );
        Ok(Emission {
            document: settlement.receipt,
            lines: Vec::new(),
            receipt: None,
        })
    }

    /// Checks the explicit client and returns the client of a referenced sale.
    async fn resolve_directory(&self, request: &EmissionRequest) -> EngineResult<Option<String>> {
        if let Some(client_id) = non_blank(&request.client_id) {
            let client = self
                .directory
                .find_client(&client_id)
                .await?
                .ok_or_else(|| CoreError::not_found("client", client_id.as_str()))?;
            debug!(client_id = %client.id, client = %client.name, "Client resolved");
        }

        match non_blank(&request.sale_id) {
            Some(sale_id) => {
                let sale = self
                    .directory
                    .find_sale(&sale_id)
                    .await?
                    .ok_or_else(|| CoreError::not_found("sale", sale_id.as_str()))?;
                Ok(sale.client_id)
            }
            None => Ok(None),
        }
    }
}

async fn emit_in_tx(
    conn: &mut SqliteConnection,
    settings: &FiscalSettings,
    request: &EmissionRequest,
    sale_client: Option<String>,
    actor: &Actor,
    now: DateTime<Utc>,
) -> EngineResult<Emission> {
    let document_type = request.document_type;
    let behavior = document_type.behavior();
    let emitted_at = request.emitted_at.unwrap_or(now);

    let allocated = allocate_number(&mut *conn, document_type, emitted_at.year(), now).await?;

    let origin = match non_blank(&request.origin_document_id) {
        Some(origin_id) => Some(load_origin(&mut *conn, document_type, &origin_id).await?),
        None => None,
    };

    let counterparty = resolve_counterparty(request, origin.as_ref(), sale_client);
    if behavior.requires_client && origin.is_none() && counterparty == Counterparty::Unknown {
        return Err(ValidationError::required("client_id").into());
    }

    let document_id = new_id();
    let mut lines = Vec::with_capacity(request.lines.len());
    let mut totals = DocumentTotals::default();
    let mut credited: HashMap<String, i64> = HashMap::new();
    for (index, input) in request.lines.iter().enumerate() {
        let (line, amounts) = build_line(
            &mut *conn,
            settings,
            LineContext {
                document_id: &document_id,
                document_type,
                origin: origin.as_ref(),
                display_order: index as i64,
                now,
            },
            input,
            &mut credited,
        )
        .await?;
        totals += &amounts;
        lines.push(line);
    }

    let (payment_method, payment_reference) = match &request.payment {
        Some(payment) if behavior.requires_payment => {
            if let Some(amount) = payment.amount {
                if amount != totals.net_total {
                    return Err(ValidationError::inconsistent(format!(
                        "{} is paid in full at emission: payment {} differs from total {}",
                        document_type, amount, totals.net_total
                    ))
                    .into());
                }
            }
            (Some(payment.method), non_blank(&payment.reference))
        }
        _ => (None, None),
    };

    let (client_id, client_name, client_tax_id) = counterparty.into_columns();
    let integrity_hash = compute_hash(
        &allocated.number,
        emitted_at,
        totals.net_total,
        client_id.as_deref(),
        &settings.integrity_secret,
    );

    let document = FiscalDocument {
        id: document_id,
        document_type,
        series: allocated.series,
        sequence_number: allocated.sequence,
        fiscal_year: allocated.fiscal_year,
        number: allocated.number,
        emitted_at,
        due_date: behavior.due_date(emitted_at.date_naive(), request.due_date),
        cancelled_at: None,
        client_id,
        client_name,
        client_tax_id,
        origin_document_id: origin.as_ref().map(|o| o.id.clone()),
        sale_id: non_blank(&request.sale_id),
        taxable_base_cents: totals.taxable_base.cents(),
        vat_cents: totals.vat.cents(),
        retention_cents: totals.retention.cents(),
        net_total_cents: totals.net_total.cents(),
        state: behavior.initial_state,
        cancellation_reason: None,
        cancelled_by: None,
        created_by: actor.as_str().to_string(),
        payment_method,
        payment_reference,
        integrity_hash,
        external_reference: non_blank(&request.external_reference),
        notes: non_blank(&request.notes),
        created_at: now,
        updated_at: now,
    };

    let mut documents = DocumentRepository::new(&mut *conn);
    documents.insert(&document).await?;
    for line in &lines {
        documents.insert_line(line).await?;
    }

    if behavior.affects_stock {
        for line in lines.iter().filter(|line| !line.is_service) {
            if let Some(product_id) = &line.product_id {
                let movement = StockMoveRequest::new(
                    product_id.clone(),
                    line.quantity,
                    behavior.stock_direction,
                    behavior.stock_reason,
                )
                .with_reference(document.id.clone());
                move_stock_in_tx(&mut *conn, &movement, actor, now).await?;
            }
        }
    }

    let mut emission = Emission {
        document,
        lines,
        receipt: None,
    };

    if behavior.generates_receipt_on_emission {
        if let Some(payment) = &request.payment {
            let settlement = issue_receipt_in_tx(
                conn,
                settings,
                ReceiptDraft {
                    invoice_id: &emission.document.id,
                    amount: Some(payment.amount.unwrap_or_else(|| emission.document.net_total())),
                    method: payment.method,
                    reference: non_blank(&payment.reference),
                    emitted_at,
                    external_reference: None,
                    notes: None,
                },
                actor,
                now,
            )
            .await?;
            emission.document = settlement.invoice;
            emission.receipt = Some(settlement.receipt);
        }
    }

    Ok(emission)
}

/// Loads the origin document and checks it can be derived from.
async fn load_origin(
    conn: &mut SqliteConnection,
    document_type: DocumentType,
    origin_id: &str,
) -> EngineResult<FiscalDocument> {
    let origin = load_document(conn, origin_id).await?;

    if !document_type.accepts_origin(origin.document_type) {
        return Err(ValidationError::NotAllowed {
            field: format!("origin of {}", document_type),
            allowed: document_type
                .behavior()
                .allowed_origins
                .iter()
                .map(|t| t.code().to_string())
                .collect(),
        }
        .into());
    }
    if origin.is_cancelled() {
        return Err(ValidationError::inconsistent(format!(
            "origin document {} is cancelled",
            origin.number
        ))
        .into());
    }

    Ok(origin)
}

/// Explicit client, origin's client, sale's client, walk-in name, in that order.
fn resolve_counterparty(
    request: &EmissionRequest,
    origin: Option<&FiscalDocument>,
    sale_client: Option<String>,
) -> Counterparty {
    if let Some(id) = non_blank(&request.client_id) {
        return Counterparty::Registered(id);
    }
    if let Some(inherited) = origin.map(Counterparty::of) {
        if inherited != Counterparty::Unknown {
            return inherited;
        }
    }
    if let Some(id) = sale_client {
        return Counterparty::Registered(id);
    }
    match non_blank(&request.client_name) {
        Some(name) => Counterparty::WalkIn {
            name,
            tax_id: non_blank(&request.client_tax_id),
        },
        None => Counterparty::Unknown,
    }
}

struct LineContext<'a> {
    document_id: &'a str,
    document_type: DocumentType,
    origin: Option<&'a FiscalDocument>,
    display_order: i64,
    now: DateTime<Utc>,
}

/// Resolves rates and computes the amounts of one line.
///
/// Rates: the line's own, else the product's, else the configured default.
/// Only service lines carry retention.
async fn build_line(
    conn: &mut SqliteConnection,
    settings: &FiscalSettings,
    ctx: LineContext<'_>,
    input: &LineInput,
    credited: &mut HashMap<String, i64>,
) -> EngineResult<(DocumentLine, LineAmounts)> {
    let product = match &input.product_id {
        Some(product_id) => Some(load_product(&mut *conn, product_id).await?),
        None => None,
    };

    if let Some(origin_line_id) = &input.origin_line_id {
        check_origin_line(&mut *conn, &ctx, origin_line_id, input.quantity, credited).await?;
    }

    // A product line takes its kind from the product; the flag only
    // classifies free-text lines.
    let is_service = match (&product, input.is_service) {
        (Some(product), Some(flag)) if flag != product.is_service() => {
            return Err(ValidationError::inconsistent(format!(
                "line for {} cannot override the product kind ({})",
                product.sku,
                if product.is_service() { "service" } else { "goods" }
            ))
            .into());
        }
        (Some(product), _) => product.is_service(),
        (None, flag) => flag.unwrap_or(false),
    };
    let vat_rate = input
        .vat_rate
        .or_else(|| product.as_ref().map(Product::vat_rate))
        .unwrap_or_else(|| settings.default_vat_rate());
    let retention_rate = if is_service {
        input
            .retention_rate
            .or_else(|| product.as_ref().and_then(Product::retention_rate))
            .unwrap_or_else(|| settings.default_retention_rate())
    } else {
        Rate::zero()
    };

    let amounts = compute_line(&TaxableLine {
        quantity: input.quantity,
        unit_price: input.unit_price,
        discount: input.discount,
        vat_applicable: input.vat_applicable,
        vat_rate,
        is_service,
        retention_rate,
    });

    let description = match (input.description.trim(), &product) {
        ("", Some(product)) => product.name.clone(),
        (text, _) => text.to_string(),
    };

    let line = DocumentLine {
        id: new_id(),
        document_id: ctx.document_id.to_string(),
        product_id: input.product_id.clone(),
        origin_line_id: input.origin_line_id.clone(),
        description,
        quantity: input.quantity,
        unit_price_cents: input.unit_price.cents(),
        discount_cents: input.discount.cents(),
        taxable_base_cents: amounts.base.cents(),
        vat_rate_bps: if input.vat_applicable { vat_rate.bps() } else { 0 },
        vat_cents: amounts.vat.cents(),
        retention_rate_bps: retention_rate.bps(),
        retention_cents: amounts.retention.cents(),
        line_total_cents: amounts.total.cents(),
        is_service,
        display_order: ctx.display_order,
        created_at: ctx.now,
    };

    Ok((line, amounts))
}

async fn load_product(conn: &mut SqliteConnection, product_id: &str) -> EngineResult<Product> {
    let product = ProductRepository::new(conn)
        .get(product_id)
        .await?
        .ok_or_else(|| CoreError::not_found("product", product_id))?;
    if !product.is_active {
        return Err(ValidationError::inconsistent(format!(
            "product {} is inactive",
            product.sku
        ))
        .into());
    }
    Ok(product)
}

/// A copied line must belong to the origin document, and a credit note
/// cannot credit more units than the origin line carried.
async fn check_origin_line(
    conn: &mut SqliteConnection,
    ctx: &LineContext<'_>,
    origin_line_id: &str,
    quantity: i64,
    credited: &mut HashMap<String, i64>,
) -> EngineResult<()> {
    let origin = ctx.origin.ok_or_else(|| {
        ValidationError::inconsistent("origin_line_id requires an origin document")
    })?;

    let mut documents = DocumentRepository::new(conn);
    let origin_line = documents
        .line(origin_line_id)
        .await?
        .ok_or_else(|| CoreError::not_found("document line", origin_line_id))?;
    if origin_line.document_id != origin.id {
        return Err(ValidationError::inconsistent(format!(
            "line {} does not belong to {}",
            origin_line_id, origin.number
        ))
        .into());
    }

    if ctx.document_type == DocumentType::CreditNote {
        let pending = credited.entry(origin_line_id.to_string()).or_insert(0);
        let already = documents.credited_quantity(origin_line_id).await? + *pending;
        let remaining = origin_line.quantity - already;
        if quantity > remaining {
            return Err(ValidationError::inconsistent(format!(
                "cannot credit {} units of line {} of {}: {} of {} left",
                quantity, origin_line.display_order, origin.number, remaining.max(0), origin_line.quantity
            ))
            .into());
        }
        *pending += quantity;
    }

    Ok(())
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::inventory::ProductDraft;
    use crate::test_support::{actor, engine_with_series, invoice_request, register_goods};
    use fiscal_core::{DocumentState, Money, PaymentInput, PaymentMethod};

    #[tokio::test]
    async fn test_invoice_totals_and_due_date() {
        let engine = engine_with_series().await;
        let emission = engine.emit(invoice_request(100_000), &actor()).await.unwrap();
        let doc = &emission.document;

        assert_eq!(doc.document_type, DocumentType::Invoice);
        assert_eq!(doc.state, DocumentState::Emitted);
        assert_eq!(doc.taxable_base().cents(), 100_000);
        assert_eq!(doc.vat().cents(), 14_000);
        assert_eq!(doc.net_total().cents(), 114_000);
        assert_eq!(
            doc.due_date,
            Some(doc.emitted_at.date_naive() + chrono::Duration::days(30))
        );
        assert_eq!(
            emission.lines.iter().map(|l| l.line_total_cents).sum::<i64>(),
            doc.net_total_cents
        );
        assert!(engine.verify_integrity(&doc.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_service_line_retention_from_default() {
        let engine = engine_with_series().await;
        let request = EmissionRequest::new(DocumentType::Invoice)
            .with_walk_in("Walk-in", None)
            .with_line(LineInput::new("Consulting", 1, Money::from_cents(100_000)).service());

        let emission = engine.emit(request, &actor()).await.unwrap();
        let line = &emission.lines[0];
        assert_eq!(line.retention_rate_bps, 650);
        assert_eq!(line.retention_cents, 6_500);
        assert_eq!(line.vat_cents, 14_000);
        assert_eq!(line.line_total_cents, 107_500);
        assert_eq!(emission.document.retention().cents(), 6_500);
    }

    #[tokio::test]
    async fn test_invoice_with_payment_generates_receipt() {
        let engine = engine_with_series().await;
        let request = invoice_request(100_000).with_payment(PaymentInput::new(PaymentMethod::Cash));

        let emission = engine.emit(request, &actor()).await.unwrap();
        let receipt = emission.receipt.expect("receipt");
        assert_eq!(receipt.document_type, DocumentType::Receipt);
        assert_eq!(receipt.net_total().cents(), 114_000);
        assert_eq!(emission.document.state, DocumentState::Paid);
    }

    #[tokio::test]
    async fn test_invoice_overpayment_rolls_back_everything() {
        let engine = engine_with_series().await;
        let request = invoice_request(100_000)
            .with_payment(PaymentInput::new(PaymentMethod::Cash).amount(Money::from_cents(200_000)));

        let err = engine.emit(request, &actor()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AmountExceedsOutstandingBalance);

        // Counter went back with the rollback
        let next = engine.emit(invoice_request(100_000), &actor()).await.unwrap();
        assert_eq!(next.document.sequence_number, 1);
    }

    #[tokio::test]
    async fn test_invoice_receipt_is_paid_at_emission() {
        let engine = engine_with_series().await;
        let request = EmissionRequest::new(DocumentType::InvoiceReceipt)
            .with_line(LineInput::new("Cable", 2, Money::from_cents(1_000)))
            .with_payment(PaymentInput::new(PaymentMethod::Card).reference("POS-1"));

        let emission = engine.emit(request, &actor()).await.unwrap();
        assert_eq!(emission.document.state, DocumentState::Paid);
        assert_eq!(emission.document.payment_method, Some(PaymentMethod::Card));
        assert_eq!(emission.document.due_date, Some(emission.document.emitted_at.date_naive()));
        assert!(emission.receipt.is_none());
    }

    #[tokio::test]
    async fn test_goods_line_moves_stock_out() {
        let engine = engine_with_series().await;
        let product = register_goods(&engine, "BOLT", 10).await;
        let request = EmissionRequest::new(DocumentType::Invoice)
            .with_walk_in("Walk-in", None)
            .with_line(LineInput::new("", 4, Money::from_cents(500)).with_product(&product.id));

        let emission = engine.emit(request, &actor()).await.unwrap();
        assert_eq!(emission.lines[0].description, product.name);
        assert_eq!(engine.product(&product.id).await.unwrap().current_stock, 6);

        let ledger = engine.stock_movements(&product.id).await.unwrap();
        let sale = ledger.last().unwrap();
        assert_eq!(sale.reference.as_deref(), Some(emission.document.id.as_str()));
    }

    #[tokio::test]
    async fn test_product_kind_decides_service_treatment() {
        let engine = engine_with_series().await;
        let goods = register_goods(&engine, "BOLT", 10).await;

        let err = engine
            .emit(
                EmissionRequest::new(DocumentType::Invoice)
                    .with_walk_in("Walk-in", None)
                    .with_line(
                        LineInput::new("Bolt", 4, Money::from_cents(10_000))
                            .with_product(&goods.id)
                            .service(),
                    ),
                &actor(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidDocumentData);
        assert_eq!(engine.product(&goods.id).await.unwrap().current_stock, 10);
        assert_eq!(engine.stock_movements(&goods.id).await.unwrap().len(), 1);

        let service = engine
            .register_product(
                ProductDraft::service("HOUR", "Consulting", Rate::from_bps(1400)),
                &actor(),
            )
            .await
            .unwrap();
        let emission = engine
            .emit(
                EmissionRequest::new(DocumentType::Invoice)
                    .with_walk_in("Walk-in", None)
                    .with_line(
                        LineInput::new("", 1, Money::from_cents(100_000))
                            .with_product(&service.id)
                            .service(),
                    )
                    .with_line(LineInput::new("Bolt", 2, Money::from_cents(1_000)).with_product(&goods.id)),
                &actor(),
            )
            .await
            .unwrap();
        assert!(emission.lines[0].is_service);
        assert_eq!(emission.lines[0].retention_cents, 6_500);
        assert!(!emission.lines[1].is_service);
        assert_eq!(emission.lines[1].retention_cents, 0);
        assert_eq!(engine.product(&goods.id).await.unwrap().current_stock, 8);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_emission() {
        let engine = engine_with_series().await;
        let product = register_goods(&engine, "BOLT", 3).await;
        let request = EmissionRequest::new(DocumentType::Invoice)
            .with_walk_in("Walk-in", None)
            .with_line(LineInput::new("Bolt", 5, Money::from_cents(500)).with_product(&product.id));

        let err = engine.emit(request, &actor()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InsufficientStock);
        assert_eq!(engine.product(&product.id).await.unwrap().current_stock, 3);
    }

    #[tokio::test]
    async fn test_credit_note_rules() {
        let engine = engine_with_series().await;
        let product = register_goods(&engine, "BOLT", 10).await;
        let invoice = engine
            .emit(
                EmissionRequest::new(DocumentType::Invoice)
                    .with_walk_in("Maria", Some("123456789".into()))
                    .with_line(LineInput::new("Bolt", 4, Money::from_cents(500)).with_product(&product.id)),
                &actor(),
            )
            .await
            .unwrap();
        let origin_line = &invoice.lines[0];

        let credit = |quantity| {
            EmissionRequest::new(DocumentType::CreditNote)
                .with_origin(&invoice.document.id)
                .with_line(
                    LineInput::new("Return", quantity, Money::from_cents(500))
                        .with_product(&product.id)
                        .with_origin_line(&origin_line.id),
                )
        };

        let note = engine.emit(credit(3), &actor()).await.unwrap();
        assert_eq!(note.document.client_name.as_deref(), Some("Maria"));
        assert!(note.document.due_date.is_none());
        assert_eq!(engine.product(&product.id).await.unwrap().current_stock, 9);

        // Only one unit left to credit
        let err = engine.emit(credit(2), &actor()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidDocumentData);

        // Proforma is not a valid origin for a credit note
        let proforma = engine
            .emit(
                EmissionRequest::new(DocumentType::Proforma)
                    .with_line(LineInput::new("Quote", 1, Money::from_cents(100))),
                &actor(),
            )
            .await
            .unwrap();
        let err = engine
            .emit(
                EmissionRequest::new(DocumentType::CreditNote)
                    .with_origin(&proforma.document.id)
                    .with_line(LineInput::new("Return", 1, Money::from_cents(100))),
                &actor(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidDocumentData);
    }

    #[tokio::test]
    async fn test_client_resolution_through_directory() {
        let engine = engine_with_series().await;

        let err = engine
            .emit(
                EmissionRequest::new(DocumentType::Invoice)
                    .with_client("unknown")
                    .with_line(LineInput::new("Item", 1, Money::from_cents(100))),
                &actor(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let emission = engine
            .emit(
                EmissionRequest::new(DocumentType::Invoice)
                    .with_sale("sale-1")
                    .with_line(LineInput::new("Item", 1, Money::from_cents(100))),
                &actor(),
            )
            .await
            .unwrap();
        assert_eq!(emission.document.client_id.as_deref(), Some("client-1"));
        assert_eq!(emission.document.sale_id.as_deref(), Some("sale-1"));

        // A sale without a client leaves the invoice without one
        let err = engine
            .emit(
                EmissionRequest::new(DocumentType::Invoice)
                    .with_sale("sale-anonymous")
                    .with_line(LineInput::new("Item", 1, Money::from_cents(100))),
                &actor(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidDocumentData);
    }

    #[tokio::test]
    async fn test_origin_client_wins_over_walk_in_name() {
        let engine = engine_with_series().await;
        let invoice = engine
            .emit(
                EmissionRequest::new(DocumentType::Invoice)
                    .with_client("client-1")
                    .with_line(LineInput::new("Item", 1, Money::from_cents(10_000))),
                &actor(),
            )
            .await
            .unwrap()
            .document;

        let note = engine
            .emit(
                EmissionRequest::new(DocumentType::CreditNote)
                    .with_origin(&invoice.id)
                    .with_walk_in("Someone else", None)
                    .with_line(LineInput::new("Discount", 1, Money::from_cents(1_000))),
                &actor(),
            )
            .await
            .unwrap()
            .document;
        assert_eq!(note.client_id.as_deref(), Some("client-1"));
        assert!(note.client_name.is_none());
    }

    #[tokio::test]
    async fn test_anonymous_proforma_converts_into_invoice() {
        let engine = engine_with_series().await;
        let proforma = engine
            .emit(
                EmissionRequest::new(DocumentType::Proforma)
                    .with_line(LineInput::new("Quote", 1, Money::from_cents(5_000))),
                &actor(),
            )
            .await
            .unwrap()
            .document;

        let invoice = engine
            .emit(
                EmissionRequest::new(DocumentType::Invoice)
                    .with_origin(&proforma.id)
                    .with_line(LineInput::new("Quote", 1, Money::from_cents(5_000))),
                &actor(),
            )
            .await
            .unwrap()
            .document;
        assert!(invoice.client_id.is_none());
        assert!(invoice.client_name.is_none());
        assert_eq!(invoice.origin_document_id.as_deref(), Some(proforma.id.as_str()));

        // A walk-in name still applies when the origin names nobody
        let named = engine
            .emit(
                EmissionRequest::new(DocumentType::Invoice)
                    .with_origin(&proforma.id)
                    .with_walk_in("Maria", None)
                    .with_line(LineInput::new("Quote", 1, Money::from_cents(5_000))),
                &actor(),
            )
            .await
            .unwrap()
            .document;
        assert_eq!(named.client_name.as_deref(), Some("Maria"));
    }

    #[tokio::test]
    async fn test_advance_due_date_is_expected_delivery() {
        let engine = engine_with_series().await;
        let delivery = chrono::NaiveDate::from_ymd_opt(2030, 6, 1).unwrap();
        let emission = engine
            .emit(
                EmissionRequest::new(DocumentType::AdvanceInvoice)
                    .with_client("client-1")
                    .due_on(delivery)
                    .with_line(LineInput::new("Deposit", 1, Money::from_cents(50_000)).without_vat()),
                &actor(),
            )
            .await
            .unwrap();
        assert_eq!(emission.document.due_date, Some(delivery));
        assert_eq!(emission.document.net_total().cents(), 50_000);
    }

    #[tokio::test]
    async fn test_no_active_series() {
        let engine = crate::test_support::engine().await;
        let err = engine.emit(invoice_request(100), &actor()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoActiveSeries);
    }
}
