//! End-to-end document lifecycle against an in-memory database.

mod common;

use common::{actor, goods, invoice, memory_engine};
use fiscal_core::types::Rate;
use fiscal_core::{
    DocumentState, DocumentType, EmissionRequest, LineInput, Money, PaymentMethod, StockDirection,
    StockReason,
};
use fiscal_engine::{ErrorCode, StockMoveRequest};

#[tokio::test]
async fn invoice_with_fourteen_percent_vat() {
    let engine = memory_engine().await;

    let emission = engine.emit(invoice(100_000), &actor()).await.unwrap();
    let line = &emission.lines[0];
    assert_eq!(line.vat_cents, 14_000);
    assert_eq!(line.retention_cents, 0);
    assert_eq!(emission.document.net_total().to_string(), "1140.00");
    assert_eq!(emission.document.state, DocumentState::Emitted);
    assert_eq!(emission.document.number, "FT-000001");
}

#[tokio::test]
async fn full_receipt_pays_invoice() {
    let engine = memory_engine().await;
    let ft = engine.emit(invoice(100_000), &actor()).await.unwrap().document;

    let settlement = engine
        .issue_receipt(&ft.id, Money::from_cents(114_000), PaymentMethod::BankTransfer, Some("TRF-1"), &actor())
        .await
        .unwrap();
    assert_eq!(settlement.invoice.state, DocumentState::Paid);
    assert_eq!(settlement.receipt.net_total().to_string(), "1140.00");
    assert_eq!(settlement.receipt.client_id.as_deref(), Some("client-1"));
}

#[tokio::test]
async fn partial_receipt_leaves_outstanding_balance() {
    let engine = memory_engine().await;
    let ft = engine.emit(invoice(100_000), &actor()).await.unwrap().document;

    let settlement = engine
        .issue_receipt(&ft.id, Money::from_cents(50_000), PaymentMethod::Cash, None, &actor())
        .await
        .unwrap();
    assert_eq!(settlement.invoice.state, DocumentState::PartiallyPaid);
    assert_eq!(
        engine.settlement(&ft.id).await.unwrap().outstanding().to_string(),
        "640.00"
    );
}

#[tokio::test]
async fn overpayment_is_rejected_and_state_unchanged() {
    let engine = memory_engine().await;
    let ft = engine.emit(invoice(100_000), &actor()).await.unwrap().document;
    engine
        .issue_receipt(&ft.id, Money::from_cents(50_000), PaymentMethod::Cash, None, &actor())
        .await
        .unwrap();

    let err = engine
        .issue_receipt(&ft.id, Money::from_cents(64_001), PaymentMethod::Cash, None, &actor())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::AmountExceedsOutstandingBalance);

    let ft = engine.document(&ft.id).await.unwrap();
    assert_eq!(ft.state, DocumentState::PartiallyPaid);
    assert_eq!(engine.receipts_for(&ft.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn service_line_with_product_retention() {
    let engine = memory_engine().await;
    let service = engine
        .register_product(
            fiscal_engine::ProductDraft::service("CONSULT", "Consulting (h)", Rate::from_bps(1400))
                .with_retention_rate(Rate::from_bps(650)),
            &actor(),
        )
        .await
        .unwrap();

    let emission = engine
        .emit(
            EmissionRequest::new(DocumentType::Invoice)
                .with_client("client-1")
                .with_line(LineInput::new("", 1, Money::from_cents(100_000)).with_product(&service.id)),
            &actor(),
        )
        .await
        .unwrap();

    let line = &emission.lines[0];
    assert!(line.is_service);
    assert_eq!(line.retention_cents, 6_500);
    assert_eq!(line.vat_cents, 14_000);
    assert_eq!(line.line_total_cents, 107_500);
    assert!(engine.stock_movements(&service.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn stock_out_beyond_available_changes_nothing() {
    let engine = memory_engine().await;
    let product = goods(&engine, "PAINT", 3, 4_250).await;

    let err = engine
        .move_stock(
            StockMoveRequest::new(&product.id, 5, StockDirection::Out, StockReason::Adjustment),
            &actor(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InsufficientStock);

    let after = engine.product(&product.id).await.unwrap();
    assert_eq!(after.current_stock, 3);
    assert_eq!(after.average_cost_cents, 4_250);
}

#[tokio::test]
async fn purchase_updates_weighted_average_cost() {
    let engine = memory_engine().await;
    let product = goods(&engine, "DRILL", 5, 8_000).await;

    engine
        .move_stock(
            StockMoveRequest::purchase(&product.id, 10, Money::from_cents(10_000)),
            &actor(),
        )
        .await
        .unwrap();

    let after = engine.product(&product.id).await.unwrap();
    assert_eq!(after.current_stock, 15);
    assert_eq!(after.average_cost().to_string(), "93.33");
}

#[tokio::test]
async fn cancellation_waits_for_derived_documents_and_reverses_stock_once() {
    let engine = memory_engine().await;
    let product = goods(&engine, "BOLT", 10, 35).await;

    let ft = engine
        .emit(
            EmissionRequest::new(DocumentType::Invoice)
                .with_client("client-1")
                .with_line(LineInput::new("Bolts", 6, Money::from_cents(100)).with_product(&product.id)),
            &actor(),
        )
        .await
        .unwrap();
    assert_eq!(engine.product(&product.id).await.unwrap().current_stock, 4);

    let debit = engine
        .emit(
            EmissionRequest::new(DocumentType::DebitNote)
                .with_origin(&ft.document.id)
                .with_line(LineInput::new("Freight", 1, Money::from_cents(1_500))),
            &actor(),
        )
        .await
        .unwrap()
        .document;
    assert_eq!(debit.client_id.as_deref(), Some("client-1"));

    let err = engine
        .cancel(&ft.document.id, "Wrong quantity", &actor())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::HasActiveDerivedDocuments);
    assert_eq!(engine.product(&product.id).await.unwrap().current_stock, 4);

    engine.cancel(&debit.id, "Wrong quantity", &actor()).await.unwrap();
    let cancelled = engine
        .cancel(&ft.document.id, "Wrong quantity", &actor())
        .await
        .unwrap();
    assert_eq!(cancelled.state, DocumentState::Cancelled);
    assert_eq!(engine.product(&product.id).await.unwrap().current_stock, 10);

    let err = engine
        .cancel(&ft.document.id, "Wrong quantity", &actor())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadyCancelled);
    assert_eq!(engine.product(&product.id).await.unwrap().current_stock, 10);

    let reversals = engine
        .stock_movements(&product.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|m| m.reason == StockReason::Cancellation)
        .count();
    assert_eq!(reversals, 1);
}

#[tokio::test]
async fn proforma_converts_into_invoice() {
    let engine = memory_engine().await;
    let proforma = engine
        .emit(
            EmissionRequest::new(DocumentType::Proforma)
                .with_client("client-1")
                .with_line(LineInput::new("Quote", 2, Money::from_cents(10_000))),
            &actor(),
        )
        .await
        .unwrap()
        .document;

    let ft = engine
        .emit(
            EmissionRequest::new(DocumentType::Invoice)
                .with_origin(&proforma.id)
                .with_line(LineInput::new("Quote", 2, Money::from_cents(10_000))),
            &actor(),
        )
        .await
        .unwrap()
        .document;

    assert_eq!(ft.client_id.as_deref(), Some("client-1"));
    assert_eq!(ft.origin_document_id.as_deref(), Some(proforma.id.as_str()));
    assert_eq!(engine.derived_documents(&proforma.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn receipt_through_emit_settles_the_origin() {
    let engine = memory_engine().await;
    let ft = engine.emit(invoice(100_000), &actor()).await.unwrap().document;

    let rc = engine
        .emit(
            EmissionRequest::new(DocumentType::Receipt)
                .with_origin(&ft.id)
                .with_payment(fiscal_core::PaymentInput::new(PaymentMethod::Cash)),
            &actor(),
        )
        .await
        .unwrap()
        .document;

    assert_eq!(rc.net_total().cents(), 114_000);
    assert_eq!(rc.state, DocumentState::Paid);
    assert_eq!(engine.document(&ft.id).await.unwrap().state, DocumentState::Paid);
}

#[tokio::test]
async fn tampered_document_fails_integrity_check() {
    let engine = memory_engine().await;
    let ft = engine.emit(invoice(100_000), &actor()).await.unwrap().document;
    assert!(engine.verify_integrity(&ft.id).await.unwrap());

    sqlx::query("UPDATE fiscal_documents SET net_total_cents = 1 WHERE id = ?1")
        .bind(&ft.id)
        .execute(engine.db().pool())
        .await
        .unwrap();
    assert!(!engine.verify_integrity(&ft.id).await.unwrap());
}
