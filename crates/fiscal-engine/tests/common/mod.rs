//! Shared setup for the engine integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use fiscal_core::types::Rate;
use fiscal_core::{Actor, DocumentType, EmissionRequest, LineInput, Money, Product};
use fiscal_engine::config::{DatabaseSettings, FiscalSettings};
use fiscal_engine::{
    ClientSummary, EngineConfig, FiscalEngine, InMemoryDirectory, ProductDraft,
};

pub fn actor() -> Actor {
    Actor::new("integration")
}

async fn directory() -> Arc<InMemoryDirectory> {
    let directory = InMemoryDirectory::new();
    directory
        .add_client(ClientSummary {
            id: "client-1".into(),
            tax_id: Some("500100200".into()),
            name: "Acme Lda".into(),
        })
        .await;
    Arc::new(directory)
}

async fn open_series(engine: &FiscalEngine) {
    for document_type in DocumentType::ALL {
        engine
            .create_series(document_type, document_type.code(), None, &actor())
            .await
            .unwrap();
    }
}

/// In-memory engine with a yearless series per type.
pub async fn memory_engine() -> FiscalEngine {
    let engine = FiscalEngine::connect(EngineConfig::in_memory("it-secret"), directory().await)
        .await
        .unwrap();
    open_series(&engine).await;
    engine
}

/// File-backed engine with several pooled connections.
pub async fn file_engine(path: &Path, max_connections: u32) -> FiscalEngine {
    let config = EngineConfig {
        fiscal: FiscalSettings {
            integrity_secret: "it-secret".into(),
            ..FiscalSettings::default()
        },
        database: DatabaseSettings {
            path: path.to_path_buf(),
            max_connections,
            busy_timeout_secs: 30,
        },
    };
    let engine = FiscalEngine::connect(config, directory().await).await.unwrap();
    open_series(&engine).await;
    engine
}

pub fn invoice(cents: i64) -> EmissionRequest {
    EmissionRequest::new(DocumentType::Invoice)
        .with_client("client-1")
        .with_line(LineInput::new("Drill", 1, Money::from_cents(cents)))
}

/// FA for client-1 whose net total is exactly `cents`.
pub fn advance(cents: i64) -> EmissionRequest {
    EmissionRequest::new(DocumentType::AdvanceInvoice)
        .with_client("client-1")
        .with_line(LineInput::new("Deposit", 1, Money::from_cents(cents)).without_vat())
}

pub async fn goods(engine: &FiscalEngine, sku: &str, stock: i64, cost_cents: i64) -> Product {
    engine
        .register_product(
            ProductDraft::goods(sku, format!("Goods {}", sku), Rate::from_bps(1400))
                .with_min_stock(1)
                .with_opening_stock(stock, Money::from_cents(cost_cents)),
            &actor(),
        )
        .await
        .unwrap()
}
