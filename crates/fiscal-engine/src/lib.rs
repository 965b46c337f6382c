//! # fiscal-engine: Fiscal Document Lifecycle
//!
//! Issues, settles, links and cancels fiscal documents and keeps the stock
//! ledger consistent with them.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Fiscal Engine Layers                             │
//! │                                                                         │
//! │  upstream API layer (HTTP, desktop, jobs)                              │
//! │       │  Actor + requests                                              │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  fiscal-engine (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │  emission   settlement   advance   cancellation   expiry        │   │
//! │  │       └──────────┴──── sequence ────┴── inventory ──┘           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                            │                                    │
//! │       ▼                            ▼                                    │
//! │  fiscal-core (rules, no I/O)   fiscal-db (SQLite repositories)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`engine`] - The [`FiscalEngine`] handle and read-only queries
//! - [`emission`] - Emission orchestrator
//! - [`settlement`] - Receipts and balance recomputation
//! - [`advance`] - Advance-to-invoice allocations
//! - [`cancellation`] - Cancellation with cascade and stock reversal
//! - [`expiry`] - Expired advance sweep
//! - [`inventory`] - Stock movements and weighted-average cost
//! - [`sequence`] - Number allocation and series administration
//! - [`directory`] - Client/sale lookup seam
//! - [`config`] - Layered configuration
//! - [`error`] - Engine error and error codes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fiscal_core::{Actor, DocumentType, EmissionRequest, LineInput, Money};
//! use fiscal_engine::{EngineConfig, FiscalEngine, InMemoryDirectory};
//!
//! let config = EngineConfig::load(None)?;
//! let engine = FiscalEngine::connect(config, Arc::new(InMemoryDirectory::new())).await?;
//!
//! let emission = engine
//!     .emit(
//!         EmissionRequest::new(DocumentType::Invoice)
//!             .with_walk_in("Walk-in", None)
//!             .with_line(LineInput::new("Drill", 1, Money::from_cents(100_000))),
//!         &Actor::new("cashier-1"),
//!     )
//!     .await?;
//! assert_eq!(emission.document.net_total().to_string(), "1140.00");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod advance;
pub mod cancellation;
pub mod config;
pub mod directory;
pub mod emission;
pub mod engine;
pub mod error;
pub mod expiry;
pub mod inventory;
pub mod sequence;
pub mod settlement;

// =============================================================================
// Re-exports
// =============================================================================

pub use advance::AdvanceLinkOutcome;
pub use config::EngineConfig;
pub use directory::{ClientDirectory, ClientSummary, DirectoryError, InMemoryDirectory, SaleSummary};
pub use emission::Emission;
pub use engine::FiscalEngine;
pub use error::{EngineError, EngineResult, ErrorCode};
pub use inventory::{ProductDraft, StockMoveRequest};
pub use settlement::Settlement;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::directory::{ClientSummary, InMemoryDirectory, SaleSummary};
    use crate::inventory::ProductDraft;
    use crate::{EngineConfig, FiscalEngine};
    use fiscal_core::types::Rate;
    use fiscal_core::{Actor, DocumentType, EmissionRequest, LineInput, Money, Product};

    pub fn actor() -> Actor {
        Actor::new("tester")
    }

    /// In-memory engine with one known client, a sale to that client and
    /// an anonymous sale.
    pub async fn engine() -> FiscalEngine {
        let directory = InMemoryDirectory::new();
        directory
            .add_client(ClientSummary {
                id: "client-1".into(),
                tax_id: Some("500100200".into()),
                name: "Acme Lda".into(),
            })
            .await;
        directory
            .add_sale(SaleSummary {
                id: "sale-1".into(),
                client_id: Some("client-1".into()),
            })
            .await;
        directory
            .add_sale(SaleSummary {
                id: "sale-anonymous".into(),
                client_id: None,
            })
            .await;

        FiscalEngine::connect(EngineConfig::in_memory("test-secret"), Arc::new(directory))
            .await
            .unwrap()
    }

    /// [`engine`] plus a yearless series named after each type code.
    pub async fn engine_with_series() -> FiscalEngine {
        let engine = engine().await;
        for document_type in DocumentType::ALL {
            engine
                .create_series(document_type, document_type.code(), None, &actor())
                .await
                .unwrap();
        }
        engine
    }

    /// Walk-in FT with one 14% line of `cents`.
    pub fn invoice_request(cents: i64) -> EmissionRequest {
        EmissionRequest::new(DocumentType::Invoice)
            .with_walk_in("Walk-in", None)
            .with_line(LineInput::new("Item", 1, Money::from_cents(cents)))
    }

    /// FA for client-1 whose net total is exactly `cents`.
    pub fn advance_request(cents: i64) -> EmissionRequest {
        EmissionRequest::new(DocumentType::AdvanceInvoice)
            .with_client("client-1")
            .with_line(LineInput::new("Deposit", 1, Money::from_cents(cents)).without_vat())
    }

    pub async fn register_goods(engine: &FiscalEngine, sku: &str, stock: i64) -> Product {
        engine
            .register_product(
                ProductDraft::goods(sku, format!("Product {}", sku), Rate::from_bps(1400))
                    .with_opening_stock(stock, Money::from_cents(8_000)),
                &actor(),
            )
            .await
            .unwrap()
    }
}
