//! # fiscal-db: Database Layer for the Fiscal Engine
//!
//! SQLite storage for documents, lines, advance links, series, products and
//! the stock ledger, using sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Fiscal Engine Data Flow                          │
//! │                                                                         │
//! │  FiscalEngine::emit(..)                                                │
//! │       │  let mut tx = db.begin()                                        │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     fiscal-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (&mut conn)    │   │  (embedded)  │  │   │
//! │  │   │               │    │                │   │              │  │   │
//! │  │   │ SqlitePool    │    │ SeriesRepo     │   │ 001_initial_ │  │   │
//! │  │   │ begin()       │◄───│ DocumentRepo   │   │ schema.sql   │  │   │
//! │  │   │ acquire()     │    │ AdvanceLinkRepo│   │              │  │   │
//! │  │   │               │    │ ProductRepo    │   │              │  │   │
//! │  │   │               │    │ MovementRepo   │   │              │  │   │
//! │  │   └───────────────┘    └────────────────┘   └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (WAL)                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fiscal_db::{Database, DbConfig, DocumentRepository};
//!
//! let db = Database::new(DbConfig::new("fiscal.db")).await?;
//!
//! let mut tx = db.begin().await?;
//! let doc = DocumentRepository::new(&mut tx).get(&id).await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, MEMORY_PATH};

pub use repository::{
    new_id, AdvanceLinkRepository, DocumentRepository, ProductRepository, SeriesRepository,
    StockMovementRepository,
};
