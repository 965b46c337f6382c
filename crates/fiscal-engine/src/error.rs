//! # Engine Error Types
//!
//! One error type for every public operation, plus a machine-readable code
//! an upstream API layer can map without matching on messages.
//!
//! ## Error Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Code Mapping                              │
//! │                                                                         │
//! │  CoreError::InvalidDocumentData        → INVALID_DOCUMENT_DATA          │
//! │  CoreError::NotFound / DbError::NotFound → NOT_FOUND                    │
//! │  CoreError::NoActiveSeries             → NO_ACTIVE_SERIES               │
//! │  CoreError::AmountExceeds...           → AMOUNT_EXCEEDS_OUTSTANDING_... │
//! │  CoreError::InsufficientStock          → INSUFFICIENT_STOCK             │
//! │  CoreError::AlreadyCancelled           → ALREADY_CANCELLED              │
//! │  CoreError::HasActiveDerivedDocuments  → HAS_ACTIVE_DERIVED_DOCUMENTS   │
//! │  CoreError::InvalidStateTransition     → INVALID_STATE_TRANSITION       │
//! │  DbError::UniqueViolation              → DUPLICATE                      │
//! │  other DbError                         → DATABASE_ERROR                 │
//! │  DirectoryError                        → DIRECTORY_ERROR                │
//! │  config read/parse/validate            → CONFIG_ERROR                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use thiserror::Error;

use crate::directory::DirectoryError;
use fiscal_core::{CoreError, ValidationError};
use fiscal_db::DbError;

/// Errors returned by [`crate::FiscalEngine`].
///
/// Every variant means the operation's transaction was rolled back.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A business rule rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] DbError),

    /// The client directory could not answer.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("Failed to read config file: {0}")]
    ConfigRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Core(CoreError::InvalidDocumentData(err))
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Database(DbError::from(err))
    }
}

impl EngineError {
    /// Machine-readable category of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Core(err) => match err {
                CoreError::InvalidDocumentData(_) => ErrorCode::InvalidDocumentData,
                CoreError::NotFound { .. } => ErrorCode::NotFound,
                CoreError::NoActiveSeries { .. } => ErrorCode::NoActiveSeries,
                CoreError::AmountExceedsOutstandingBalance { .. } => {
                    ErrorCode::AmountExceedsOutstandingBalance
                }
                CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
                CoreError::AlreadyCancelled { .. } => ErrorCode::AlreadyCancelled,
                CoreError::HasActiveDerivedDocuments { .. } => {
                    ErrorCode::HasActiveDerivedDocuments
                }
                CoreError::InvalidStateTransition { .. } => ErrorCode::InvalidStateTransition,
            },
            EngineError::Database(DbError::NotFound { .. }) => ErrorCode::NotFound,
            EngineError::Database(DbError::UniqueViolation { .. }) => ErrorCode::Duplicate,
            EngineError::Database(_) => ErrorCode::DatabaseError,
            EngineError::Directory(_) => ErrorCode::DirectoryError,
            EngineError::ConfigRead(_)
            | EngineError::ConfigParse(_)
            | EngineError::InvalidConfig(_) => ErrorCode::ConfigError,
        }
    }

    /// The business rule error, if this is one.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            EngineError::Core(err) => Some(err),
            _ => None,
        }
    }
}

/// Error categories exposed to callers.
///
/// Serialized as SCREAMING_SNAKE_CASE for JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidDocumentData,
    NotFound,
    NoActiveSeries,
    AmountExceedsOutstandingBalance,
    InsufficientStock,
    AlreadyCancelled,
    HasActiveDerivedDocuments,
    InvalidStateTransition,
    /// A unique key (SKU, series label) already exists.
    Duplicate,
    DatabaseError,
    DirectoryError,
    ConfigError,
}

/// Convenience type alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;
