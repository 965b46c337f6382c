//! # Client Directory
//!
//! Clients and sales are owned by another service. The engine only asks
//! whether a client exists and which client a prior sale belongs to.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  emit(request)                                                          │
//! │     │                                                                   │
//! │     ├── client_id set?  ──► find_client(id) ──► None → NotFound         │
//! │     └── sale_id set?    ──► find_sale(id)   ──► None → NotFound         │
//! │                                     │                                   │
//! │                                     └──► sale.client_id (fallback)      │
//! │                                                                         │
//! │  Lookups happen before the emission transaction opens.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// The directory could not be queried.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Client directory unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSummary {
    pub id: String,
    pub tax_id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleSummary {
    pub id: String,
    /// `None` for walk-in sales.
    pub client_id: Option<String>,
}

/// Lookup of clients and prior sales.
#[async_trait]
pub trait ClientDirectory: Send + Sync {
    async fn find_client(&self, id: &str) -> Result<Option<ClientSummary>, DirectoryError>;

    async fn find_sale(&self, id: &str) -> Result<Option<SaleSummary>, DirectoryError>;
}

/// Directory kept in memory, for tests and single-process embedding.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    clients: RwLock<HashMap<String, ClientSummary>>,
    sales: RwLock<HashMap<String, SaleSummary>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_client(&self, client: ClientSummary) {
        self.clients.write().await.insert(client.id.clone(), client);
    }

    pub async fn add_sale(&self, sale: SaleSummary) {
        self.sales.write().await.insert(sale.id.clone(), sale);
    }
}

#[async_trait]
impl ClientDirectory for InMemoryDirectory {
    async fn find_client(&self, id: &str) -> Result<Option<ClientSummary>, DirectoryError> {
        Ok(self.clients.read().await.get(id).cloned())
    }

    async fn find_sale(&self, id: &str) -> Result<Option<SaleSummary>, DirectoryError> {
        Ok(self.sales.read().await.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_lookups() {
        let directory = InMemoryDirectory::new();
        directory
            .add_client(ClientSummary {
                id: "c-1".into(),
                tax_id: Some("5000000001".into()),
                name: "Acme Lda".into(),
            })
            .await;
        directory
            .add_sale(SaleSummary {
                id: "s-1".into(),
                client_id: Some("c-1".into()),
            })
            .await;

        let client = directory.find_client("c-1").await.unwrap().unwrap();
        assert_eq!(client.name, "Acme Lda");
        assert!(directory.find_client("c-2").await.unwrap().is_none());

        let sale = directory.find_sale("s-1").await.unwrap().unwrap();
        assert_eq!(sale.client_id.as_deref(), Some("c-1"));
    }
}
