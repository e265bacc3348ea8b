use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tree_core::{ContainerId, InventoryItemId};
use tree_inventory::{Container, HistoryUpdate, InventoryItem, PrependOutcome};

/// The two persisted collections.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    #[serde(rename = "containers")]
    Containers,
    #[serde(rename = "inventory-items")]
    InventoryItems,
}

impl Collection {
    /// Logical collection name.
    pub fn name(self) -> &'static str {
        match self {
            Collection::Containers => "containers",
            Collection::InventoryItems => "inventory-items",
        }
    }

    /// SQL table backing the collection.
    pub fn table(self) -> &'static str {
        match self {
            Collection::Containers => "containers",
            Collection::InventoryItems => "inventory_items",
        }
    }
}

impl core::fmt::Display for Collection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Document store operation error.
///
/// These are **infrastructure errors** (missing documents, write conflicts,
/// session lifecycle) as opposed to domain errors (snapshot preconditions).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// An update targeted a document id that does not exist.
    #[error("{collection} document not found: {id}")]
    NotFound { collection: Collection, id: String },

    /// The store detected a write/version conflict with another transaction.
    #[error("transaction conflict: {0}")]
    Conflict(String),

    /// The session could not be released cleanly.
    #[error("session release failed: {0}")]
    Release(String),

    /// A session method was called in the wrong lifecycle state.
    #[error("invalid session state: {0}")]
    InvalidState(String),

    /// Any other backend failure (connection, serialization, poisoned lock...).
    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn not_found(collection: Collection, id: impl core::fmt::Display) -> Self {
        Self::NotFound {
            collection,
            id: id.to_string(),
        }
    }
}

/// Document store boundary: fetch-by-id, fetch-by-filter, fixture reset and
/// a session factory.
///
/// Reads are not transactional; every mutation after a reset goes through a
/// [`StoreSession`] transaction.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    type Session: StoreSession;

    async fn find_container(&self, id: &ContainerId) -> Result<Option<Container>, StoreError>;

    async fn find_item(&self, id: &InventoryItemId) -> Result<Option<InventoryItem>, StoreError>;

    /// Containers whose current chain contains `ancestor`.
    async fn find_containers_under(
        &self,
        ancestor: &ContainerId,
    ) -> Result<Vec<Container>, StoreError>;

    /// Inventory items whose current chain contains `ancestor`.
    async fn find_items_under(
        &self,
        ancestor: &ContainerId,
    ) -> Result<Vec<InventoryItem>, StoreError>;

    /// Drop both collections and recreate them with the given documents.
    async fn reset(
        &self,
        containers: &[Container],
        items: &[InventoryItem],
    ) -> Result<(), StoreError>;

    /// Acquire a transaction-capable session.
    async fn start_session(&self) -> Result<Self::Session, StoreError>;
}

/// A transaction-capable session.
///
/// Lifecycle: `start_transaction`, any number of prepends, then exactly one of
/// `commit_transaction` / `abort_transaction`, then `end_session`. Ending the
/// session consumes it, so it cannot be released twice; implementations also
/// release on drop if `end_session` was never reached.
#[async_trait::async_trait]
pub trait StoreSession: Send {
    async fn start_transaction(&mut self) -> Result<(), StoreError>;

    /// Push `update.entry` to the front of the container's history.
    async fn prepend_container_history(
        &mut self,
        update: &HistoryUpdate<ContainerId>,
    ) -> Result<PrependOutcome, StoreError>;

    /// Push `update.entry` to the front of the item's history.
    async fn prepend_item_history(
        &mut self,
        update: &HistoryUpdate<InventoryItemId>,
    ) -> Result<PrependOutcome, StoreError>;

    async fn commit_transaction(&mut self) -> Result<(), StoreError>;

    /// Discard every staged write. A no-op when no transaction is active.
    async fn abort_transaction(&mut self) -> Result<(), StoreError>;

    async fn end_session(self) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<S> DocumentStore for Arc<S>
where
    S: DocumentStore + ?Sized,
{
    type Session = S::Session;

    async fn find_container(&self, id: &ContainerId) -> Result<Option<Container>, StoreError> {
        (**self).find_container(id).await
    }

    async fn find_item(&self, id: &InventoryItemId) -> Result<Option<InventoryItem>, StoreError> {
        (**self).find_item(id).await
    }

    async fn find_containers_under(
        &self,
        ancestor: &ContainerId,
    ) -> Result<Vec<Container>, StoreError> {
        (**self).find_containers_under(ancestor).await
    }

    async fn find_items_under(
        &self,
        ancestor: &ContainerId,
    ) -> Result<Vec<InventoryItem>, StoreError> {
        (**self).find_items_under(ancestor).await
    }

    async fn reset(
        &self,
        containers: &[Container],
        items: &[InventoryItem],
    ) -> Result<(), StoreError> {
        (**self).reset(containers, items).await
    }

    async fn start_session(&self) -> Result<Self::Session, StoreError> {
        (**self).start_session().await
    }
}
