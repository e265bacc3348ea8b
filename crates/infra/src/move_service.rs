//! Subtree move orchestration.
//!
//! ```text
//! source id, destination id
//!   ↓
//! 1. Snapshot: source, containers under it, items under it, destination
//!   ↓
//! 2. Plan (pure, fails fast with no side effects)
//!   ↓
//! 3. Apply in one transaction (all or nothing)
//! ```
//!
//! The service composes the [`DocumentStore`] trait only, so it runs the same
//! against the in-memory and Postgres stores.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

use tree_core::{ContainerId, DomainError};
use tree_inventory::{Container, InventoryItem, MovePlan, MoveRequest, plan_move};

use crate::applier::{ApplyReport, TransactionalApplier};
use crate::fixture::{Fixture, FixtureSummary};
use crate::store::{DocumentStore, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoveError {
    /// The snapshot does not allow this move. Nothing was written.
    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("source container not found: {0}")]
    SourceNotFound(ContainerId),

    #[error("destination container not found: {0}")]
    DestinationNotFound(ContainerId),

    /// Reading the snapshot or applying the plan failed. A failed apply
    /// leaves the store unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<DomainError> for MoveError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::PreconditionViolation(msg) => MoveError::Precondition(msg),
            DomainError::InvalidId(msg) => MoveError::InvalidId(msg),
        }
    }
}

/// What a completed move did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveReport {
    pub source_id: ContainerId,
    pub destination_id: ContainerId,
    pub plan: MovePlan,
    pub apply: ApplyReport,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct MoveService<S> {
    store: S,
}

impl<S> MoveService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> MoveService<S>
where
    S: DocumentStore,
{
    /// Move `source_id` (and everything below it) under `destination_id`.
    #[instrument(skip(self), fields(source = %source_id, destination = %destination_id), err)]
    pub async fn move_subtree(
        &self,
        source_id: &ContainerId,
        destination_id: &ContainerId,
    ) -> Result<MoveReport, MoveError> {
        let started_at = Utc::now();

        let request = self.snapshot(source_id, destination_id).await?;
        let plan = plan_move(&request)?;
        info!(
            container_updates = plan.container_updates.len(),
            item_updates = plan.item_updates.len(),
            "move planned"
        );

        let apply = TransactionalApplier::new(&self.store).apply(&plan).await?;

        Ok(MoveReport {
            source_id: source_id.clone(),
            destination_id: destination_id.clone(),
            plan,
            apply,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Move `mixed-contents` under `production-lot`.
    pub async fn move_fixture_subtree(&self) -> Result<MoveReport, MoveError> {
        info!("update-documents called");
        let result = self
            .move_subtree(&Fixture::source_id(), &Fixture::destination_id())
            .await;
        info!(ok = result.is_ok(), "update-documents finished");
        result
    }

    /// Read everything a move of `source_id` touches.
    pub async fn snapshot(
        &self,
        source_id: &ContainerId,
        destination_id: &ContainerId,
    ) -> Result<MoveRequest, MoveError> {
        let source = self
            .store
            .find_container(source_id)
            .await?
            .ok_or_else(|| MoveError::SourceNotFound(source_id.clone()))?;
        let children = self.store.find_containers_under(source_id).await?;
        let items = self.store.find_items_under(source_id).await?;
        let destination = self
            .store
            .find_container(destination_id)
            .await?
            .ok_or_else(|| MoveError::DestinationNotFound(destination_id.clone()))?;

        Ok(MoveRequest {
            source,
            children,
            items,
            destination,
        })
    }

    #[instrument(skip(self, fixture), err)]
    pub async fn reset_fixture(&self, fixture: &Fixture) -> Result<FixtureSummary, MoveError> {
        self.store.reset(&fixture.containers, &fixture.items).await?;
        let summary = fixture.summary();
        info!(
            containers = summary.containers,
            inventory_items = summary.inventory_items,
            "fixture loaded"
        );
        Ok(summary)
    }

    pub async fn container(&self, id: &ContainerId) -> Result<Option<Container>, MoveError> {
        Ok(self.store.find_container(id).await?)
    }

    /// Items whose current chain contains `ancestor`.
    pub async fn items_under(&self, ancestor: &ContainerId) -> Result<Vec<InventoryItem>, MoveError> {
        Ok(self.store.find_items_under(ancestor).await?)
    }
}
