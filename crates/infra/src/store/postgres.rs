//! Postgres-backed document store.
//!
//! Each collection is a table with a text primary key and the full
//! newest-first history as a JSONB array:
//!
//! ```sql
//! CREATE TABLE containers      (id TEXT PRIMARY KEY, history JSONB NOT NULL);
//! CREATE TABLE inventory_items (id TEXT PRIMARY KEY, history JSONB NOT NULL);
//! ```
//!
//! A history prepend is a single `UPDATE` that concatenates the new entry in
//! front of the existing array, so older entries are never rewritten.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (serialization failure) | `40001` | `Conflict` |
//! | Database (deadlock detected) | `40P01` | `Conflict` |
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | Any other | `Storage` |
//! | PoolClosed / other | N/A | `Storage` |

use std::sync::Arc;

use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use tree_core::{ContainerId, Entity, InventoryItemId};
use tree_inventory::{
    Container, HistoryDocument, HistoryEntry, HistoryUpdate, InventoryItem, PrependOutcome,
};

use super::r#trait::{Collection, DocumentStore, StoreError, StoreSession};

/// Postgres-backed document store.
///
/// Transactions run at `REPEATABLE READ`: a concurrent writer touching the
/// same rows makes the later transaction fail with a serialization error,
/// which surfaces as [`StoreError::Conflict`].
#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: Arc<PgPool>,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect and make sure both tables exist.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for collection in [Collection::Containers, Collection::InventoryItems] {
            sqlx::query(&create_table_sql(collection))
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    async fn find_one<D>(&self, collection: Collection, id: &str) -> Result<Option<D>, StoreError>
    where
        D: FromDocumentRow,
    {
        let sql = format!("SELECT id, history FROM {} WHERE id = $1", collection.table());
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_one", e))?;

        row.map(|row| D::from_row(&row)).transpose()
    }

    async fn find_under<D>(
        &self,
        collection: Collection,
        ancestor: &ContainerId,
    ) -> Result<Vec<D>, StoreError>
    where
        D: FromDocumentRow,
    {
        let sql = format!(
            r#"
            SELECT id, history
            FROM {}
            WHERE (history -> 0 -> 'parentContainerIds') @> jsonb_build_array($1::text)
            ORDER BY id ASC
            "#,
            collection.table()
        );
        let rows = sqlx::query(&sql)
            .bind(ancestor.as_str())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_under", e))?;

        rows.iter().map(D::from_row).collect()
    }
}

fn create_table_sql(collection: Collection) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, history JSONB NOT NULL)",
        collection.table()
    )
}

#[async_trait::async_trait]
impl DocumentStore for PostgresDocumentStore {
    type Session = PostgresSession;

    #[instrument(skip(self), fields(id = %id), err)]
    async fn find_container(&self, id: &ContainerId) -> Result<Option<Container>, StoreError> {
        self.find_one(Collection::Containers, id.as_str()).await
    }

    #[instrument(skip(self), fields(id = %id), err)]
    async fn find_item(&self, id: &InventoryItemId) -> Result<Option<InventoryItem>, StoreError> {
        self.find_one(Collection::InventoryItems, id.as_str()).await
    }

    #[instrument(skip(self), fields(ancestor = %ancestor), err)]
    async fn find_containers_under(
        &self,
        ancestor: &ContainerId,
    ) -> Result<Vec<Container>, StoreError> {
        self.find_under(Collection::Containers, ancestor).await
    }

    #[instrument(skip(self), fields(ancestor = %ancestor), err)]
    async fn find_items_under(
        &self,
        ancestor: &ContainerId,
    ) -> Result<Vec<InventoryItem>, StoreError> {
        self.find_under(Collection::InventoryItems, ancestor).await
    }

    #[instrument(
        skip(self, containers, items),
        fields(containers = containers.len(), items = items.len()),
        err
    )]
    async fn reset(
        &self,
        containers: &[Container],
        items: &[InventoryItem],
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        for collection in [Collection::Containers, Collection::InventoryItems] {
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", collection.table()))
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("drop_table", e))?;
            sqlx::query(&create_table_sql(collection))
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("create_table", e))?;
        }

        for container in containers {
            insert_document(&mut tx, Collection::Containers, container).await?;
        }
        for item in items {
            insert_document(&mut tx, Collection::InventoryItems, item).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }

    async fn start_session(&self) -> Result<Self::Session, StoreError> {
        if self.pool.is_closed() {
            return Err(StoreError::Storage("connection pool closed".to_string()));
        }
        Ok(PostgresSession {
            pool: self.pool.clone(),
            tx: None,
        })
    }
}

async fn insert_document<D>(
    tx: &mut Transaction<'static, Postgres>,
    collection: Collection,
    doc: &D,
) -> Result<(), StoreError>
where
    D: HistoryDocument,
{
    let history = history_to_json(doc.history())?;
    sqlx::query(&format!(
        "INSERT INTO {} (id, history) VALUES ($1, $2)",
        collection.table()
    ))
    .bind(doc.id().to_string())
    .bind(history)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_document", e))?;
    Ok(())
}

/// Session over a [`PostgresDocumentStore`].
///
/// The transaction owns a pooled connection from `start_transaction` until
/// commit/abort. Dropping an open `sqlx::Transaction` rolls it back, so an
/// unwinding caller never leaves a transaction open.
pub struct PostgresSession {
    pool: Arc<PgPool>,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresSession {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, StoreError> {
        self.tx
            .as_mut()
            .ok_or_else(|| StoreError::InvalidState("no active transaction".to_string()))
    }

    async fn prepend(
        &mut self,
        collection: Collection,
        id: &str,
        entry: &HistoryEntry,
    ) -> Result<PrependOutcome, StoreError> {
        let entry = serde_json::to_value(entry)
            .map_err(|e| StoreError::Storage(format!("history entry serialization failed: {e}")))?;
        let tx = self.tx()?;

        let updated = sqlx::query(&format!(
            r#"
            UPDATE {}
            SET history = jsonb_build_array($2::jsonb) || history
            WHERE id = $1 AND (history -> 0) IS DISTINCT FROM $2::jsonb
            "#,
            collection.table()
        ))
        .bind(id)
        .bind(&entry)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("prepend_history", e))?;

        if updated.rows_affected() > 0 {
            return Ok(PrependOutcome::Prepended);
        }

        // Nothing changed: either the chain is already current or the id is unknown.
        let exists = sqlx::query(&format!("SELECT 1 FROM {} WHERE id = $1", collection.table()))
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("prepend_history", e))?;

        match exists {
            Some(_) => Ok(PrependOutcome::AlreadyCurrent),
            None => Err(StoreError::not_found(collection, id)),
        }
    }
}

#[async_trait::async_trait]
impl StoreSession for PostgresSession {
    async fn start_transaction(&mut self) -> Result<(), StoreError> {
        if self.tx.is_some() {
            return Err(StoreError::InvalidState(
                "transaction already started".to_string(),
            ));
        }
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_isolation", e))?;
        self.tx = Some(tx);
        Ok(())
    }

    #[instrument(skip(self, update), fields(id = %update.id), err)]
    async fn prepend_container_history(
        &mut self,
        update: &HistoryUpdate<ContainerId>,
    ) -> Result<PrependOutcome, StoreError> {
        self.prepend(Collection::Containers, update.id.as_str(), &update.entry)
            .await
    }

    #[instrument(skip(self, update), fields(id = %update.id), err)]
    async fn prepend_item_history(
        &mut self,
        update: &HistoryUpdate<InventoryItemId>,
    ) -> Result<PrependOutcome, StoreError> {
        self.prepend(Collection::InventoryItems, update.id.as_str(), &update.entry)
            .await
    }

    async fn commit_transaction(&mut self) -> Result<(), StoreError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| StoreError::InvalidState("no active transaction".to_string()))?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))
    }

    async fn abort_transaction(&mut self) -> Result<(), StoreError> {
        match self.tx.take() {
            Some(tx) => tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e)),
            None => Ok(()),
        }
    }

    async fn end_session(mut self) -> Result<(), StoreError> {
        match self.tx.take() {
            Some(tx) => {
                tracing::warn!("session ended with an open transaction; rolling back");
                tx.rollback()
                    .await
                    .map_err(|e| StoreError::Release(format!("rollback on release failed: {e}")))
            }
            None => Ok(()),
        }
    }
}

/// Documents that can be decoded from an `(id, history)` row.
trait FromDocumentRow: Sized {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, StoreError>;
}

fn decode_row(row: &sqlx::postgres::PgRow) -> Result<(String, Vec<HistoryEntry>), StoreError> {
    let id: String = row
        .try_get("id")
        .map_err(|e| StoreError::Storage(format!("failed to read id: {e}")))?;
    let history: JsonValue = row
        .try_get("history")
        .map_err(|e| StoreError::Storage(format!("failed to read history: {e}")))?;
    let history = serde_json::from_value(history)
        .map_err(|e| StoreError::Storage(format!("malformed history for document {id}: {e}")))?;
    Ok((id, history))
}

impl FromDocumentRow for Container {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, StoreError> {
        let (id, history) = decode_row(row)?;
        Ok(Container::with_history(ContainerId::new(id), history))
    }
}

impl FromDocumentRow for InventoryItem {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, StoreError> {
        let (id, history) = decode_row(row)?;
        Ok(InventoryItem::with_history(InventoryItemId::new(id), history))
    }
}

fn history_to_json(history: &[HistoryEntry]) -> Result<JsonValue, StoreError> {
    serde_json::to_value(history)
        .map_err(|e| StoreError::Storage(format!("history serialization failed: {e}")))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // serialization_failure, deadlock_detected, unique_violation
                Some("40001") | Some("40P01") | Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Storage(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Storage(format!("sqlx error in {operation}: {err}")),
    }
}
