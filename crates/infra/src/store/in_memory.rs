use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;

use tree_core::{ContainerId, Entity, InventoryItemId};
use tree_inventory::{
    Container, HistoryDocument, HistoryEntry, HistoryUpdate, InventoryItem, PrependOutcome,
};

use super::r#trait::{Collection, DocumentStore, StoreError, StoreSession};

#[derive(Debug, Clone)]
struct Versioned<D> {
    doc: D,
    version: u64,
}

#[derive(Debug, Default)]
struct Collections {
    containers: BTreeMap<ContainerId, Versioned<Container>>,
    items: BTreeMap<InventoryItemId, Versioned<InventoryItem>>,
    /// Last version handed out; every committed write gets a fresh one.
    last_version: u64,
}

impl Collections {
    fn next_version(&mut self) -> u64 {
        self.last_version += 1;
        self.last_version
    }
}

/// Faults the store will inject on request (tests/dev).
#[derive(Debug, Default, Clone)]
struct Faults {
    fail_prepend: Option<(Collection, String)>,
    fail_commit: bool,
    fail_release: bool,
}

/// Session and transaction counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub started: usize,
    pub released: usize,
    pub open: usize,
    pub committed: usize,
    pub aborted: usize,
}

#[derive(Debug, Default)]
struct Shared {
    data: RwLock<Collections>,
    faults: Mutex<Faults>,
    started: AtomicUsize,
    released: AtomicUsize,
    committed: AtomicUsize,
    aborted: AtomicUsize,
}

/// In-memory document store with optimistic, per-document transactions.
///
/// A transaction stages copies of the documents it touches and records their
/// versions; commit fails with [`StoreError::Conflict`] if any of them changed
/// in the meantime, and otherwise swaps all staged documents in at once.
///
/// Intended for tests/dev. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    shared: Arc<Shared>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every prepend targeting `id` in `collection` fail.
    pub fn fail_prepend_on(&self, collection: Collection, id: impl Into<String>) {
        if let Ok(mut faults) = self.shared.faults.lock() {
            faults.fail_prepend = Some((collection, id.into()));
        }
    }

    /// Make every commit fail (after validation, before anything is written).
    pub fn fail_commits(&self) {
        if let Ok(mut faults) = self.shared.faults.lock() {
            faults.fail_commit = true;
        }
    }

    /// Make every `end_session` report a release fault.
    pub fn fail_releases(&self) {
        if let Ok(mut faults) = self.shared.faults.lock() {
            faults.fail_release = true;
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.shared.faults.lock() {
            *faults = Faults::default();
        }
    }

    pub fn stats(&self) -> SessionStats {
        let started = self.shared.started.load(Ordering::SeqCst);
        let released = self.shared.released.load(Ordering::SeqCst);
        SessionStats {
            started,
            released,
            open: started.saturating_sub(released),
            committed: self.shared.committed.load(Ordering::SeqCst),
            aborted: self.shared.aborted.load(Ordering::SeqCst),
        }
    }

    /// Write a container outside any transaction (tests/dev seeding).
    pub fn put_container(&self, container: Container) -> Result<(), StoreError> {
        let mut data = self.shared.write()?;
        let version = data.next_version();
        data.containers.insert(
            container.id().clone(),
            Versioned {
                doc: container,
                version,
            },
        );
        Ok(())
    }

    /// Write an inventory item outside any transaction (tests/dev seeding).
    pub fn put_item(&self, item: InventoryItem) -> Result<(), StoreError> {
        let mut data = self.shared.write()?;
        let version = data.next_version();
        data.items
            .insert(item.id().clone(), Versioned { doc: item, version });
        Ok(())
    }
}

impl Shared {
    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Collections>, StoreError> {
        self.data
            .read()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Collections>, StoreError> {
        self.data
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))
    }

    fn faults(&self) -> Faults {
        self.faults.lock().map(|f| f.clone()).unwrap_or_default()
    }
}

fn chain_contains<D: HistoryDocument>(doc: &D, ancestor: &ContainerId) -> bool {
    doc.current_chain().is_some_and(|chain| chain.contains(ancestor))
}

#[async_trait::async_trait]
impl DocumentStore for InMemoryDocumentStore {
    type Session = InMemorySession;

    async fn find_container(&self, id: &ContainerId) -> Result<Option<Container>, StoreError> {
        let data = self.shared.read()?;
        Ok(data.containers.get(id).map(|v| v.doc.clone()))
    }

    async fn find_item(&self, id: &InventoryItemId) -> Result<Option<InventoryItem>, StoreError> {
        let data = self.shared.read()?;
        Ok(data.items.get(id).map(|v| v.doc.clone()))
    }

    async fn find_containers_under(
        &self,
        ancestor: &ContainerId,
    ) -> Result<Vec<Container>, StoreError> {
        let data = self.shared.read()?;
        Ok(data
            .containers
            .values()
            .filter(|v| chain_contains(&v.doc, ancestor))
            .map(|v| v.doc.clone())
            .collect())
    }

    async fn find_items_under(
        &self,
        ancestor: &ContainerId,
    ) -> Result<Vec<InventoryItem>, StoreError> {
        let data = self.shared.read()?;
        Ok(data
            .items
            .values()
            .filter(|v| chain_contains(&v.doc, ancestor))
            .map(|v| v.doc.clone())
            .collect())
    }

    async fn reset(
        &self,
        containers: &[Container],
        items: &[InventoryItem],
    ) -> Result<(), StoreError> {
        let mut data = self.shared.write()?;
        let mut fresh_containers = BTreeMap::new();
        let mut fresh_items = BTreeMap::new();

        for container in containers {
            let version = data.next_version();
            let versioned = Versioned {
                doc: container.clone(),
                version,
            };
            if fresh_containers.insert(container.id().clone(), versioned).is_some() {
                return Err(StoreError::Storage(format!(
                    "duplicate container id in reset: {}",
                    container.id()
                )));
            }
        }
        for item in items {
            let version = data.next_version();
            let versioned = Versioned {
                doc: item.clone(),
                version,
            };
            if fresh_items.insert(item.id().clone(), versioned).is_some() {
                return Err(StoreError::Storage(format!(
                    "duplicate inventory item id in reset: {}",
                    item.id()
                )));
            }
        }

        data.containers = fresh_containers;
        data.items = fresh_items;
        Ok(())
    }

    async fn start_session(&self) -> Result<Self::Session, StoreError> {
        self.shared.started.fetch_add(1, Ordering::SeqCst);
        Ok(InMemorySession {
            shared: self.shared.clone(),
            staged: None,
            released: false,
        })
    }
}

#[derive(Debug, Clone)]
struct StagedDoc<D> {
    base_version: u64,
    doc: D,
    dirty: bool,
}

#[derive(Debug, Default)]
struct Staged {
    containers: BTreeMap<ContainerId, StagedDoc<Container>>,
    items: BTreeMap<InventoryItemId, StagedDoc<InventoryItem>>,
}

/// Session over an [`InMemoryDocumentStore`].
#[derive(Debug)]
pub struct InMemorySession {
    shared: Arc<Shared>,
    staged: Option<Staged>,
    released: bool,
}

impl InMemorySession {
    fn staged_mut(&mut self) -> Result<&mut Staged, StoreError> {
        self.staged
            .as_mut()
            .ok_or_else(|| StoreError::InvalidState("no active transaction".to_string()))
    }

    fn check_fault(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        match self.shared.faults().fail_prepend {
            Some((c, ref target)) if c == collection && target == id => Err(StoreError::Storage(
                format!("injected fault on {collection} document {id}"),
            )),
            _ => Ok(()),
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.staged = None;
            self.shared.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Stage `id` for writing, copying it from the committed state on first touch.
fn stage<'a, Id, D>(
    staged: &'a mut BTreeMap<Id, StagedDoc<D>>,
    committed: &BTreeMap<Id, Versioned<D>>,
    collection: Collection,
    id: &Id,
) -> Result<&'a mut StagedDoc<D>, StoreError>
where
    Id: Ord + Clone + core::fmt::Display,
    D: Clone,
{
    match staged.entry(id.clone()) {
        Entry::Occupied(e) => Ok(e.into_mut()),
        Entry::Vacant(e) => {
            let current = committed
                .get(id)
                .ok_or_else(|| StoreError::not_found(collection, id))?;
            Ok(e.insert(StagedDoc {
                base_version: current.version,
                doc: current.doc.clone(),
                dirty: false,
            }))
        }
    }
}

fn prepend_staged<D: HistoryDocument>(staged: &mut StagedDoc<D>, entry: &HistoryEntry) -> PrependOutcome {
    let outcome = staged.doc.prepend_entry(entry.clone());
    if outcome == PrependOutcome::Prepended {
        staged.dirty = true;
    }
    outcome
}

/// Every staged document must still be at the version the transaction read.
fn validate<Id, D>(
    staged: &BTreeMap<Id, StagedDoc<D>>,
    committed: &BTreeMap<Id, Versioned<D>>,
    collection: Collection,
) -> Result<(), StoreError>
where
    Id: Ord + core::fmt::Display,
{
    for (id, s) in staged {
        match committed.get(id) {
            Some(current) if current.version == s.base_version => {}
            Some(current) => {
                return Err(StoreError::Conflict(format!(
                    "{collection} document {id} changed (read version {}, now {})",
                    s.base_version, current.version
                )));
            }
            None => {
                return Err(StoreError::Conflict(format!(
                    "{collection} document {id} was removed during the transaction"
                )));
            }
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl StoreSession for InMemorySession {
    async fn start_transaction(&mut self) -> Result<(), StoreError> {
        if self.released {
            return Err(StoreError::InvalidState("session already ended".to_string()));
        }
        if self.staged.is_some() {
            return Err(StoreError::InvalidState(
                "transaction already started".to_string(),
            ));
        }
        self.staged = Some(Staged::default());
        Ok(())
    }

    async fn prepend_container_history(
        &mut self,
        update: &HistoryUpdate<ContainerId>,
    ) -> Result<PrependOutcome, StoreError> {
        self.check_fault(Collection::Containers, update.id.as_str())?;
        let shared = self.shared.clone();
        let staged = self.staged_mut()?;
        let data = shared.read()?;
        let doc = stage(
            &mut staged.containers,
            &data.containers,
            Collection::Containers,
            &update.id,
        )?;
        Ok(prepend_staged(doc, &update.entry))
    }

    async fn prepend_item_history(
        &mut self,
        update: &HistoryUpdate<InventoryItemId>,
    ) -> Result<PrependOutcome, StoreError> {
        self.check_fault(Collection::InventoryItems, update.id.as_str())?;
        let shared = self.shared.clone();
        let staged = self.staged_mut()?;
        let data = shared.read()?;
        let doc = stage(
            &mut staged.items,
            &data.items,
            Collection::InventoryItems,
            &update.id,
        )?;
        Ok(prepend_staged(doc, &update.entry))
    }

    async fn commit_transaction(&mut self) -> Result<(), StoreError> {
        let staged = self
            .staged
            .take()
            .ok_or_else(|| StoreError::InvalidState("no active transaction".to_string()))?;

        let mut data = self.shared.write()?;
        let checked = validate(&staged.containers, &data.containers, Collection::Containers)
            .and_then(|()| validate(&staged.items, &data.items, Collection::InventoryItems))
            .and_then(|()| {
                if self.shared.faults().fail_commit {
                    Err(StoreError::Storage("injected commit fault".to_string()))
                } else {
                    Ok(())
                }
            });
        if let Err(err) = checked {
            // Nothing was written; the staged state is already gone.
            self.shared.aborted.fetch_add(1, Ordering::SeqCst);
            return Err(err);
        }

        for (id, s) in staged.containers.into_iter().filter(|(_, s)| s.dirty) {
            let version = data.next_version();
            data.containers.insert(id, Versioned { doc: s.doc, version });
        }
        for (id, s) in staged.items.into_iter().filter(|(_, s)| s.dirty) {
            let version = data.next_version();
            data.items.insert(id, Versioned { doc: s.doc, version });
        }

        self.shared.committed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn abort_transaction(&mut self) -> Result<(), StoreError> {
        if self.staged.take().is_some() {
            self.shared.aborted.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn end_session(mut self) -> Result<(), StoreError> {
        if self.staged.is_some() {
            tracing::warn!("session ended with an open transaction; discarding staged writes");
            self.shared.aborted.fetch_add(1, Ordering::SeqCst);
        }
        self.release();
        if self.shared.faults().fail_release {
            return Err(StoreError::Release("injected release fault".to_string()));
        }
        Ok(())
    }
}

impl Drop for InMemorySession {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!("session dropped without end_session; releasing");
            if self.staged.is_some() {
                self.shared.aborted.fetch_add(1, Ordering::SeqCst);
            }
            self.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_inventory::AncestorChain;

    fn chain(ids: &[&str]) -> AncestorChain {
        ids.iter().map(|id| ContainerId::from(*id)).collect()
    }

    fn seeded() -> InMemoryDocumentStore {
        let store = InMemoryDocumentStore::new();
        store
            .put_container(Container::new("mixed-contents".into(), chain(&["root-container"])))
            .unwrap();
        store
            .put_container(Container::new("1".into(), chain(&["mixed-contents", "root-container"])))
            .unwrap();
        store
            .put_item(InventoryItem::new(
                "item-1".into(),
                chain(&["1", "mixed-contents", "root-container"]),
            ))
            .unwrap();
        store
    }

    fn update(id: &str, ids: &[&str]) -> HistoryUpdate<ContainerId> {
        HistoryUpdate::new(id.into(), chain(ids))
    }

    #[tokio::test]
    async fn filters_on_current_chain_only() {
        let store = seeded();
        let under = store
            .find_containers_under(&"mixed-contents".into())
            .await
            .unwrap();
        assert_eq!(under.len(), 1);
        assert_eq!(under[0].id().as_str(), "1");

        let items = store.find_items_under(&"root-container".into()).await.unwrap();
        assert_eq!(items.len(), 1);

        // Move "1" away; the old entry stays in history but no longer matches.
        let mut session = store.start_session().await.unwrap();
        session.start_transaction().await.unwrap();
        session
            .prepend_container_history(&update("1", &["production-lot", "root-container"]))
            .await
            .unwrap();
        session.commit_transaction().await.unwrap();
        session.end_session().await.unwrap();

        assert!(
            store
                .find_containers_under(&"mixed-contents".into())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn staged_writes_are_invisible_until_commit() {
        let store = seeded();
        let mut session = store.start_session().await.unwrap();
        session.start_transaction().await.unwrap();
        session
            .prepend_container_history(&update("1", &["production-lot", "root-container"]))
            .await
            .unwrap();

        let before = store.find_container(&"1".into()).await.unwrap().unwrap();
        assert_eq!(before.history().len(), 1);

        session.commit_transaction().await.unwrap();
        session.end_session().await.unwrap();

        let after = store.find_container(&"1".into()).await.unwrap().unwrap();
        assert_eq!(after.history().len(), 2);
        assert_eq!(after.current_chain(), Some(&chain(&["production-lot", "root-container"])));
    }

    #[tokio::test]
    async fn abort_discards_staged_writes() {
        let store = seeded();
        let mut session = store.start_session().await.unwrap();
        session.start_transaction().await.unwrap();
        session
            .prepend_container_history(&update("1", &["production-lot", "root-container"]))
            .await
            .unwrap();
        session.abort_transaction().await.unwrap();
        // Aborting twice is harmless.
        session.abort_transaction().await.unwrap();
        session.end_session().await.unwrap();

        let doc = store.find_container(&"1".into()).await.unwrap().unwrap();
        assert_eq!(doc.history().len(), 1);
        assert_eq!(store.stats().aborted, 1);
    }

    #[tokio::test]
    async fn missing_document_is_not_found() {
        let store = seeded();
        let mut session = store.start_session().await.unwrap();
        session.start_transaction().await.unwrap();
        let err = session
            .prepend_container_history(&update("nope", &["root-container"]))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::not_found(Collection::Containers, "nope"));
        session.end_session().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_commit_on_same_document_conflicts() {
        let store = seeded();

        let mut first = store.start_session().await.unwrap();
        first.start_transaction().await.unwrap();
        first
            .prepend_container_history(&update("1", &["production-lot", "root-container"]))
            .await
            .unwrap();

        let mut second = store.start_session().await.unwrap();
        second.start_transaction().await.unwrap();
        second
            .prepend_container_history(&update("1", &["other", "root-container"]))
            .await
            .unwrap();
        second.commit_transaction().await.unwrap();
        second.end_session().await.unwrap();

        let err = first.commit_transaction().await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        first.end_session().await.unwrap();

        let doc = store.find_container(&"1".into()).await.unwrap().unwrap();
        assert_eq!(doc.current_chain(), Some(&chain(&["other", "root-container"])));
        assert_eq!(doc.history().len(), 2);
    }

    #[tokio::test]
    async fn prepend_requires_a_transaction() {
        let store = seeded();
        let mut session = store.start_session().await.unwrap();
        let err = session
            .prepend_container_history(&update("1", &["root-container"]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidState(_)));
        session.end_session().await.unwrap();
    }

    #[tokio::test]
    async fn dropped_session_is_released_once() {
        let store = seeded();
        {
            let mut session = store.start_session().await.unwrap();
            session.start_transaction().await.unwrap();
        }
        let stats = store.stats();
        assert_eq!(stats.started, 1);
        assert_eq!(stats.released, 1);
        assert_eq!(stats.open, 0);
        assert_eq!(stats.aborted, 1);
    }
}
