use serde::{Deserialize, Serialize};

use tree_core::{ContainerId, Entity, InventoryItemId};

use crate::chain::{AncestorChain, HistoryEntry};

/// Result of prepending a history entry to a document.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrependOutcome {
    /// The entry was pushed to the front of the history.
    Prepended,
    /// The document's current chain already equals the entry; nothing changed.
    AlreadyCurrent,
}

/// A document whose lineage is an append-only, newest-first history.
pub trait HistoryDocument: Entity {
    fn history(&self) -> &[HistoryEntry];

    fn history_mut(&mut self) -> &mut Vec<HistoryEntry>;

    fn current_entry(&self) -> Option<&HistoryEntry> {
        self.history().first()
    }

    fn current_chain(&self) -> Option<&AncestorChain> {
        self.current_entry().map(HistoryEntry::chain)
    }

    /// Push `entry` to the front of the history, never discarding older entries.
    ///
    /// Re-applying the chain that is already current is a no-op.
    fn prepend_entry(&mut self, entry: HistoryEntry) -> PrependOutcome {
        if self.current_entry() == Some(&entry) {
            return PrependOutcome::AlreadyCurrent;
        }
        self.history_mut().insert(0, entry);
        PrependOutcome::Prepended
    }
}

/// Container document (`containers` collection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    #[serde(rename = "_id")]
    id: ContainerId,
    history: Vec<HistoryEntry>,
}

impl Container {
    /// New container whose only history entry is `chain`.
    pub fn new(id: ContainerId, chain: AncestorChain) -> Self {
        Self {
            id,
            history: vec![HistoryEntry::new(chain)],
        }
    }

    pub fn with_history(id: ContainerId, history: Vec<HistoryEntry>) -> Self {
        Self { id, history }
    }
}

impl Entity for Container {
    type Id = ContainerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl HistoryDocument for Container {
    fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    fn history_mut(&mut self) -> &mut Vec<HistoryEntry> {
        &mut self.history
    }
}

/// Inventory item document (`inventory-items` collection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    #[serde(rename = "_id")]
    id: InventoryItemId,
    history: Vec<HistoryEntry>,
}

impl InventoryItem {
    pub fn new(id: InventoryItemId, chain: AncestorChain) -> Self {
        Self {
            id,
            history: vec![HistoryEntry::new(chain)],
        }
    }

    pub fn with_history(id: InventoryItemId, history: Vec<HistoryEntry>) -> Self {
        Self { id, history }
    }

    /// Container currently holding the item.
    pub fn holder(&self) -> Option<&ContainerId> {
        self.current_chain().and_then(AncestorChain::nearest)
    }
}

impl Entity for InventoryItem {
    type Id = InventoryItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl HistoryDocument for InventoryItem {
    fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    fn history_mut(&mut self) -> &mut Vec<HistoryEntry> {
        &mut self.history
    }
}
