use serde::{Deserialize, Serialize};

use tree_core::{ContainerId, ValueObject};

/// Ordered ancestor ids, nearest parent first and root last.
///
/// A root container has an empty chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AncestorChain(Vec<ContainerId>);

impl AncestorChain {
    pub fn new(ids: Vec<ContainerId>) -> Self {
        Self(ids)
    }

    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Chain of a document whose direct parent is `parent`:
    /// `[parent] + parent_chain`.
    pub fn under(parent: ContainerId, parent_chain: &AncestorChain) -> Self {
        let mut ids = Vec::with_capacity(parent_chain.len() + 1);
        ids.push(parent);
        ids.extend(parent_chain.0.iter().cloned());
        Self(ids)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Direct parent.
    pub fn nearest(&self) -> Option<&ContainerId> {
        self.0.first()
    }

    pub fn contains(&self, id: &ContainerId) -> bool {
        self.0.contains(id)
    }

    /// Index of `id` in the chain (0 = direct parent).
    pub fn position_of(&self, id: &ContainerId) -> Option<usize> {
        self.0.iter().position(|ancestor| ancestor == id)
    }

    /// Keep ancestors `[0..=position]`, then continue with `tail`.
    ///
    /// Positions past the end keep the whole chain.
    pub fn spliced(&self, position: usize, tail: &AncestorChain) -> Self {
        let keep = (position + 1).min(self.0.len());
        let mut ids = Vec::with_capacity(keep + tail.len());
        ids.extend(self.0[..keep].iter().cloned());
        ids.extend(tail.0.iter().cloned());
        Self(ids)
    }
}

impl ValueObject for AncestorChain {}

impl From<Vec<ContainerId>> for AncestorChain {
    fn from(ids: Vec<ContainerId>) -> Self {
        Self(ids)
    }
}

impl FromIterator<ContainerId> for AncestorChain {
    fn from_iter<I: IntoIterator<Item = ContainerId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One snapshot of a document's lineage. The newest entry is authoritative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "parentContainerIds")]
    pub parent_container_ids: AncestorChain,
}

impl HistoryEntry {
    pub fn new(parent_container_ids: AncestorChain) -> Self {
        Self {
            parent_container_ids,
        }
    }

    pub fn chain(&self) -> &AncestorChain {
        &self.parent_container_ids
    }
}

impl ValueObject for HistoryEntry {}
