//! Canonical demo tree.
//!
//! ```text
//! root-container
//! ├── mixed-contents
//! │   ├── 1 ── item
//! │   ├── 2 ── item
//! │   └── 3 ── item
//! └── production-lot
//! ```

use serde::Serialize;

use tree_core::{ContainerId, InventoryItemId};
use tree_inventory::{AncestorChain, Container, InventoryItem};

pub const ROOT_CONTAINER_ID: &str = "root-container";
pub const MIXED_CONTENTS_ID: &str = "mixed-contents";
pub const PRODUCTION_LOT_ID: &str = "production-lot";
pub const DEFAULT_CHILD_CONTAINERS: usize = 3;

/// Documents making up the canonical tree, ready for [`DocumentStore::reset`].
///
/// [`DocumentStore::reset`]: crate::store::DocumentStore::reset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    pub containers: Vec<Container>,
    pub items: Vec<InventoryItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixtureSummary {
    pub containers: usize,
    pub inventory_items: usize,
}

impl Fixture {
    /// Build the tree with `child_containers` numbered children under
    /// `mixed-contents`, each holding one freshly identified item.
    pub fn canonical(child_containers: usize) -> Self {
        let root_id = ContainerId::from(ROOT_CONTAINER_ID);
        let root_chain = AncestorChain::root();

        let top_chain = AncestorChain::under(root_id.clone(), &root_chain);
        let mixed_id = ContainerId::from(MIXED_CONTENTS_ID);
        let child_chain = AncestorChain::under(mixed_id.clone(), &top_chain);

        let mut containers = Vec::with_capacity(child_containers + 3);
        containers.push(Container::new(root_id, root_chain));
        containers.push(Container::new(mixed_id, top_chain.clone()));
        containers.push(Container::new(PRODUCTION_LOT_ID.into(), top_chain));

        let mut items = Vec::with_capacity(child_containers);
        for n in 1..=child_containers {
            let child_id = ContainerId::new(n.to_string());
            items.push(InventoryItem::new(
                InventoryItemId::generate(),
                AncestorChain::under(child_id.clone(), &child_chain),
            ));
            containers.push(Container::new(child_id, child_chain.clone()));
        }

        Self { containers, items }
    }

    pub fn source_id() -> ContainerId {
        MIXED_CONTENTS_ID.into()
    }

    pub fn destination_id() -> ContainerId {
        PRODUCTION_LOT_ID.into()
    }

    pub fn summary(&self) -> FixtureSummary {
        FixtureSummary {
            containers: self.containers.len(),
            inventory_items: self.items.len(),
        }
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::canonical(DEFAULT_CHILD_CONTAINERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tree_core::Entity;
    use tree_inventory::HistoryDocument;

    fn chain(ids: &[&str]) -> AncestorChain {
        ids.iter().map(|id| ContainerId::from(*id)).collect()
    }

    #[test]
    fn default_tree_has_three_children_with_one_item_each() {
        let fixture = Fixture::default();
        assert_eq!(
            fixture.summary(),
            FixtureSummary {
                containers: 6,
                inventory_items: 3
            }
        );

        let child = fixture
            .containers
            .iter()
            .find(|c| c.id().as_str() == "2")
            .unwrap();
        assert_eq!(
            child.current_chain(),
            Some(&chain(&["mixed-contents", "root-container"]))
        );

        let holders: Vec<_> = fixture
            .items
            .iter()
            .map(|i| i.holder().unwrap().as_str().to_string())
            .collect();
        assert_eq!(holders, vec!["1", "2", "3"]);
    }

    #[test]
    fn root_and_top_level_chains() {
        let fixture = Fixture::canonical(1);
        let by_id = |id: &str| {
            fixture
                .containers
                .iter()
                .find(|c| c.id().as_str() == id)
                .unwrap()
                .current_chain()
                .cloned()
        };
        assert_eq!(by_id(ROOT_CONTAINER_ID), Some(AncestorChain::root()));
        assert_eq!(by_id(PRODUCTION_LOT_ID), Some(chain(&["root-container"])));
        assert_eq!(by_id(MIXED_CONTENTS_ID), Some(chain(&["root-container"])));
    }

    #[test]
    fn item_ids_are_unique_across_resets() {
        let a = Fixture::canonical(5);
        let b = Fixture::canonical(5);
        let ids: HashSet<_> = a.items.iter().chain(&b.items).map(|i| i.id().clone()).collect();
        assert_eq!(ids.len(), 10);
    }
}
