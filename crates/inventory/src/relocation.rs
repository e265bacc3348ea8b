//! Subtree relocation planning.
//!
//! Moving a container re-roots its whole subtree: the moved container, every
//! container below it and every inventory item held anywhere in it need a new
//! ancestor chain. [`plan_move`] computes those chains from an in-memory
//! snapshot and returns them as history prepends; applying them is the
//! infrastructure layer's job.
//!
//! ```text
//! before                          after (mixed-contents -> production-lot)
//! root-container                  root-container
//! ├── mixed-contents              └── production-lot
//! │   ├── 1 ── item                   └── mixed-contents
//! │   └── 2 ── item                       ├── 1 ── item
//! └── production-lot                      └── 2 ── item
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use tree_core::{ContainerId, DomainError, DomainResult, Entity, InventoryItemId};

use crate::chain::{AncestorChain, HistoryEntry};
use crate::document::{Container, HistoryDocument, InventoryItem};

/// Snapshot of everything a move touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    /// The container being relocated.
    pub source: Container,
    /// Containers whose current chain contains the source id, in any order.
    pub children: Vec<Container>,
    /// Items whose current chain contains the source id, in any order.
    pub items: Vec<InventoryItem>,
    /// The container becoming the source's new direct parent.
    pub destination: Container,
}

/// "Push `entry` to the front of document `id`'s history."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryUpdate<Id> {
    pub id: Id,
    pub entry: HistoryEntry,
}

impl<Id> HistoryUpdate<Id> {
    pub fn new(id: Id, chain: AncestorChain) -> Self {
        Self {
            id,
            entry: HistoryEntry::new(chain),
        }
    }

    pub fn chain(&self) -> &AncestorChain {
        self.entry.chain()
    }
}

/// Ordered history prepends for one move.
///
/// Container updates come first (source, then descendants top-down); item
/// updates follow in the order their holders were processed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePlan {
    pub container_updates: Vec<HistoryUpdate<ContainerId>>,
    pub item_updates: Vec<HistoryUpdate<InventoryItemId>>,
}

/// Compute the history prepends that re-root `request.source` under
/// `request.destination`.
///
/// Every descendant keeps the part of its chain nearer than the source and
/// gets `[destination] + destination_chain` from the source onwards. Items
/// take `[holder] + holder_new_chain`, using the chain just computed for the
/// holder.
///
/// Fails with [`DomainError::PreconditionViolation`] before producing any
/// output if the snapshot is inconsistent with a move of this subtree.
pub fn plan_move(request: &MoveRequest) -> DomainResult<MovePlan> {
    let source_id = request.source.id();
    let destination_id = request.destination.id();
    current_chain(&request.source)?;
    let destination_chain = current_chain(&request.destination)?;

    if destination_id == source_id || destination_chain.contains(source_id) {
        return Err(DomainError::precondition(format!(
            "cannot move container '{source_id}' under '{destination_id}': destination is inside the moved subtree"
        )));
    }

    // Children sorted by where the source sits in their chain: a container
    // always sorts after every container above it in the subtree. The sort is
    // stable, so equal positions keep their input order.
    let mut seen: HashSet<&ContainerId> = HashSet::with_capacity(request.children.len() + 1);
    seen.insert(source_id);
    let mut ordered: Vec<(usize, &Container)> = Vec::with_capacity(request.children.len());
    for child in &request.children {
        if !seen.insert(child.id()) {
            return Err(DomainError::precondition(format!(
                "container '{}' appears more than once in the moved subtree",
                child.id()
            )));
        }
        let position = current_chain(child)?.position_of(source_id).ok_or_else(|| {
            DomainError::precondition(format!(
                "container '{}' is not a descendant of '{source_id}'",
                child.id()
            ))
        })?;
        ordered.push((position, child));
    }
    ordered.sort_by_key(|(position, _)| *position);

    let mut seen_items: HashSet<&InventoryItemId> = HashSet::with_capacity(request.items.len());
    let mut holders: Vec<(&ContainerId, &InventoryItem)> = Vec::with_capacity(request.items.len());
    for item in &request.items {
        if !seen_items.insert(item.id()) {
            return Err(DomainError::precondition(format!(
                "inventory item '{}' appears more than once in the moved subtree",
                item.id()
            )));
        }
        let chain = current_chain(item)?;
        if !chain.contains(source_id) {
            return Err(DomainError::precondition(format!(
                "inventory item '{}' is not held under '{source_id}'",
                item.id()
            )));
        }
        // `contains` succeeded, so the chain is non-empty.
        if let Some(holder) = chain.nearest() {
            holders.push((holder, item));
        }
    }

    let new_base = AncestorChain::under(destination_id.clone(), destination_chain);

    let mut plan = MovePlan {
        container_updates: Vec::with_capacity(ordered.len() + 1),
        item_updates: Vec::with_capacity(holders.len()),
    };
    let mut claimed = vec![false; holders.len()];

    let sequence = std::iter::once((None, &request.source))
        .chain(ordered.into_iter().map(|(position, child)| (Some(position), child)));

    for (position, container) in sequence {
        let new_chain = match position {
            None => new_base.clone(),
            Some(position) => current_chain(container)?.spliced(position, &new_base),
        };

        for (idx, (holder, item)) in holders.iter().enumerate() {
            if !claimed[idx] && *holder == container.id() {
                claimed[idx] = true;
                plan.item_updates.push(HistoryUpdate::new(
                    item.id().clone(),
                    AncestorChain::under(container.id().clone(), &new_chain),
                ));
            }
        }

        plan.container_updates
            .push(HistoryUpdate::new(container.id().clone(), new_chain));
    }

    if let Some(idx) = claimed.iter().position(|claimed| !claimed) {
        let (holder, item) = holders[idx];
        return Err(DomainError::precondition(format!(
            "inventory item '{}' is held by '{holder}', which is not part of the moved subtree snapshot",
            item.id()
        )));
    }

    Ok(plan)
}

fn current_chain<D: HistoryDocument>(doc: &D) -> DomainResult<&AncestorChain> {
    doc.current_chain().ok_or_else(|| {
        DomainError::precondition(format!("document '{}' has no history entry", doc.id()))
    })
}
