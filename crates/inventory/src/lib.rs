//! Container tree domain module.
//!
//! Documents (containers and inventory items) carry an append-only history of
//! ancestor chains. This crate holds the document model and the planner that
//! recomputes those chains when a subtree is moved, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod chain;
pub mod document;
pub mod relocation;

pub use chain::{AncestorChain, HistoryEntry};
pub use document::{Container, HistoryDocument, InventoryItem, PrependOutcome};
pub use relocation::{plan_move, HistoryUpdate, MovePlan, MoveRequest};
