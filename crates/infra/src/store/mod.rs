//! Document store boundary.
//!
//! Two collections (`containers`, `inventory-items`) of documents shaped
//! `{ _id, history: [ { parentContainerIds: [...] }, ... ] }`, newest entry
//! first. Reads go straight to the store; writes go through a session-scoped
//! transaction and are limited to history prepends.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{InMemoryDocumentStore, InMemorySession, SessionStats};
pub use postgres::{PostgresDocumentStore, PostgresSession};
pub use r#trait::{Collection, DocumentStore, StoreError, StoreSession};
