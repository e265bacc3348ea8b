//! Infrastructure layer: document stores, transactional apply, fixture and
//! move orchestration, config.

pub mod applier;
pub mod config;
pub mod fixture;
pub mod move_service;
pub mod store;
