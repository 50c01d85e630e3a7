//! Cache module for persisting bank records
//!
//! This module provides the `BankStore` seam used by the lookup orchestrator,
//! a JSON snapshot implementation for real use, an in-memory implementation for
//! tests, and the literal query matcher both share.

mod file_store;
mod matcher;
mod store;

pub use file_store::JsonFileStore;
pub use matcher::QueryMatcher;
pub use store::{BankStore, MemoryStore, StoreError, UpsertReport};
