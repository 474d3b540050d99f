//! Snapshot persistence: idempotent, validated, retried writes.

mod gateway;
mod memory_store;
mod persistence_model;
mod persistence_traits;

#[cfg(test)]
mod gateway_tests;

pub use gateway::PersistenceGateway;
pub use memory_store::InMemorySnapshotStore;
pub use persistence_model::{
    DuplicatePolicy, NavSummary, PositionValue, SnapshotDocument, SnapshotKey, StoredReceipt,
    WriteOutcome,
};
pub use persistence_traits::SnapshotStore;
