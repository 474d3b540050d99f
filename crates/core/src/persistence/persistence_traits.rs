use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::persistence_model::{SnapshotDocument, SnapshotKey, WriteOutcome};
use crate::errors::StoreError;

/// Document store holding one [`SnapshotDocument`] per key.
///
/// Implementations make a single attempt per call; the gateway owns retries.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Cheap round trip proving the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Snapshot timestamp of the newest stored document.
    async fn latest_timestamp(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Insert a new document. Fails with [`StoreError::DuplicateKey`] if the key exists.
    async fn insert(&self, document: &SnapshotDocument) -> Result<(), StoreError>;

    /// Insert or replace. Reports which one happened.
    async fn upsert(&self, document: &SnapshotDocument) -> Result<WriteOutcome, StoreError>;

    async fn get(&self, key: &SnapshotKey) -> Result<Option<SnapshotDocument>, StoreError>;

    async fn latest(&self) -> Result<Option<SnapshotDocument>, StoreError>;
}
