//! Process-local snapshot store, used for dry runs and tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;

use super::persistence_model::{SnapshotDocument, SnapshotKey, WriteOutcome};
use super::persistence_traits::SnapshotStore;
use crate::errors::StoreError;

/// Keeps documents in their serialized form so reads exercise the same
/// round trip as a real store.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    documents: RwLock<BTreeMap<SnapshotKey, Value>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

fn encode(document: &SnapshotDocument) -> Result<Value, StoreError> {
    serde_json::to_value(document).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode(value: &Value) -> Result<SnapshotDocument, StoreError> {
    serde_json::from_value(value.clone()).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn latest_timestamp(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.latest().await?.map(|d| d.timestamp))
    }

    async fn insert(&self, document: &SnapshotDocument) -> Result<(), StoreError> {
        let value = encode(document)?;
        let mut documents = self.documents.write().await;
        if documents.contains_key(&document.id) {
            return Err(StoreError::DuplicateKey(document.id.to_string()));
        }
        documents.insert(document.id, value);
        Ok(())
    }

    async fn upsert(&self, document: &SnapshotDocument) -> Result<WriteOutcome, StoreError> {
        let value = encode(document)?;
        let previous = self.documents.write().await.insert(document.id, value);
        Ok(match previous {
            Some(_) => WriteOutcome::Replaced,
            None => WriteOutcome::Inserted,
        })
    }

    async fn get(&self, key: &SnapshotKey) -> Result<Option<SnapshotDocument>, StoreError> {
        self.documents.read().await.get(key).map(decode).transpose()
    }

    async fn latest(&self) -> Result<Option<SnapshotDocument>, StoreError> {
        self.documents
            .read()
            .await
            .values()
            .next_back()
            .map(decode)
            .transpose()
    }
}
