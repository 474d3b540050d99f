use async_trait::async_trait;
use chrono::{DateTime, Utc};
use aum_core::errors::StoreError;
use aum_core::persistence::{SnapshotDocument, SnapshotKey, SnapshotStore, WriteOutcome};
use log::debug;
use mongodb::bson::{doc, Document};
use mongodb::{Client, Collection, Database};

use super::model::TimestampOnlyDB;
use crate::db::{connect, MongoSettings};
use crate::errors::{to_store_error, MongoStorageError};

/// Snapshot keys are fixed-width RFC 3339 strings, so `_id` order is time order.
fn newest_first() -> Document {
    doc! { "_id": -1 }
}

fn by_key(key: &SnapshotKey) -> Document {
    doc! { "_id": key.to_string() }
}

pub struct MongoSnapshotStore {
    database: Database,
    collection: Collection<SnapshotDocument>,
}

impl MongoSnapshotStore {
    pub fn new(client: &Client, settings: &MongoSettings) -> Self {
        let database = client.database(&settings.database);
        let collection = database.collection::<SnapshotDocument>(&settings.collection);
        Self {
            database,
            collection,
        }
    }

    pub async fn connect(settings: &MongoSettings) -> Result<Self, MongoStorageError> {
        let client = connect(settings).await?;
        Ok(Self::new(&client, settings))
    }
}

#[async_trait]
impl SnapshotStore for MongoSnapshotStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(to_store_error)?;
        Ok(())
    }

    async fn latest_timestamp(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let stamps = self.collection.clone_with_type::<TimestampOnlyDB>();
        let latest = stamps
            .find_one(doc! {})
            .sort(newest_first())
            .projection(doc! { "timestamp": 1 })
            .await
            .map_err(to_store_error)?;
        Ok(latest.map(|s| s.timestamp))
    }

    async fn insert(&self, document: &SnapshotDocument) -> Result<(), StoreError> {
        self.collection
            .insert_one(document)
            .await
            .map_err(to_store_error)?;
        debug!("Inserted snapshot {}", document.id);
        Ok(())
    }

    async fn upsert(&self, document: &SnapshotDocument) -> Result<WriteOutcome, StoreError> {
        let result = self
            .collection
            .replace_one(by_key(&document.id), document)
            .upsert(true)
            .await
            .map_err(to_store_error)?;
        let outcome = if result.upserted_id.is_some() {
            WriteOutcome::Inserted
        } else {
            WriteOutcome::Replaced
        };
        debug!("Upserted snapshot {}: {}", document.id, outcome);
        Ok(outcome)
    }

    async fn get(&self, key: &SnapshotKey) -> Result<Option<SnapshotDocument>, StoreError> {
        self.collection
            .find_one(by_key(key))
            .await
            .map_err(to_store_error)
    }

    async fn latest(&self) -> Result<Option<SnapshotDocument>, StoreError> {
        self.collection
            .find_one(doc! {})
            .sort(newest_first())
            .await
            .map_err(to_store_error)
    }
}
