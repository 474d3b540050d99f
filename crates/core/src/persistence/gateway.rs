//! Persistence gateway: validates a snapshot and writes it idempotently.
//!
//! ```text
//! validate ──> key = bucket(timestamp) ──> latest timestamp check
//!          ──> insert | upsert (retried) ──> read back (retried) ──> receipt
//! ```
//!
//! Every store call is bounded by `write_timeout`; an elapsed call counts as
//! a transient failure and goes through the same retry policy.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use tokio::time::timeout;

use super::persistence_model::{
    DuplicatePolicy, SnapshotDocument, SnapshotKey, StoredReceipt, WriteOutcome,
};
use super::persistence_traits::SnapshotStore;
use crate::errors::{StorageError, StoreError};
use crate::portfolio::PortfolioSnapshot;
use crate::settings::PersistenceSettings;

pub struct PersistenceGateway {
    store: Arc<dyn SnapshotStore>,
    settings: PersistenceSettings,
}

impl PersistenceGateway {
    pub fn new(store: Arc<dyn SnapshotStore>, settings: PersistenceSettings) -> Self {
        Self { store, settings }
    }

    pub fn key_for(&self, snapshot: &PortfolioSnapshot) -> SnapshotKey {
        SnapshotKey::bucketed(snapshot.timestamp(), self.settings.bucket)
    }

    /// Verify the store answers, retrying transient failures.
    pub async fn check_connection(&self) -> Result<(), StorageError> {
        self.settings
            .retry
            .run("store ping", || self.bounded(self.store.ping()))
            .await
            .map_err(|e| StorageError::from_store("ping", e))?;
        debug!("Snapshot store reachable");
        Ok(())
    }

    /// Persist `snapshot` under its bucketed key.
    ///
    /// A second call for the same key never creates a second record: it
    /// replaces the stored one or is ignored, per the duplicate policy.
    pub async fn store(&self, snapshot: PortfolioSnapshot) -> Result<StoredReceipt, StorageError> {
        validate(&snapshot)?;
        let key = self.key_for(&snapshot);

        let latest = self
            .settings
            .retry
            .run("store latest_timestamp", || {
                self.bounded(self.store.latest_timestamp())
            })
            .await
            .map_err(|e| StorageError::from_store("latest_timestamp", e))?;
        if let Some(latest) = latest {
            // Equal timestamps are a double fire of the same run and go through
            // the duplicate policy.
            if snapshot.timestamp() < latest {
                return Err(StorageError::validation(format!(
                    "snapshot taken at {} is older than the latest stored one ({})",
                    snapshot.timestamp(),
                    latest
                )));
            }
        }

        let document = SnapshotDocument::new(key, snapshot, Utc::now());
        let (outcome, attempts) = self.write(&document).await?;
        self.verify(&key).await?;

        let receipt = StoredReceipt {
            key,
            outcome,
            attempts,
            stored_at: Utc::now(),
        };
        info!(
            "Snapshot {} {} after {} attempt(s)",
            receipt.key, receipt.outcome, receipt.attempts
        );
        Ok(receipt)
    }

    async fn write(&self, document: &SnapshotDocument) -> Result<(WriteOutcome, u32), StorageError> {
        let mut attempts = 0u32;
        match self.settings.duplicate_policy {
            DuplicatePolicy::Upsert => {
                let outcome = self
                    .settings
                    .retry
                    .run("store upsert", || {
                        attempts += 1;
                        self.bounded(self.store.upsert(document))
                    })
                    .await
                    .map_err(|e| StorageError::from_store("upsert", e))?;
                Ok((outcome, attempts))
            }
            DuplicatePolicy::Reject => {
                let result = self
                    .settings
                    .retry
                    .run("store insert", || {
                        attempts += 1;
                        self.bounded(self.store.insert(document))
                    })
                    .await;
                match result {
                    Ok(()) => Ok((WriteOutcome::Inserted, attempts)),
                    // Also covers an earlier attempt that landed but whose ack was lost.
                    Err(e) if matches!(e.inner(), StoreError::DuplicateKey(_)) => {
                        warn!("Snapshot {} already stored, keeping the existing record", document.id);
                        Ok((WriteOutcome::DuplicateIgnored, attempts))
                    }
                    Err(e) => Err(StorageError::from_store("insert", e)),
                }
            }
        }
    }

    /// Read the document back after writing it.
    async fn verify(&self, key: &SnapshotKey) -> Result<(), StorageError> {
        let stored = self
            .settings
            .retry
            .run("store verify", || self.bounded(self.store.get(key)))
            .await
            .map_err(|e| StorageError::from_store("verify", e))?;
        match stored {
            Some(_) => Ok(()),
            None => Err(StorageError::ConnectionFailed {
                operation: "verify".to_string(),
                attempts: 1,
                message: format!("document {} missing after write", key),
            }),
        }
    }

    pub async fn load(&self, key: &SnapshotKey) -> Result<Option<PortfolioSnapshot>, StorageError> {
        let document = self
            .settings
            .retry
            .run("store get", || self.bounded(self.store.get(key)))
            .await
            .map_err(|e| StorageError::from_store("get", e))?;
        Ok(document.map(|d| d.snapshot))
    }

    pub async fn latest(&self) -> Result<Option<PortfolioSnapshot>, StorageError> {
        let document = self
            .settings
            .retry
            .run("store latest", || self.bounded(self.store.latest()))
            .await
            .map_err(|e| StorageError::from_store("latest", e))?;
        Ok(document.map(|d| d.snapshot))
    }

    /// Abandon `call` once `write_timeout` elapses.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        let limit = self.settings.write_timeout;
        match timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::transient(format!("timed out after {:?}", limit))),
        }
    }
}

/// Sanity checks before anything is written.
fn validate(snapshot: &PortfolioSnapshot) -> Result<(), StorageError> {
    if !snapshot.is_consistent() {
        return Err(StorageError::validation(
            "total does not equal the sum of normalized entries",
        ));
    }
    if snapshot.total().is_sign_negative() && !snapshot.total().is_zero() && !snapshot.has_liability() {
        return Err(StorageError::validation(format!(
            "negative total {} without any liability leg",
            snapshot.total()
        )));
    }
    Ok(())
}
