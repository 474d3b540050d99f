use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{address, Address};
use async_trait::async_trait;
use aum_market_data::{Asset, Network, RetryPolicy};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::gateway::PersistenceGateway;
use super::memory_store::InMemorySnapshotStore;
use super::persistence_model::{
    DuplicatePolicy, SnapshotDocument, SnapshotKey, WriteOutcome,
};
use super::persistence_traits::SnapshotStore;
use crate::errors::{StorageError, StoreError};
use crate::portfolio::{
    FailureMarker, NormalizedLeg, NormalizedPosition, PortfolioSnapshot, PositionOutcome,
};
use crate::positions::{AsOf, PositionCategory, PositionKey};
use crate::settings::PersistenceSettings;

const ACCOUNT: Address = address!("00000000000000000000000000000000000000aa");
const USDC: Address = address!("796ea11fa2dd751ed01b53c372ffdb4aaa8f00f9");

fn at(ts: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc)
}

fn leg(symbol: &str, amount: Decimal, value: Decimal) -> NormalizedLeg {
    NormalizedLeg {
        asset: symbol.to_string(),
        network: Network::Etherlink,
        category: PositionCategory::Principal,
        amount,
        value,
        rate: if amount.is_zero() { Decimal::ZERO } else { value / amount },
        quote_provider: "SCRIPTED".to_string(),
    }
}

fn snapshot_with(ts: DateTime<Utc>, legs: Vec<(&str, Vec<NormalizedLeg>)>) -> PortfolioSnapshot {
    let mut entries = BTreeMap::new();
    for (protocol, legs) in legs {
        let key = PositionKey::new(protocol, Network::Etherlink);
        entries.insert(
            key.clone(),
            PositionOutcome::Normalized(NormalizedPosition::new(key, AsOf::block(1, ts), legs)),
        );
    }
    let failed = PositionKey::new("curve", Network::Etherlink);
    entries.insert(
        failed.clone(),
        PositionOutcome::Failed(FailureMarker::read(failed, "unreachable", "connection refused")),
    );
    PortfolioSnapshot::new(
        ts,
        ACCOUNT,
        Asset::token("USDC", Network::Etherlink, USDC, 6),
        entries,
    )
}

fn snapshot(ts: &str, total: Decimal) -> PortfolioSnapshot {
    snapshot_with(at(ts), vec![("wallet", vec![leg("USDC", total, total)])])
}

fn settings(policy: DuplicatePolicy) -> PersistenceSettings {
    PersistenceSettings {
        duplicate_policy: policy,
        retry: RetryPolicy::new(3, Duration::from_millis(100)),
        ..PersistenceSettings::default()
    }
}

/// Fails the first `failures` calls of every operation with `error`.
struct FlakyStore {
    inner: InMemorySnapshotStore,
    failures: AtomicU32,
    error: StoreError,
    calls: AtomicU32,
}

impl FlakyStore {
    fn new(failures: u32, error: StoreError) -> Self {
        Self {
            inner: InMemorySnapshotStore::new(),
            failures: AtomicU32::new(failures),
            error,
            calls: AtomicU32::new(0),
        }
    }

    fn trip(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(self.error.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for FlakyStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.trip()?;
        self.inner.ping().await
    }

    async fn latest_timestamp(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.inner.latest_timestamp().await
    }

    async fn insert(&self, document: &SnapshotDocument) -> Result<(), StoreError> {
        self.trip()?;
        self.inner.insert(document).await
    }

    async fn upsert(&self, document: &SnapshotDocument) -> Result<WriteOutcome, StoreError> {
        self.trip()?;
        self.inner.upsert(document).await
    }

    async fn get(&self, key: &SnapshotKey) -> Result<Option<SnapshotDocument>, StoreError> {
        self.inner.get(key).await
    }

    async fn latest(&self) -> Result<Option<SnapshotDocument>, StoreError> {
        self.inner.latest().await
    }
}

/// Answers reads from `inner` but never completes a write.
struct StalledStore {
    inner: InMemorySnapshotStore,
    writes: AtomicU32,
}

#[async_trait]
impl SnapshotStore for StalledStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }

    async fn latest_timestamp(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.inner.latest_timestamp().await
    }

    async fn insert(&self, _document: &SnapshotDocument) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }

    async fn upsert(&self, _document: &SnapshotDocument) -> Result<WriteOutcome, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }

    async fn get(&self, key: &SnapshotKey) -> Result<Option<SnapshotDocument>, StoreError> {
        self.inner.get(key).await
    }

    async fn latest(&self) -> Result<Option<SnapshotDocument>, StoreError> {
        self.inner.latest().await
    }
}

#[tokio::test]
async fn test_upsert_policy_replaces_within_the_same_hour() {
    let store = Arc::new(InMemorySnapshotStore::new());
    let gateway = PersistenceGateway::new(store.clone(), settings(DuplicatePolicy::Upsert));

    let first = gateway
        .store(snapshot("2025-03-04T10:05:00Z", dec!(100)))
        .await
        .unwrap();
    let second = gateway
        .store(snapshot("2025-03-04T10:35:00Z", dec!(120)))
        .await
        .unwrap();

    assert_eq!(first.outcome, WriteOutcome::Inserted);
    assert_eq!(second.outcome, WriteOutcome::Replaced);
    assert_eq!(first.key, second.key);
    assert_eq!(store.len().await, 1);

    let stored = gateway.load(&first.key).await.unwrap().unwrap();
    assert_eq!(stored.total(), dec!(120));
}

#[tokio::test]
async fn test_reject_policy_keeps_the_first_record() {
    let store = Arc::new(InMemorySnapshotStore::new());
    let gateway = PersistenceGateway::new(store.clone(), settings(DuplicatePolicy::Reject));

    let first = gateway
        .store(snapshot("2025-03-04T10:05:00Z", dec!(100)))
        .await
        .unwrap();
    let second = gateway
        .store(snapshot("2025-03-04T10:35:00Z", dec!(120)))
        .await
        .unwrap();

    assert_eq!(first.outcome, WriteOutcome::Inserted);
    assert_eq!(second.outcome, WriteOutcome::DuplicateIgnored);
    assert_eq!(store.len().await, 1);

    let stored = gateway.load(&first.key).await.unwrap().unwrap();
    assert_eq!(stored.total(), dec!(100));
}

#[tokio::test]
async fn test_stored_snapshot_reads_back_equal() {
    let gateway = PersistenceGateway::new(
        Arc::new(InMemorySnapshotStore::new()),
        settings(DuplicatePolicy::Upsert),
    );
    let snapshot = snapshot_with(
        at("2025-03-04T10:05:00Z"),
        vec![
            ("aave", vec![leg("USDC", dec!(800), dec!(800))]),
            ("wallet", vec![leg("XTZ", dec!(50), dec!(45.000000123))]),
        ],
    );

    let receipt = gateway.store(snapshot.clone()).await.unwrap();
    let loaded = gateway.load(&receipt.key).await.unwrap().unwrap();

    assert_eq!(loaded, snapshot);
    assert_eq!(loaded.total(), dec!(845.000000123));
    assert!(!loaded.is_complete());
    assert_eq!(gateway.latest().await.unwrap(), Some(snapshot));
}

#[tokio::test]
async fn test_document_overview_is_sorted_by_value() {
    let store = Arc::new(InMemorySnapshotStore::new());
    let gateway = PersistenceGateway::new(store.clone(), settings(DuplicatePolicy::Upsert));
    let receipt = gateway
        .store(snapshot_with(
            at("2025-03-04T10:05:00Z"),
            vec![
                ("wallet", vec![leg("USDC", dec!(45), dec!(45))]),
                ("aave", vec![leg("USDC", dec!(800), dec!(800))]),
            ],
        ))
        .await
        .unwrap();

    let document = store.get(&receipt.key).await.unwrap().unwrap();
    let keys: Vec<&str> = document.positions.iter().map(|p| p.key.as_str()).collect();
    assert_eq!(keys, vec!["aave:etherlink", "wallet:etherlink"]);
    assert_eq!(document.failed, vec!["curve:etherlink".to_string()]);
    assert_eq!(document.nav.total_assets_raw, "845000000");
    assert_eq!(document.id.to_string(), "2025-03-04T10:00:00Z");
}

#[tokio::test]
async fn test_older_snapshot_is_rejected() {
    let gateway = PersistenceGateway::new(
        Arc::new(InMemorySnapshotStore::new()),
        settings(DuplicatePolicy::Upsert),
    );
    gateway
        .store(snapshot("2025-03-04T11:05:00Z", dec!(100)))
        .await
        .unwrap();

    let err = gateway
        .store(snapshot("2025-03-04T10:05:00Z", dec!(100)))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::ValidationFailed { .. }));
}

#[tokio::test]
async fn test_older_snapshot_in_the_same_hour_does_not_replace_newer() {
    let store = Arc::new(InMemorySnapshotStore::new());
    let gateway = PersistenceGateway::new(store.clone(), settings(DuplicatePolicy::Upsert));
    let newer = gateway
        .store(snapshot("2025-03-04T10:35:00Z", dec!(120)))
        .await
        .unwrap();

    let err = gateway
        .store(snapshot("2025-03-04T10:05:00Z", dec!(100)))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::ValidationFailed { .. }));

    assert_eq!(store.len().await, 1);
    let stored = store.get(&newer.key).await.unwrap().unwrap();
    assert_eq!(stored.timestamp, at("2025-03-04T10:35:00Z"));
    assert_eq!(stored.snapshot.total(), dec!(120));
}

#[tokio::test]
async fn test_same_timestamp_goes_through_duplicate_policy() {
    let store = Arc::new(InMemorySnapshotStore::new());
    let gateway = PersistenceGateway::new(store.clone(), settings(DuplicatePolicy::Reject));
    gateway
        .store(snapshot("2025-03-04T10:35:00Z", dec!(120)))
        .await
        .unwrap();

    let again = gateway
        .store(snapshot("2025-03-04T10:35:00Z", dec!(120)))
        .await
        .unwrap();
    assert_eq!(again.outcome, WriteOutcome::DuplicateIgnored);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_negative_total_without_debt_is_rejected() {
    let gateway = PersistenceGateway::new(
        Arc::new(InMemorySnapshotStore::new()),
        settings(DuplicatePolicy::Upsert),
    );
    // A positive holding valued negative: a broken quote, not a debt.
    let bogus = snapshot_with(
        at("2025-03-04T10:05:00Z"),
        vec![("wallet", vec![leg("XTZ", dec!(10), dec!(-10))])],
    );

    let err = gateway.store(bogus).await.unwrap_err();
    assert!(matches!(err, StorageError::ValidationFailed { .. }));
}

#[tokio::test]
async fn test_net_debt_is_accepted() {
    let gateway = PersistenceGateway::new(
        Arc::new(InMemorySnapshotStore::new()),
        settings(DuplicatePolicy::Upsert),
    );
    let receipt = gateway
        .store(snapshot("2025-03-04T10:05:00Z", dec!(-75)))
        .await
        .unwrap();
    assert_eq!(receipt.outcome, WriteOutcome::Inserted);
}

#[tokio::test]
async fn test_tampered_total_is_rejected() {
    let gateway = PersistenceGateway::new(
        Arc::new(InMemorySnapshotStore::new()),
        settings(DuplicatePolicy::Upsert),
    );
    let mut json = serde_json::to_value(snapshot("2025-03-04T10:05:00Z", dec!(100))).unwrap();
    json["total"] = serde_json::json!("150");
    let tampered: PortfolioSnapshot = serde_json::from_value(json).unwrap();

    let err = gateway.store(tampered).await.unwrap_err();
    assert!(matches!(err, StorageError::ValidationFailed { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_transient_write_failures_are_retried() {
    let store = Arc::new(FlakyStore::new(2, StoreError::transient("connection reset")));
    let gateway = PersistenceGateway::new(store.clone(), settings(DuplicatePolicy::Upsert));

    let receipt = gateway
        .store(snapshot("2025-03-04T10:05:00Z", dec!(100)))
        .await
        .unwrap();

    assert_eq!(receipt.attempts, 3);
    assert_eq!(receipt.outcome, WriteOutcome::Inserted);
    assert_eq!(store.inner.len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_fail_with_connection_error() {
    let store = Arc::new(FlakyStore::new(10, StoreError::transient("server selection timeout")));
    let gateway = PersistenceGateway::new(store.clone(), settings(DuplicatePolicy::Reject));

    let err = gateway
        .store(snapshot("2025-03-04T10:05:00Z", dec!(100)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StorageError::ConnectionFailed { attempts: 3, .. }
    ));
    assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    assert!(store.inner.is_empty().await);
}

#[tokio::test]
async fn test_rejected_operation_is_not_retried() {
    let store = Arc::new(FlakyStore::new(1, StoreError::Rejected("not authorized".to_string())));
    let gateway = PersistenceGateway::new(store.clone(), settings(DuplicatePolicy::Upsert));

    let err = gateway
        .store(snapshot("2025-03-04T10:05:00Z", dec!(100)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StorageError::ConnectionFailed { attempts: 1, .. }
    ));
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_check_connection_retries_ping() {
    let store = Arc::new(FlakyStore::new(1, StoreError::transient("no primary")));
    let gateway = PersistenceGateway::new(store.clone(), settings(DuplicatePolicy::Upsert));

    gateway.check_connection().await.unwrap();
    assert_eq!(store.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_write_is_abandoned_after_the_timeout() {
    let store = Arc::new(StalledStore {
        inner: InMemorySnapshotStore::new(),
        writes: AtomicU32::new(0),
    });
    let gateway = PersistenceGateway::new(
        store.clone(),
        PersistenceSettings {
            retry: RetryPolicy::new(2, Duration::from_millis(100)),
            write_timeout: Duration::from_secs(5),
            ..PersistenceSettings::default()
        },
    );

    let started = tokio::time::Instant::now();
    let err = gateway
        .store(snapshot("2025-03-04T10:05:00Z", dec!(100)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StorageError::ConnectionFailed { attempts: 2, .. }
    ));
    assert_eq!(store.writes.load(Ordering::SeqCst), 2);
    assert!(started.elapsed() < Duration::from_secs(60));
    assert!(store.inner.is_empty().await);
}
