//! One aggregation-and-persistence cycle.

use std::fmt;
use std::time::Duration;

use alloy_primitives::Address;
use log::{error, info};
use rust_decimal::Decimal;
use tokio::time::Instant;

use crate::errors::CycleError;
use crate::persistence::{PersistenceGateway, SnapshotKey, WriteOutcome};
use crate::portfolio::Aggregator;
use crate::positions::PositionProvider;

/// Summary of a persisted cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleReport {
    pub key: SnapshotKey,
    pub total: Decimal,
    pub accounting_symbol: String,
    pub complete: bool,
    /// Keys of entries that carry a failure marker
    pub failed: Vec<String>,
    pub outcome: WriteOutcome,
    /// Write attempts, retries included
    pub attempts: u32,
    pub duration: Duration,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "key={} total={} {} complete={} failed=[{}] outcome={} attempts={} duration={:?}",
            self.key,
            self.total,
            self.accounting_symbol,
            self.complete,
            self.failed.join(","),
            self.outcome,
            self.attempts,
            self.duration
        )
    }
}

/// Owns everything one cycle needs. All configuration arrives through the
/// constructor.
pub struct CycleRunner {
    aggregator: Aggregator,
    providers: Vec<PositionProvider>,
    gateway: PersistenceGateway,
    account: Address,
}

impl CycleRunner {
    pub fn new(
        aggregator: Aggregator,
        providers: Vec<PositionProvider>,
        gateway: PersistenceGateway,
        account: Address,
    ) -> Self {
        Self {
            aggregator,
            providers,
            gateway,
            account,
        }
    }

    pub fn gateway(&self) -> &PersistenceGateway {
        &self.gateway
    }

    /// Aggregate, then persist. A snapshot with failure markers is still
    /// persisted; only a fatal aggregation or a storage failure is an error.
    pub async fn run_once(&self) -> Result<CycleReport, CycleError> {
        let started = Instant::now();
        info!(
            "Starting cycle for {} across {} providers",
            self.account,
            self.providers.len()
        );

        let result = self.run_inner(started).await;
        match &result {
            Ok(report) => info!("Cycle complete: {}", report),
            Err(e) => error!("Cycle failed after {:?}: {}", started.elapsed(), e),
        }
        result
    }

    async fn run_inner(&self, started: Instant) -> Result<CycleReport, CycleError> {
        let snapshot = self.aggregator.aggregate(&self.providers, self.account).await?;

        let total = snapshot.total();
        let complete = snapshot.is_complete();
        let accounting_symbol = snapshot.accounting_asset().symbol.clone();
        let failed = snapshot.failures().map(|m| m.key.to_string()).collect();

        let receipt = self.gateway.store(snapshot).await?;

        Ok(CycleReport {
            key: receipt.key,
            total,
            accounting_symbol,
            complete,
            failed,
            outcome: receipt.outcome,
            attempts: receipt.attempts,
            duration: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{AggregateError, ChainError};
    use crate::persistence::{DuplicatePolicy, InMemorySnapshotStore};
    use crate::positions::test_support::{units, ScriptedChain};
    use crate::positions::{SpotConfig, SpotProvider};
    use crate::settings::{AggregatorSettings, PersistenceSettings};
    use alloy_primitives::address;
    use async_trait::async_trait;
    use aum_market_data::{Asset, Network, PriceDiscoveryTrait, Quote, QuoteError};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    const ACCOUNT: Address = address!("00000000000000000000000000000000000000aa");
    const USDC: Address = address!("796ea11fa2dd751ed01b53c372ffdb4aaa8f00f9");

    struct Identity;

    #[async_trait]
    impl PriceDiscoveryTrait for Identity {
        async fn quote(&self, from: &Asset, amount: Decimal, to: &Asset) -> Result<Quote, QuoteError> {
            Ok(Quote::identity(from.clone(), to.clone(), amount, Utc::now()))
        }
    }

    fn usdc() -> Asset {
        Asset::token("USDC", Network::Etherlink, USDC, 6)
    }

    fn runner(chain: ScriptedChain, store: Arc<InMemorySnapshotStore>) -> CycleRunner {
        let wallet = SpotProvider::new(
            SpotConfig {
                protocol: "wallet".to_string(),
                network: Network::Etherlink,
                native: None,
                tokens: vec![usdc()],
            },
            Arc::new(chain),
        );
        CycleRunner::new(
            Aggregator::new(Arc::new(Identity), AggregatorSettings::new(usdc())),
            vec![wallet.into()],
            PersistenceGateway::new(
                store,
                PersistenceSettings {
                    duplicate_policy: DuplicatePolicy::Reject,
                    ..PersistenceSettings::default()
                },
            ),
            ACCOUNT,
        )
    }

    #[tokio::test]
    async fn test_cycle_persists_and_reports() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let chain = ScriptedChain::new(Network::Etherlink).with_balance(USDC, ACCOUNT, units(42, 6));

        let report = runner(chain, store.clone()).run_once().await.unwrap();

        assert_eq!(report.total, dec!(42));
        assert!(report.complete);
        assert!(report.failed.is_empty());
        assert_eq!(report.outcome, WriteOutcome::Inserted);
        assert_eq!(store.len().await, 1);
        assert!(report.to_string().contains("total=42 USDC"));
    }

    #[tokio::test]
    async fn test_fatal_aggregation_writes_nothing() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let chain = ScriptedChain::new(Network::Etherlink).failing(ChainError::Http { status: 502 });

        let err = runner(chain, store.clone()).run_once().await.unwrap_err();

        assert!(matches!(
            err,
            CycleError::Aggregate(AggregateError::AllProvidersFailed { .. })
        ));
        assert!(store.is_empty().await);
    }
}
