//! Aggregation of provider readings into one portfolio snapshot.
//!
//! Providers are read concurrently and isolated from each other. Each
//! entry ends up either normalized (every leg valued in the accounting
//! asset) or as a failure marker; the join at the end is the only place
//! results meet.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use alloy_primitives::Address;
use aum_market_data::PriceDiscoveryTrait;
use chrono::Utc;
use futures::future::join_all;
use log::{debug, info, warn};
use rust_decimal::Decimal;
use tokio::time::{timeout, timeout_at, Instant};

use super::snapshot_model::{
    FailureMarker, NormalizedLeg, NormalizedPosition, PortfolioSnapshot, PositionOutcome,
};
use crate::errors::AggregateError;
use crate::positions::{Position, PositionKey, PositionProvider, PositionUnit};
use crate::settings::AggregatorSettings;

/// Provider id recorded on legs that are already USD-equivalent.
pub const USD_EQUIVALENT_PROVIDER: &str = "USD_EQUIVALENT";

pub struct Aggregator {
    price_discovery: Arc<dyn PriceDiscoveryTrait>,
    settings: AggregatorSettings,
}

impl Aggregator {
    pub fn new(price_discovery: Arc<dyn PriceDiscoveryTrait>, settings: AggregatorSettings) -> Self {
        Self {
            price_discovery,
            settings,
        }
    }

    pub fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }

    /// Read and normalize every provider.
    ///
    /// Fails only when nothing is configured or nothing could be
    /// normalized; any other failure is kept as a marker in the snapshot.
    pub async fn aggregate(
        &self,
        providers: &[PositionProvider],
        account: Address,
    ) -> Result<PortfolioSnapshot, AggregateError> {
        if providers.is_empty() {
            return Err(AggregateError::NoProvidersConfigured);
        }
        let mut seen = HashSet::new();
        let duplicate = providers
            .iter()
            .map(PositionProvider::key)
            .find(|key| !seen.insert(key.clone()));
        if let Some(duplicate) = duplicate {
            return Err(AggregateError::DuplicateProviderKey(duplicate.to_string()));
        }

        let timestamp = Utc::now();
        let deadline = Instant::now() + self.settings.cycle_timeout;

        let outcomes = join_all(
            providers
                .iter()
                .map(|provider| self.evaluate(provider, account, deadline)),
        )
        .await;

        let entries: BTreeMap<PositionKey, PositionOutcome> = outcomes.into_iter().collect();
        let normalized = entries.values().filter(|o| !o.is_failed()).count();
        if normalized == 0 {
            let failures: Vec<FailureMarker> = entries
                .into_values()
                .filter_map(|outcome| match outcome {
                    PositionOutcome::Failed(marker) => Some(marker),
                    PositionOutcome::Normalized(_) => None,
                })
                .collect();
            warn!("All {} position providers failed", failures.len());
            return Err(AggregateError::AllProvidersFailed { failures });
        }

        let snapshot = PortfolioSnapshot::new(
            timestamp,
            account,
            self.settings.accounting_asset.clone(),
            entries,
        );
        info!(
            "Aggregated {} of {} entries, total {} {}",
            normalized,
            providers.len(),
            snapshot.total(),
            self.settings.accounting_asset.symbol
        );
        Ok(snapshot)
    }

    async fn evaluate(
        &self,
        provider: &PositionProvider,
        account: Address,
        deadline: Instant,
    ) -> (PositionKey, PositionOutcome) {
        let key = provider.key();
        let pending = self.read_and_normalize(provider, &key, account);
        let outcome = match timeout_at(deadline, pending).await {
            Ok(outcome) => outcome,
            Err(_) => PositionOutcome::Failed(FailureMarker::timeout(
                key.clone(),
                format!(
                    "cycle deadline of {:?} reached before the entry completed",
                    self.settings.cycle_timeout
                ),
            )),
        };
        if let PositionOutcome::Failed(marker) = &outcome {
            warn!("Position entry failed: {}", marker);
        }
        (key, outcome)
    }

    async fn read_and_normalize(
        &self,
        provider: &PositionProvider,
        key: &PositionKey,
        account: Address,
    ) -> PositionOutcome {
        let read = timeout(
            self.settings.read_timeout,
            provider.read_position(key.network, account),
        )
        .await;

        let reading = match read {
            Ok(Ok(reading)) => reading,
            Ok(Err(e)) => {
                return PositionOutcome::Failed(FailureMarker::read(
                    key.clone(),
                    e.kind(),
                    e.to_string(),
                ))
            }
            Err(_) => {
                return PositionOutcome::Failed(FailureMarker::timeout(
                    key.clone(),
                    format!("{} read exceeded {:?}", provider.kind(), self.settings.read_timeout),
                ))
            }
        };
        debug!(
            "{} read {} leg(s) at {:?}",
            key,
            reading.positions.len(),
            reading.as_of.block
        );

        let legs = join_all(
            reading
                .positions
                .iter()
                .map(|position| self.normalize(key, position)),
        )
        .await;

        // All legs or nothing: a partially valued entry would understate the total.
        let mut normalized = Vec::with_capacity(legs.len());
        let mut first_failure = None;
        for leg in legs {
            match leg {
                Ok(leg) => normalized.push(leg),
                Err(marker) => {
                    debug!("Leg failed: {}", marker);
                    if first_failure.is_none() {
                        first_failure = Some(marker);
                    }
                }
            }
        }
        match first_failure {
            Some(marker) => PositionOutcome::Failed(marker),
            None => PositionOutcome::Normalized(NormalizedPosition::new(
                key.clone(),
                reading.as_of,
                normalized,
            )),
        }
    }

    async fn normalize(
        &self,
        key: &PositionKey,
        position: &Position,
    ) -> Result<NormalizedLeg, FailureMarker> {
        if position.unit == PositionUnit::UsdEquivalent {
            return Ok(NormalizedLeg {
                asset: position.asset.symbol.clone(),
                network: position.network,
                category: position.category,
                amount: position.amount,
                value: position.amount,
                rate: Decimal::ONE,
                quote_provider: USD_EQUIVALENT_PROVIDER.to_string(),
            });
        }

        let target = &self.settings.accounting_asset;
        let quote = timeout(
            self.settings.quote_timeout,
            self.price_discovery.quote(&position.asset, position.amount, target),
        )
        .await
        .map_err(|_| {
            FailureMarker::timeout(
                key.clone(),
                format!("quote exceeded {:?}", self.settings.quote_timeout),
            )
            .with_asset(&position.asset)
        })?
        .map_err(|e| {
            FailureMarker::normalize(key.clone(), &position.asset, e.kind(), e.to_string())
        })?;

        debug!(
            "{} {} {} = {} {} via {}",
            key, position.amount, position.asset.symbol, quote.amount_out, target.symbol, quote.provider
        );
        Ok(NormalizedLeg {
            asset: position.asset.symbol.clone(),
            network: position.network,
            category: position.category,
            amount: position.amount,
            value: quote.amount_out,
            rate: quote.rate,
            quote_provider: quote.provider,
        })
    }
}
