use std::sync::Arc;

use anyhow::Context;
use aum_core::persistence::{InMemorySnapshotStore, PersistenceGateway, SnapshotStore};
use aum_core::{Aggregator, AggregatorSettings, CycleRunner, PersistenceSettings};
use aum_market_data::PriceDiscovery;
use aum_storage_mongo::MongoSnapshotStore;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{OracleSettings, StorageTarget};
use crate::deployments;

/// Install the global subscriber. `AUM_LOG_FORMAT=json` switches to
/// one JSON object per line; `RUST_LOG` sets the filter (default `info`).
/// Records emitted through the `log` facade by the library crates are
/// forwarded to the same subscriber.
pub fn init_tracing() {
    let log_format = std::env::var("AUM_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

async fn build_store(settings: &OracleSettings) -> anyhow::Result<Arc<dyn SnapshotStore>> {
    match &settings.storage {
        StorageTarget::Mongo(mongo) => {
            let store = MongoSnapshotStore::connect(mongo)
                .await
                .context("Failed to create MongoDB client")?;
            tracing::info!(
                "Persisting snapshots to {}.{}",
                mongo.database,
                mongo.collection
            );
            Ok(Arc::new(store))
        }
        StorageTarget::Memory => {
            tracing::warn!("AUM_STORAGE=memory: snapshots are kept in memory and discarded on exit");
            Ok(Arc::new(InMemorySnapshotStore::new()))
        }
    }
}

/// Wire every component from the settings and check the store answers.
pub async fn build_runner(settings: &OracleSettings) -> anyhow::Result<CycleRunner> {
    let store = build_store(settings).await?;
    let gateway = PersistenceGateway::new(
        store,
        PersistenceSettings {
            duplicate_policy: settings.duplicate_policy,
            retry: settings.retry.clone(),
            ..PersistenceSettings::default()
        },
    );
    gateway
        .check_connection()
        .await
        .context("Snapshot store is unreachable")?;

    let price_discovery = PriceDiscovery::new(
        deployments::quote_providers(settings),
        deployments::price_discovery_settings(&settings.retry),
    );
    let mut aggregator_settings = AggregatorSettings::new(deployments::accounting_asset());
    aggregator_settings.cycle_timeout = settings.cycle_timeout;
    let aggregator = Aggregator::new(Arc::new(price_discovery), aggregator_settings);

    let providers = deployments::position_providers(settings);
    tracing::info!(
        "Monitoring {} with {} position providers",
        settings.account,
        providers.len()
    );

    Ok(CycleRunner::new(aggregator, providers, gateway, settings.account))
}
