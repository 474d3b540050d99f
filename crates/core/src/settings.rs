//! Typed settings passed into core components at construction.

use std::time::Duration;

use aum_market_data::{Asset, RetryPolicy};

use crate::persistence::DuplicatePolicy;

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_QUOTE_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_CYCLE_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(30);

/// Idempotency bucket for snapshot keys: one record per hour.
pub const DEFAULT_SNAPSHOT_BUCKET: Duration = Duration::from_secs(3600);

#[derive(Clone, Debug, PartialEq)]
pub struct AggregatorSettings {
    /// Asset every position is valued in (USDC).
    pub accounting_asset: Asset,
    /// Limit for one provider read, retries included.
    pub read_timeout: Duration,
    /// Limit for one leg's price discovery.
    pub quote_timeout: Duration,
    /// Deadline for the whole cycle; whatever is pending then becomes a timeout marker.
    pub cycle_timeout: Duration,
}

impl AggregatorSettings {
    pub fn new(accounting_asset: Asset) -> Self {
        Self {
            accounting_asset,
            read_timeout: DEFAULT_READ_TIMEOUT,
            quote_timeout: DEFAULT_QUOTE_TIMEOUT,
            cycle_timeout: DEFAULT_CYCLE_TIMEOUT,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PersistenceSettings {
    pub duplicate_policy: DuplicatePolicy,
    /// Width of the idempotency bucket the snapshot timestamp is truncated to.
    pub bucket: Duration,
    pub retry: RetryPolicy,
    /// Limit for a single store call. Each retry attempt gets its own budget.
    pub write_timeout: Duration,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Upsert,
            bucket: DEFAULT_SNAPSHOT_BUCKET,
            retry: RetryPolicy::default(),
            write_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}
