//! Stored snapshot document and write receipts.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::Address;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::portfolio::PortfolioSnapshot;

/// Idempotency key: the snapshot timestamp truncated to the bucket width,
/// rendered as RFC 3339 (`2025-01-01T10:00:00Z`).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, SerializeDisplay, DeserializeFromStr,
)]
pub struct SnapshotKey(DateTime<Utc>);

impl SnapshotKey {
    /// Truncate `timestamp` down to a multiple of `bucket` since the Unix epoch.
    /// Buckets shorter than a second are treated as one second.
    pub fn bucketed(timestamp: DateTime<Utc>, bucket: Duration) -> Self {
        let width = i64::try_from(bucket.as_secs()).unwrap_or(i64::MAX).max(1);
        let secs = timestamp.timestamp();
        let start = secs - secs.rem_euclid(width);
        let truncated = Utc.timestamp_opt(start, 0).single().unwrap_or(timestamp);
        Self(truncated)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

impl FromStr for SnapshotKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DateTime::parse_from_rfc3339(s).map(|dt| Self(dt.with_timezone(&Utc)))
    }
}

/// What a second write for the same key does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Replace the stored document.
    Upsert,
    /// Keep the stored document; the write is a no-op.
    Reject,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upsert" => Ok(Self::Upsert),
            "reject" => Ok(Self::Reject),
            other => Err(format!(
                "Unknown duplicate policy '{}', expected 'upsert' or 'reject'",
                other
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    Inserted,
    Replaced,
    /// A record already existed and the policy is `Reject`.
    DuplicateIgnored,
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Inserted => "inserted",
            Self::Replaced => "replaced",
            Self::DuplicateIgnored => "duplicate_ignored",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReceipt {
    pub key: SnapshotKey,
    pub outcome: WriteOutcome,
    /// Attempts the write took, retries included
    pub attempts: u32,
    pub stored_at: DateTime<Utc>,
}

/// Net asset value in the accounting asset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavSummary {
    pub total_assets: Decimal,
    /// `total_assets` scaled by the accounting asset's decimals, as an integer string
    pub total_assets_raw: String,
}

/// Normalized value of one entry, for the sorted overview.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionValue {
    pub key: String,
    pub value: Decimal,
}

/// One stored record per snapshot key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDocument {
    #[serde(rename = "_id")]
    pub id: SnapshotKey,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub address: Address,
    pub nav: NavSummary,
    /// Normalized entries, largest value first
    pub positions: Vec<PositionValue>,
    /// Keys of entries that carry a failure marker
    pub failed: Vec<String>,
    pub complete: bool,
    pub snapshot: PortfolioSnapshot,
}

impl SnapshotDocument {
    pub fn new(key: SnapshotKey, snapshot: PortfolioSnapshot, created_at: DateTime<Utc>) -> Self {
        let total = snapshot.total();
        let decimals = u32::from(snapshot.accounting_asset().decimals);

        let mut positions: Vec<PositionValue> = snapshot
            .normalized()
            .map(|p| PositionValue {
                key: p.key.to_string(),
                value: p.value,
            })
            .collect();
        positions.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.key.cmp(&b.key)));

        Self {
            id: key,
            timestamp: snapshot.timestamp(),
            created_at,
            address: snapshot.account(),
            nav: NavSummary {
                total_assets: total,
                total_assets_raw: raw_amount(total, decimals),
            },
            positions,
            failed: snapshot.failures().map(|m| m.key.to_string()).collect(),
            complete: snapshot.is_complete(),
            snapshot,
        }
    }
}

/// `amount * 10^decimals`, truncated toward zero.
fn raw_amount(amount: Decimal, decimals: u32) -> String {
    let mut scaled = amount.round_dp_with_strategy(decimals, RoundingStrategy::ToZero);
    scaled.rescale(decimals);
    scaled.mantissa().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_key_truncates_to_the_hour() {
        let ts = DateTime::parse_from_rfc3339("2025-03-04T10:59:59.750Z")
            .unwrap()
            .with_timezone(&Utc);
        let key = SnapshotKey::bucketed(ts, Duration::from_secs(3600));
        assert_eq!(key.to_string(), "2025-03-04T10:00:00Z");
        assert_eq!("2025-03-04T10:00:00Z".parse::<SnapshotKey>().unwrap(), key);
    }

    #[test]
    fn test_same_hour_same_key() {
        let a = DateTime::parse_from_rfc3339("2025-03-04T10:00:01Z").unwrap().with_timezone(&Utc);
        let b = DateTime::parse_from_rfc3339("2025-03-04T10:45:00Z").unwrap().with_timezone(&Utc);
        let hour = Duration::from_secs(3600);
        assert_eq!(SnapshotKey::bucketed(a, hour), SnapshotKey::bucketed(b, hour));
    }

    #[test]
    fn test_raw_amount() {
        assert_eq!(raw_amount(dec!(845.1234567), 6), "845123456");
        assert_eq!(raw_amount(dec!(12), 6), "12000000");
        assert_eq!(raw_amount(dec!(-1.5), 6), "-1500000");
    }

    #[test]
    fn test_duplicate_policy_parse() {
        assert_eq!("Upsert".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::Upsert);
        assert_eq!("reject".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::Reject);
        assert!("ignore".parse::<DuplicatePolicy>().is_err());
    }
}
