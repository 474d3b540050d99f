//! Portfolio snapshot domain models.

use std::collections::BTreeMap;
use std::fmt;

use alloy_primitives::Address;
use aum_market_data::{Asset, Network};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::positions::{AsOf, PositionCategory, PositionKey};

/// Step of the cycle at which an entry was lost.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Read,
    Normalize,
    Timeout,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Read => "read",
            Self::Normalize => "normalize",
            Self::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// An explicit gap in the snapshot: the entry could not be observed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureMarker {
    /// Provider entry the marker stands in for
    pub key: PositionKey,
    pub stage: FailureStage,
    /// Machine-readable error kind (`unreachable`, `no_liquidity`, ...)
    pub kind: String,
    pub message: String,
    /// Asset whose normalization failed, for `normalize` markers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
}

impl FailureMarker {
    pub fn read(key: PositionKey, kind: &str, message: impl Into<String>) -> Self {
        Self {
            key,
            stage: FailureStage::Read,
            kind: kind.to_string(),
            message: message.into(),
            asset: None,
        }
    }

    pub fn normalize(key: PositionKey, asset: &Asset, kind: &str, message: impl Into<String>) -> Self {
        Self {
            key,
            stage: FailureStage::Normalize,
            kind: kind.to_string(),
            message: message.into(),
            asset: Some(asset.to_string()),
        }
    }

    pub fn timeout(key: PositionKey, message: impl Into<String>) -> Self {
        Self {
            key,
            stage: FailureStage::Timeout,
            kind: "timeout".to_string(),
            message: message.into(),
            asset: None,
        }
    }

    pub fn with_asset(mut self, asset: &Asset) -> Self {
        self.asset = Some(asset.to_string());
        self
    }
}

impl fmt::Display for FailureMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}/{}]", self.key, self.stage, self.kind)?;
        if let Some(asset) = &self.asset {
            write!(f, " {}", asset)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// One position leg converted into the accounting asset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedLeg {
    pub asset: String,
    pub network: Network,
    pub category: PositionCategory,
    /// Amount in the leg's own asset
    pub amount: Decimal,
    /// Value in the accounting asset; negative for liabilities
    pub value: Decimal,
    /// Accounting units per unit of `asset`
    pub rate: Decimal,
    /// Quote source, or `USD_EQUIVALENT` for legs that needed no quote
    pub quote_provider: String,
}

/// A provider entry whose every leg was normalized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPosition {
    pub key: PositionKey,
    pub as_of: AsOf,
    pub legs: Vec<NormalizedLeg>,
    /// Sum of leg values
    pub value: Decimal,
}

impl NormalizedPosition {
    pub fn new(key: PositionKey, as_of: AsOf, legs: Vec<NormalizedLeg>) -> Self {
        let value = legs.iter().map(|leg| leg.value).sum();
        Self {
            key,
            as_of,
            legs,
            value,
        }
    }

    /// True when some leg is a debt: a negative amount of its own asset.
    pub fn has_liability(&self) -> bool {
        self.legs
            .iter()
            .any(|leg| leg.amount < Decimal::ZERO && leg.value < Decimal::ZERO)
    }
}

/// Per-entry outcome kept in the snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PositionOutcome {
    Normalized(NormalizedPosition),
    Failed(FailureMarker),
}

impl PositionOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Totals per position category.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBreakdown {
    pub principal: Decimal,
    pub rewards: Decimal,
    pub unclaimed_fees: Decimal,
}

impl CategoryBreakdown {
    fn add(&mut self, category: PositionCategory, value: Decimal) {
        match category {
            PositionCategory::Principal => self.principal += value,
            PositionCategory::Rewards => self.rewards += value,
            PositionCategory::UnclaimedFees => self.unclaimed_fees += value,
        }
    }

    pub fn sum(&self) -> Decimal {
        self.principal + self.rewards + self.unclaimed_fees
    }
}

/// Result of one aggregation cycle.
///
/// Derived fields are computed once in [`PortfolioSnapshot::new`]; the
/// snapshot is immutable afterwards. A deserialized snapshot can be checked
/// with [`is_consistent`](PortfolioSnapshot::is_consistent).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSnapshot {
    timestamp: DateTime<Utc>,
    account: Address,
    accounting_asset: Asset,
    entries: BTreeMap<PositionKey, PositionOutcome>,
    total: Decimal,
    breakdown: CategoryBreakdown,
    complete: bool,
}

impl PortfolioSnapshot {
    pub fn new(
        timestamp: DateTime<Utc>,
        account: Address,
        accounting_asset: Asset,
        entries: BTreeMap<PositionKey, PositionOutcome>,
    ) -> Self {
        let breakdown = breakdown_of(&entries);
        let total = total_of(&entries);
        let complete = !entries.values().any(PositionOutcome::is_failed);
        Self {
            timestamp,
            account,
            accounting_asset,
            entries,
            total,
            breakdown,
            complete,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn accounting_asset(&self) -> &Asset {
        &self.accounting_asset
    }

    pub fn entries(&self) -> &BTreeMap<PositionKey, PositionOutcome> {
        &self.entries
    }

    /// Sum of normalized entries only.
    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn breakdown(&self) -> &CategoryBreakdown {
        &self.breakdown
    }

    /// True when no entry carries a failure marker.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn normalized(&self) -> impl Iterator<Item = &NormalizedPosition> {
        self.entries.values().filter_map(|outcome| match outcome {
            PositionOutcome::Normalized(position) => Some(position),
            PositionOutcome::Failed(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &FailureMarker> {
        self.entries.values().filter_map(|outcome| match outcome {
            PositionOutcome::Failed(marker) => Some(marker),
            PositionOutcome::Normalized(_) => None,
        })
    }

    pub fn has_liability(&self) -> bool {
        self.normalized().any(NormalizedPosition::has_liability)
    }

    /// Stored totals, breakdown and completeness agree with the entries.
    pub fn is_consistent(&self) -> bool {
        let entries_agree = self.entries.iter().all(|(key, outcome)| match outcome {
            PositionOutcome::Normalized(p) => {
                &p.key == key && p.value == p.legs.iter().map(|leg| leg.value).sum::<Decimal>()
            }
            PositionOutcome::Failed(m) => &m.key == key,
        });
        entries_agree
            && self.total == total_of(&self.entries)
            && self.breakdown == breakdown_of(&self.entries)
            && self.breakdown.sum() == self.total
            && self.complete == !self.entries.values().any(PositionOutcome::is_failed)
    }
}

fn total_of(entries: &BTreeMap<PositionKey, PositionOutcome>) -> Decimal {
    entries
        .values()
        .filter_map(|outcome| match outcome {
            PositionOutcome::Normalized(p) => Some(p.value),
            PositionOutcome::Failed(_) => None,
        })
        .sum()
}

fn breakdown_of(entries: &BTreeMap<PositionKey, PositionOutcome>) -> CategoryBreakdown {
    let mut breakdown = CategoryBreakdown::default();
    for outcome in entries.values() {
        if let PositionOutcome::Normalized(position) = outcome {
            for leg in &position.legs {
                breakdown.add(leg.category, leg.value);
            }
        }
    }
    breakdown
}
