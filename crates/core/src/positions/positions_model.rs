//! Position domain models.

use std::fmt;
use std::str::FromStr;

use aum_market_data::{Asset, Network};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};

/// How a position contributes to the portfolio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionCategory {
    /// Deposits, balances, LP principal and debt.
    Principal,
    /// Claimable incentive rewards.
    Rewards,
    /// Trading fees accrued but not yet claimed.
    UnclaimedFees,
}

/// Unit the raw amount is expressed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionUnit {
    /// Units of the position's own asset; needs price discovery.
    Token,
    /// Already a USD-equivalent amount; counted as-is.
    UsdEquivalent,
}

/// Chain state reference a reading was taken at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsOf {
    /// `None` for off-chain sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

impl AsOf {
    pub fn block(block: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            block: Some(block),
            timestamp,
        }
    }

    pub fn off_chain(timestamp: DateTime<Utc>) -> Self {
        Self {
            block: None,
            timestamp,
        }
    }
}

/// One protocol-specific holding before normalization. Negative amounts
/// are net liabilities.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub protocol: String,
    pub network: Network,
    pub asset: Asset,
    pub amount: Decimal,
    pub unit: PositionUnit,
    pub category: PositionCategory,
    pub as_of: AsOf,
}

impl Position {
    /// Token-denominated position on the asset's own network.
    pub fn token(
        protocol: &str,
        asset: Asset,
        amount: Decimal,
        category: PositionCategory,
        as_of: AsOf,
    ) -> Self {
        Self {
            protocol: protocol.to_string(),
            network: asset.network,
            asset,
            amount,
            unit: PositionUnit::Token,
            category,
            as_of,
        }
    }

    pub fn is_liability(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }
}

/// Protocol/network pair identifying one configured provider.
///
/// Rendered as `protocol:network`, which is also its map-key form in
/// serialized snapshots.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, SerializeDisplay, DeserializeFromStr,
)]
pub struct PositionKey {
    pub protocol: String,
    pub network: Network,
}

impl PositionKey {
    pub fn new(protocol: &str, network: Network) -> Self {
        Self {
            protocol: protocol.to_string(),
            network,
        }
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.protocol, self.network)
    }
}

impl FromStr for PositionKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (protocol, network) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("Invalid position key '{}': expected protocol:network", s))?;
        if protocol.is_empty() {
            return Err(format!("Invalid position key '{}': empty protocol", s));
        }
        let network = network.parse::<Network>().map_err(|e| e.to_string())?;
        Ok(Self::new(protocol, network))
    }
}

/// Everything one provider read in a single call, pinned to one block.
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderReading {
    pub as_of: AsOf,
    pub positions: Vec<Position>,
}
