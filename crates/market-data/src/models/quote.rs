use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::asset::Asset;

/// Identity conversions carry this provider id.
pub const IDENTITY_PROVIDER: &str = "IDENTITY";

/// Best-estimate conversion of `amount_in` of `from_asset` into `to_asset`.
///
/// A valuation, never an executable order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub from_asset: Asset,
    pub to_asset: Asset,
    pub amount_in: Decimal,
    pub amount_out: Decimal,
    /// Units of `to_asset` per unit of `from_asset`; zero when `amount_in` is zero.
    pub rate: Decimal,
    /// Source of the quote (COWSWAP, GECKOTERMINAL, FIXED_RATE, ...)
    pub provider: String,
    /// When the underlying price was observed.
    pub as_of: DateTime<Utc>,
}

impl Quote {
    pub fn new(
        from_asset: Asset,
        to_asset: Asset,
        amount_in: Decimal,
        amount_out: Decimal,
        provider: impl Into<String>,
        as_of: DateTime<Utc>,
    ) -> Self {
        let rate = if amount_in.is_zero() {
            Decimal::ZERO
        } else {
            amount_out.checked_div(amount_in).unwrap_or(Decimal::ZERO)
        };
        Self {
            from_asset,
            to_asset,
            amount_in,
            amount_out,
            rate,
            provider: provider.into(),
            as_of,
        }
    }

    /// Quote between two listings of the same asset (USDC on Base into USDC on Etherlink).
    pub fn identity(from_asset: Asset, to_asset: Asset, amount: Decimal, as_of: DateTime<Utc>) -> Self {
        Self::new(from_asset, to_asset, amount, amount, IDENTITY_PROVIDER, as_of)
    }

    /// Flip the sign of both amounts. Used to value liabilities.
    pub fn negated(mut self) -> Self {
        self.amount_in = -self.amount_in;
        self.amount_out = -self.amount_out;
        self
    }

    /// Seconds between `as_of` and `now`.
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.as_of).num_seconds()
    }
}
