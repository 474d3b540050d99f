//! Fixed parity rates.
//!
//! Some assets are redeemable one-for-one for another (a wrapped native coin,
//! a lending receipt token, a liquid staking wrapper). They have no market of
//! their own, so they are valued through their peg. Price discovery also uses
//! these pairs as the first hop of a two-step conversion.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use crate::errors::QuoteError;
use crate::models::{Asset, Quote};
use crate::provider::QuoteProvider;

const PROVIDER_ID: &str = "FIXED_RATE";

/// `1 from_symbol = rate to_symbol`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedRate {
    pub from_symbol: String,
    pub to_symbol: String,
    pub rate: Decimal,
}

impl FixedRate {
    pub fn new(from_symbol: &str, to_symbol: &str, rate: Decimal) -> Self {
        Self {
            from_symbol: from_symbol.to_string(),
            to_symbol: to_symbol.to_string(),
            rate,
        }
    }

    /// One-for-one peg.
    pub fn parity(from_symbol: &str, to_symbol: &str) -> Self {
        Self::new(from_symbol, to_symbol, Decimal::ONE)
    }
}

/// Provider backed by a static table of pegs.
#[derive(Clone, Debug, Default)]
pub struct FixedRateProvider {
    rates: Vec<FixedRate>,
}

impl FixedRateProvider {
    pub fn new(rates: Vec<FixedRate>) -> Self {
        Self { rates }
    }

    /// Target symbols reachable from `from` in one step, used for parity hops.
    pub fn pegs_for(&self, from: &Asset) -> Vec<&str> {
        self.rates
            .iter()
            .filter(|r| r.from_symbol.eq_ignore_ascii_case(&from.symbol))
            .map(|r| r.to_symbol.as_str())
            .collect()
    }

    /// Rate for `from -> to`, using the inverse of a configured `to -> from` pair.
    fn rate(&self, from: &Asset, to: &Asset) -> Option<Decimal> {
        self.rates.iter().find_map(|r| {
            if r.from_symbol.eq_ignore_ascii_case(&from.symbol)
                && r.to_symbol.eq_ignore_ascii_case(&to.symbol)
            {
                Some(r.rate)
            } else if r.to_symbol.eq_ignore_ascii_case(&from.symbol)
                && r.from_symbol.eq_ignore_ascii_case(&to.symbol)
                && !r.rate.is_zero()
            {
                Decimal::ONE.checked_div(r.rate)
            } else {
                None
            }
        })
    }
}

#[async_trait]
impl QuoteProvider for FixedRateProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        1
    }

    fn supports(&self, from: &Asset, to: &Asset) -> bool {
        self.rate(from, to).is_some()
    }

    async fn quote(&self, from: &Asset, amount: Decimal, to: &Asset) -> Result<Quote, QuoteError> {
        let rate = self
            .rate(from, to)
            .ok_or_else(|| QuoteError::no_liquidity(&from.symbol, &to.symbol))?;
        let amount_out = amount
            .checked_mul(rate)
            .ok_or_else(|| QuoteError::permanent(PROVIDER_ID, "Amount overflow"))?;
        Ok(Quote::new(
            from.clone(),
            to.clone(),
            amount,
            amount_out,
            PROVIDER_ID,
            Utc::now(),
        ))
    }
}
