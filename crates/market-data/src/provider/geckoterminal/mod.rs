//! GeckoTerminal pool price provider.
//!
//! Reads the spot price of a configured DEX pool. Only the pool's own pair
//! (in either direction) is supported. The pool price is a mid-market
//! estimate, which is what a valuation needs.
//!
//! API documentation: https://apiguide.geckoterminal.com

mod models;

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use tracing::debug;

use crate::errors::QuoteError;
use crate::models::{Asset, Quote};
use crate::provider::http::{request_error, status_error};
use crate::provider::QuoteProvider;

use models::{PoolAttributes, PoolResponse};

pub const DEFAULT_BASE_URL: &str = "https://api.geckoterminal.com";
const PROVIDER_ID: &str = "GECKOTERMINAL";

/// A pool tracked on GeckoTerminal.
#[derive(Clone, Debug)]
pub struct GeckoPool {
    /// GeckoTerminal network slug, e.g. "etherlink"
    pub network_slug: String,
    /// Pool contract address (lowercase hex)
    pub address: String,
    pub base_token: Asset,
    pub quote_token: Asset,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    /// from = base token, to = quote token
    BaseToQuote,
    /// from = quote token, to = base token
    QuoteToBase,
}

/// GeckoTerminal pool price provider.
pub struct GeckoTerminalPoolProvider {
    client: Client,
    base_url: String,
    pools: Vec<GeckoPool>,
}

impl GeckoTerminalPoolProvider {
    pub fn new(base_url: &str, pools: Vec<GeckoPool>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            pools,
        }
    }

    fn find_pool(&self, from: &Asset, to: &Asset) -> Option<(&GeckoPool, Direction)> {
        self.pools.iter().find_map(|pool| {
            if pool.base_token.same_asset(from) && pool.quote_token.same_asset(to) {
                Some((pool, Direction::BaseToQuote))
            } else if pool.quote_token.same_asset(from) && pool.base_token.same_asset(to) {
                Some((pool, Direction::QuoteToBase))
            } else {
                None
            }
        })
    }

    async fn fetch_pool(&self, pool: &GeckoPool) -> Result<PoolAttributes, QuoteError> {
        let url = format!(
            "{}/api/v2/networks/{}/pools/{}",
            self.base_url, pool.network_slug, pool.address
        );
        debug!("GeckoTerminal request: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| request_error(PROVIDER_ID, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(PROVIDER_ID, status, &body));
        }

        let parsed: PoolResponse = response.json().await.map_err(|e| {
            QuoteError::permanent(PROVIDER_ID, format!("Failed to parse pool: {}", e))
        })?;
        Ok(parsed.data.attributes)
    }
}

/// Pick the price for the requested direction. Missing or non-positive
/// prices mean the pool cannot value the pair.
fn pool_price(attributes: &PoolAttributes, direction: Direction) -> Option<Decimal> {
    let raw = match direction {
        Direction::BaseToQuote => attributes.base_token_price_quote_token.as_deref(),
        Direction::QuoteToBase => attributes.quote_token_price_base_token.as_deref(),
    }?;
    let price = Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()?;
    (price > Decimal::ZERO).then_some(price)
}

#[async_trait]
impl QuoteProvider for GeckoTerminalPoolProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        20
    }

    fn supports(&self, from: &Asset, to: &Asset) -> bool {
        self.find_pool(from, to).is_some()
    }

    async fn quote(&self, from: &Asset, amount: Decimal, to: &Asset) -> Result<Quote, QuoteError> {
        let (pool, direction) = self
            .find_pool(from, to)
            .ok_or_else(|| QuoteError::no_liquidity(&from.symbol, &to.symbol))?;

        let attributes = self.fetch_pool(pool).await?;
        let price = pool_price(&attributes, direction)
            .ok_or_else(|| QuoteError::no_liquidity(&from.symbol, &to.symbol))?;

        let amount_out = amount
            .checked_mul(price)
            .ok_or_else(|| QuoteError::permanent(PROVIDER_ID, "Amount overflow"))?;

        debug!(
            "GeckoTerminal pool {}: {} {} -> {} {} at {}",
            attributes.name.as_deref().unwrap_or(&pool.address),
            amount,
            from.symbol,
            amount_out,
            to.symbol,
            price
        );

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
