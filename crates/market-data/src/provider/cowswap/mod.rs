//! CoW Swap quote provider.
//!
//! Asks the CoW Protocol order book for a sell quote and reads it as a
//! valuation: the returned `buyAmount` is grossed up by
//! `sellAmountBeforeFee / sellAmount` so network fees do not reduce the
//! estimate. No order is ever signed or posted.
//!
//! Tokens are resolved by symbol against a token table for the quoting
//! chain, so an asset held elsewhere (USDT on Etherlink) is priced as its
//! bridged counterpart on Ethereum.
//!
//! API documentation: https://docs.cow.fi/cow-protocol/reference/apis/orderbook

mod models;

use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::errors::QuoteError;
use crate::models::{scale_raw_amount, Asset, Network, Quote};
use crate::provider::http::{request_error, status_error};
use crate::provider::QuoteProvider;

use models::{ErrorResponse, QuoteRequest, QuoteResponse};

pub const DEFAULT_BASE_URL: &str = "https://api.cow.fi/mainnet";
const PROVIDER_ID: &str = "COWSWAP";

/// API error types that mean "no route for this pair or size".
const NO_LIQUIDITY_ERRORS: &[&str] = &[
    "NoLiquidity",
    "SellAmountDoesNotCoverFee",
    "UnsupportedToken",
    "ZeroAmount",
];

/// CoW Swap quote provider.
pub struct CowSwapQuoteProvider {
    client: Client,
    base_url: String,
    network: Network,
    tokens: Vec<Asset>,
    quoter: Address,
}

impl CowSwapQuoteProvider {
    /// Create a provider quoting on `network` against the given token table.
    pub fn new(base_url: &str, network: Network, tokens: Vec<Asset>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            network,
            tokens,
            quoter: Address::ZERO,
        }
    }

    /// Address the quote is requested for. Only affects fee estimation.
    pub fn with_quoter(mut self, quoter: Address) -> Self {
        self.quoter = quoter;
        self
    }

    fn token(&self, symbol: &str) -> Option<&Asset> {
        self.tokens
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol) && t.address.is_some())
    }

    async fn fetch_quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, QuoteError> {
        let url = format!("{}/api/v1/quote", self.base_url);

        debug!(
            "CoW Swap quote request: {} -> {} ({} raw)",
            request.sell_token, request.buy_token, request.sell_amount_before_fee
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| request_error(PROVIDER_ID, &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| request_error(PROVIDER_ID, &e))?;

        if !status.is_success() {
            if let Ok(api_error) = serde_json::from_str::<ErrorResponse>(&body) {
                if NO_LIQUIDITY_ERRORS.contains(&api_error.error_type.as_str()) {
                    debug!(
                        "CoW Swap has no route: {} ({})",
                        api_error.error_type, api_error.description
                    );
                    return Err(QuoteError::NoLiquidity {
                        from_asset: request.sell_token.to_string(),
                        to_asset: request.buy_token.to_string(),
                    });
                }
            }
            warn!("CoW Swap returned HTTP {}", status);
            return Err(status_error(PROVIDER_ID, status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            QuoteError::permanent(PROVIDER_ID, format!("Failed to parse quote: {}", e))
        })
    }
}

/// Gross the quoted buy amount back up to the full sell amount and check expiry.
///
/// Returns the raw buy amount a fee-free trade of `sell_amount_before_fee`
/// would have produced.
fn gross_buy_amount(
    response: &QuoteResponse,
    sell_amount_before_fee: U256,
    now: DateTime<Utc>,
) -> Result<U256, QuoteError> {
    let parse = |field: &str, value: &str| {
        U256::from_str(value).map_err(|e| {
            QuoteError::permanent(PROVIDER_ID, format!("Invalid {} '{}': {}", field, value, e))
        })
    };
    let sell_amount = parse("sellAmount", &response.quote.sell_amount)?;
    let buy_amount = parse("buyAmount", &response.quote.buy_amount)?;

    if response.expiration < now {
        return Err(QuoteError::StaleQuote {
            provider: PROVIDER_ID.to_string(),
            age_secs: (now - response.expiration).num_seconds(),
            max_age_secs: 0,
        });
    }

    if sell_amount.is_zero() || buy_amount.is_zero() {
        return Err(QuoteError::no_liquidity("sell", "buy"));
    }

    buy_amount
        .checked_mul(sell_amount_before_fee)
        .map(|v| v / sell_amount)
        .ok_or_else(|| QuoteError::permanent(PROVIDER_ID, "Quote amounts overflow"))
}

#[async_trait]
impl QuoteProvider for CowSwapQuoteProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        10
    }

    fn supports(&self, from: &Asset, to: &Asset) -> bool {
        !from.same_asset(to) && self.token(&from.symbol).is_some() && self.token(&to.symbol).is_some()
    }

    async fn quote(&self, from: &Asset, amount: Decimal, to: &Asset) -> Result<Quote, QuoteError> {
        let (sell_token, buy_token) = match (self.token(&from.symbol), self.token(&to.symbol)) {
            (Some(sell), Some(buy)) => (sell, buy),
            _ => return Err(QuoteError::no_liquidity(&from.symbol, &to.symbol)),
        };
        let now = Utc::now();

        let sell_raw = sell_token
            .to_raw(amount)
            .map_err(|e| QuoteError::invalid_amount(&from.symbol, e))?;
        if sell_raw.is_zero() {
            return Ok(Quote::new(
                from.clone(),
                to.clone(),
                amount,
                Decimal::ZERO,
                PROVIDER_ID,
                now,
            ));
        }

        let (Some(sell_address), Some(buy_address)) = (sell_token.address, buy_token.address)
        else {
            return Err(QuoteError::no_liquidity(&from.symbol, &to.symbol));
        };

        let request = QuoteRequest {
            sell_token: sell_address,
            buy_token: buy_address,
            from: self.quoter,
            receiver: self.quoter,
            kind: "sell",
            sell_amount_before_fee: sell_raw.to_string(),
            price_quality: "optimal",
            signing_scheme: "eip712",
            onchain_order: false,
        };

        let response = self.fetch_quote(&request).await.map_err(|e| match e {
            QuoteError::NoLiquidity { .. } => QuoteError::no_liquidity(&from.symbol, &to.symbol),
            other => other,
        })?;

        let gross = gross_buy_amount(&response, sell_raw, now).map_err(|e| match e {
            QuoteError::NoLiquidity { .. } => QuoteError::no_liquidity(&from.symbol, &to.symbol),
            other => other,
        })?;
        let amount_out = scale_raw_amount(gross, buy_token.decimals)
            .map_err(|e| QuoteError::permanent(PROVIDER_ID, e.to_string()))?;

        debug!(
            "CoW Swap on {}: {} {} -> {} {} (quote id {:?})",
            self.network, amount, from.symbol, amount_out, to.symbol, response.id
        );

        Ok(Quote::new(
            from.clone(),
            to.clone(),
            amount,
            amount_out,
            PROVIDER_ID,
            now,
        ))
    }
}
