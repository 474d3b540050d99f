//! CoW Protocol order book API models (`POST /api/v1/quote`).

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sell-side quote request. Amounts are decimal strings of raw token units.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub sell_token: Address,
    pub buy_token: Address,
    pub from: Address,
    pub receiver: Address,
    pub kind: &'static str,
    pub sell_amount_before_fee: String,
    pub price_quality: &'static str,
    pub signing_scheme: &'static str,
    pub onchain_order: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub quote: OrderQuote,
    pub expiration: DateTime<Utc>,
    #[serde(default)]
    pub id: Option<i64>,
}

/// The order parameters the API would sign. `sell_amount` is net of the fee.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuote {
    pub sell_amount: String,
    pub buy_amount: String,
    // Note: feeAmount, validTo and appData exist but the gross-up only needs the two amounts
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_type: String,
    #[serde(default)]
    pub description: String,
}
