//! GeckoTerminal pool API models (`GET /api/v2/networks/{network}/pools/{address}`).

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PoolResponse {
    pub data: PoolData,
}

#[derive(Debug, Deserialize)]
pub struct PoolData {
    pub attributes: PoolAttributes,
}

/// Prices come back as decimal strings.
#[derive(Debug, Deserialize)]
pub struct PoolAttributes {
    #[serde(default)]
    pub name: Option<String>,
    /// Price of one base token in quote tokens
    #[serde(default)]
    pub base_token_price_quote_token: Option<String>,
    /// Price of one quote token in base tokens
    #[serde(default)]
    pub quote_token_price_base_token: Option<String>,
    // Note: reserve_in_usd, volume_usd and price_change_percentage exist but are not used
}
