//! Block pinning and raw-to-decimal helpers shared by the on-chain providers.

use alloy_primitives::U256;
use aum_market_data::Asset;
use chrono::Utc;
use rust_decimal::Decimal;

use super::positions_model::AsOf;
use crate::chain::{BlockRef, ChainReader};
use crate::errors::ProviderError;

/// Read the head block once; every later call of the reading uses it.
pub(crate) async fn pin_head(
    reader: &dyn ChainReader,
    provider: &str,
) -> Result<(BlockRef, AsOf), ProviderError> {
    let block = reader
        .block_number()
        .await
        .map_err(|e| ProviderError::from_chain(provider, e))?;
    Ok((BlockRef::Number(block), AsOf::block(block, Utc::now())))
}

pub(crate) fn to_decimal(provider: &str, asset: &Asset, raw: U256) -> Result<Decimal, ProviderError> {
    asset
        .from_raw(raw)
        .map_err(|e| ProviderError::from_amount(provider, e))
}
