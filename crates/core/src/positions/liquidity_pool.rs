//! Stable-swap pools whose contract is also the LP token (Curve-style).
//!
//! LP shares are valued by proportional withdrawal:
//!
//! ```text
//! share_fraction = shares_held / total_shares
//! underlying_i   = reserve_i * share_fraction
//! ```
//!
//! Computed on raw integers as `reserve_i * shares_held / total_shares`,
//! so the only loss is the final integer division.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use aum_market_data::{Asset, Network};
use futures::future::try_join_all;
use log::debug;

use super::chain_reads::{pin_head, to_decimal};
use super::positions_model::{Position, PositionCategory, PositionKey, ProviderReading};
use crate::chain::{BlockRef, ChainReader};
use crate::errors::ProviderError;

/// Pool coin at index `index` of the pool's `balances` array.
#[derive(Clone, Debug, PartialEq)]
pub struct PoolCoin {
    pub index: u64,
    pub asset: Asset,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LiquidityPoolConfig {
    pub protocol: String,
    pub network: Network,
    pub pool: Address,
    pub coins: Vec<PoolCoin>,
    /// Distributor exposing per-token claimable trading fees, if the pool has one.
    pub fee_contract: Option<Address>,
}

pub struct LiquidityPoolProvider {
    config: LiquidityPoolConfig,
    reader: Arc<dyn ChainReader>,
}

/// Share of each reserve owned by `shares_held` out of `total_shares`.
///
/// Returns an empty vector when nothing is held.
pub fn proportional_withdrawal(
    shares_held: U256,
    total_shares: U256,
    reserves: &[U256],
) -> Result<Vec<U256>, String> {
    if shares_held.is_zero() {
        return Ok(Vec::new());
    }
    if total_shares.is_zero() {
        return Err(format!("holds {} shares of a pool with zero supply", shares_held));
    }
    if shares_held > total_shares {
        return Err(format!(
            "holds {} shares but total supply is {}",
            shares_held, total_shares
        ));
    }
    reserves
        .iter()
        .map(|reserve| {
            reserve
                .checked_mul(shares_held)
                .map(|scaled| scaled / total_shares)
                .ok_or_else(|| format!("reserve {} overflows share scaling", reserve))
        })
        .collect()
}

impl LiquidityPoolProvider {
    pub fn new(config: LiquidityPoolConfig, reader: Arc<dyn ChainReader>) -> Self {
        Self { config, reader }
    }

    pub fn key(&self) -> PositionKey {
        PositionKey::new(&self.config.protocol, self.config.network)
    }

    pub async fn read_position(
        &self,
        network: Network,
        account: Address,
    ) -> Result<ProviderReading, ProviderError> {
        let protocol = self.config.protocol.as_str();
        if network != self.config.network || self.reader.network() != network {
            return Err(ProviderError::unsupported(protocol, format!("network {}", network)));
        }

        let (block, as_of) = pin_head(self.reader.as_ref(), protocol).await?;
        let chain_err = |e| ProviderError::from_chain(protocol, e);
        let pool = self.config.pool;

        let (shares_held, total_shares, reserves) = futures::try_join!(
            async { self.reader.erc20_balance(pool, account, block).await.map_err(chain_err) },
            async { self.reader.erc20_total_supply(pool, block).await.map_err(chain_err) },
            try_join_all(self.config.coins.iter().map(|coin| async move {
                self.reader
                    .pool_coin_balance(pool, coin.index, block)
                    .await
                    .map_err(chain_err)
            })),
        )?;

        debug!(
            "{} pool {}: {} of {} shares",
            protocol, pool, shares_held, total_shares
        );

        let underlying = proportional_withdrawal(shares_held, total_shares, &reserves)
            .map_err(|message| ProviderError::invalid_response(protocol, message))?;

        let mut positions = Vec::new();
        for (coin, raw) in self.config.coins.iter().zip(underlying) {
            let amount = to_decimal(protocol, &coin.asset, raw)?;
            if !amount.is_zero() {
                positions.push(Position::token(
                    protocol,
                    coin.asset.clone(),
                    amount,
                    PositionCategory::Principal,
                    as_of.clone(),
                ));
            }
        }

        if let Some(contract) = self.config.fee_contract {
            for (coin, raw) in self.read_fees(contract, account, block).await? {
                let amount = to_decimal(protocol, &coin.asset, raw)?;
                if !amount.is_zero() {
                    positions.push(Position::token(
                        protocol,
                        coin.asset.clone(),
                        amount,
                        PositionCategory::UnclaimedFees,
                        as_of.clone(),
                    ));
                }
            }
        }

        Ok(ProviderReading { as_of, positions })
    }

    async fn read_fees(
        &self,
        contract: Address,
        account: Address,
        block: BlockRef,
    ) -> Result<Vec<(&PoolCoin, U256)>, ProviderError> {
        let reads = self
            .config
            .coins
            .iter()
            .filter_map(|coin| coin.asset.address.map(|token| (coin, token)))
            .map(|(coin, token)| async move {
                let raw = self
                    .reader
                    .claimable_fee(contract, account, token, block)
                    .await
                    .map_err(|e| ProviderError::from_chain(&self.config.protocol, e))?;
                Ok::<_, ProviderError>((coin, raw))
            });
        try_join_all(reads).await
    }
}
