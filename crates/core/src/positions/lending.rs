//! Lending market positions (Aave-style supply/debt tokens, Superlend-style
//! receipt tokens).

use std::collections::BTreeMap;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use aum_market_data::{Asset, Network};
use futures::future::try_join_all;
use log::debug;
use rust_decimal::Decimal;

use super::chain_reads::{pin_head, to_decimal};
use super::positions_model::{Position, PositionCategory, PositionKey, ProviderReading};
use crate::chain::{BlockRef, ChainReader};
use crate::errors::ProviderError;

/// One reserve of a lending market. Supply and debt tokens are
/// denominated in the underlying asset.
#[derive(Clone, Debug, PartialEq)]
pub struct LendingReserve {
    pub underlying: Asset,
    pub supply_token: Option<Address>,
    pub debt_token: Option<Address>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LendingConfig {
    pub protocol: String,
    pub network: Network,
    pub reserves: Vec<LendingReserve>,
}

/// Reads supplied and borrowed amounts and nets them per underlying asset.
pub struct LendingProvider {
    config: LendingConfig,
    reader: Arc<dyn ChainReader>,
}

/// Running totals for one underlying asset.
struct NetLeg {
    asset: Asset,
    supplied: Decimal,
    borrowed: Decimal,
}

impl LendingProvider {
    pub fn new(config: LendingConfig, reader: Arc<dyn ChainReader>) -> Self {
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
            return Err(ProviderError::unsupported(
                protocol,
                format!("network {}", network),
            ));
        }

        let (block, as_of) = pin_head(self.reader.as_ref(), protocol).await?;

        let reads = self
            .config
            .reserves
            .iter()
            .map(|reserve| self.read_reserve(reserve, account, block));
        let amounts = try_join_all(reads).await?;

        // Several reserves may share an underlying; net them together.
        let mut legs: BTreeMap<String, NetLeg> = BTreeMap::new();
        for (reserve, (supplied, borrowed)) in self.config.reserves.iter().zip(amounts) {
            let leg = legs
                .entry(reserve.underlying.symbol.to_uppercase())
                .or_insert_with(|| NetLeg {
                    asset: reserve.underlying.clone(),
                    supplied: Decimal::ZERO,
                    borrowed: Decimal::ZERO,
                });
            leg.supplied += supplied;
            leg.borrowed += borrowed;
        }

        let positions = legs
            .into_values()
            .filter(|leg| !leg.supplied.is_zero() || !leg.borrowed.is_zero())
            .map(|leg| {
                debug!(
                    "{} {}: supplied {} borrowed {}",
                    protocol, leg.asset, leg.supplied, leg.borrowed
                );
                Position::token(
                    protocol,
                    leg.asset,
                    leg.supplied - leg.borrowed,
                    PositionCategory::Principal,
                    as_of.clone(),
                )
            })
            .collect();

        Ok(ProviderReading { as_of, positions })
    }

    async fn read_reserve(
        &self,
        reserve: &LendingReserve,
        account: Address,
        block: BlockRef,
    ) -> Result<(Decimal, Decimal), ProviderError> {
        let (supplied, borrowed) = futures::try_join!(
            self.token_balance(reserve.supply_token, account, block),
            self.token_balance(reserve.debt_token, account, block),
        )?;
        let protocol = self.config.protocol.as_str();
        Ok((
            to_decimal(protocol, &reserve.underlying, supplied)?,
            to_decimal(protocol, &reserve.underlying, borrowed)?,
        ))
    }

    async fn token_balance(
        &self,
        token: Option<Address>,
        account: Address,
        block: BlockRef,
    ) -> Result<U256, ProviderError> {
        let Some(token) = token else {
            return Ok(U256::ZERO);
        };
        self.reader
            .erc20_balance(token, account, block)
            .await
            .map_err(|e| ProviderError::from_chain(&self.config.protocol, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::positions::test_support::{units, ScriptedChain};
    use alloy_primitives::address;
    use rust_decimal_macros::dec;

    const ACCOUNT: Address = address!("00000000000000000000000000000000000000aa");
    const USDC: Address = address!("833589fcd6edb6e08f4c7c32d4f71b54bda02913");
    const A_USDC: Address = address!("4e65fe4dba92790696d040ac24aa414708f5c0ab");
    const DEBT_USDC: Address = address!("59dca05b6c26dbd64b5381374aaac5cd05644c28");
    const SL_USDC: Address = address!("d03bfdf9b26db1e6764724d914d7c3d18106a9fb");

    fn usdc() -> Asset {
        Asset::token("USDC", Network::Base, USDC, 6)
    }

    fn config(reserves: Vec<LendingReserve>) -> LendingConfig {
        LendingConfig {
            protocol: "aave".to_string(),
            network: Network::Base,
            reserves,
        }
    }

    #[tokio::test]
    async fn test_nets_supply_and_debt_in_same_market() {
        let chain = ScriptedChain::new(Network::Base)
            .with_balance(A_USDC, ACCOUNT, units(1000, 6))
            .with_balance(DEBT_USDC, ACCOUNT, units(200, 6));
        let provider = LendingProvider::new(
            config(vec![LendingReserve {
                underlying: usdc(),
                supply_token: Some(A_USDC),
                debt_token: Some(DEBT_USDC),
            }]),
            Arc::new(chain),
        );

        let reading = provider.read_position(Network::Base, ACCOUNT).await.unwrap();
        assert_eq!(reading.as_of.block, Some(1_000));
        assert_eq!(reading.positions.len(), 1);
        assert_eq!(reading.positions[0].amount, dec!(800));
        assert_eq!(reading.positions[0].category, PositionCategory::Principal);
    }

    #[tokio::test]
    async fn test_reserves_sharing_an_underlying_are_counted_once() {
        let chain = ScriptedChain::new(Network::Base)
            .with_balance(A_USDC, ACCOUNT, units(100, 6))
            .with_balance(SL_USDC, ACCOUNT, units(50, 6))
            .with_balance(DEBT_USDC, ACCOUNT, units(30, 6));
        let provider = LendingProvider::new(
            config(vec![
                LendingReserve {
                    underlying: usdc(),
                    supply_token: Some(A_USDC),
                    debt_token: None,
                },
                LendingReserve {
                    underlying: usdc(),
                    supply_token: Some(SL_USDC),
                    debt_token: Some(DEBT_USDC),
                },
            ]),
            Arc::new(chain),
        );

        let reading = provider.read_position(Network::Base, ACCOUNT).await.unwrap();
        assert_eq!(reading.positions.len(), 1);
        assert_eq!(reading.positions[0].amount, dec!(120));
    }

    #[tokio::test]
    async fn test_net_debt_is_negative_and_reads_are_pinned() {
        let chain = Arc::new(
            ScriptedChain::new(Network::Base).with_balance(DEBT_USDC, ACCOUNT, units(75, 6)),
        );
        let provider = LendingProvider::new(
            config(vec![LendingReserve {
                underlying: usdc(),
                supply_token: Some(A_USDC),
                debt_token: Some(DEBT_USDC),
            }]),
            chain.clone(),
        );

        let reading = provider.read_position(Network::Base, ACCOUNT).await.unwrap();
        assert_eq!(reading.positions[0].amount, dec!(-75));
        assert!(reading.positions[0].is_liability());
        assert!(chain
            .pinned_blocks()
            .iter()
            .all(|b| *b == BlockRef::Number(1_000)));
    }

    #[tokio::test]
    async fn test_empty_market_yields_no_legs() {
        let provider = LendingProvider::new(
            config(vec![LendingReserve {
                underlying: usdc(),
                supply_token: Some(A_USDC),
                debt_token: Some(DEBT_USDC),
            }]),
            Arc::new(ScriptedChain::new(Network::Base)),
        );
        let reading = provider.read_position(Network::Base, ACCOUNT).await.unwrap();
        assert!(reading.positions.is_empty());
    }

    #[tokio::test]
    async fn test_other_network_is_unsupported() {
        let provider = LendingProvider::new(config(vec![]), Arc::new(ScriptedChain::new(Network::Base)));
        let err = provider
            .read_position(Network::Etherlink, ACCOUNT)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "unsupported");
    }

    #[tokio::test]
    async fn test_unreachable_rpc() {
        let chain = ScriptedChain::new(Network::Base).failing(crate::errors::ChainError::Http { status: 503 });
        let provider = LendingProvider::new(config(vec![]), Arc::new(chain));
        let err = provider.read_position(Network::Base, ACCOUNT).await.unwrap_err();
        assert_eq!(err.kind(), "unreachable");
    }
}
