//! Wallet balances: the native coin and plain ERC-20 holdings.

use std::sync::Arc;

use alloy_primitives::Address;
use aum_market_data::{Asset, Network};
use futures::future::try_join_all;

use super::chain_reads::{pin_head, to_decimal};
use super::positions_model::{Position, PositionCategory, PositionKey, ProviderReading};
use crate::chain::{BlockRef, ChainReader};
use crate::errors::ProviderError;

#[derive(Clone, Debug, PartialEq)]
pub struct SpotConfig {
    pub protocol: String,
    pub network: Network,
    /// Native coin to read, if any.
    pub native: Option<Asset>,
    pub tokens: Vec<Asset>,
}

pub struct SpotProvider {
    config: SpotConfig,
    reader: Arc<dyn ChainReader>,
}

impl SpotProvider {
    pub fn new(config: SpotConfig, reader: Arc<dyn ChainReader>) -> Self {
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
        if let Some(token) = self.config.tokens.iter().find(|t| t.is_native()) {
            return Err(ProviderError::unsupported(
                protocol,
                format!("token {} without a contract address", token),
            ));
        }

        let (block, as_of) = pin_head(self.reader.as_ref(), protocol).await?;

        let mut legs = Vec::with_capacity(self.config.tokens.len() + 1);
        if let Some(native) = &self.config.native {
            let raw = self
                .reader
                .native_balance(account, block)
                .await
                .map_err(|e| ProviderError::from_chain(protocol, e))?;
            legs.push((native.clone(), to_decimal(protocol, native, raw)?));
        }

        let token_reads = self
            .config
            .tokens
            .iter()
            .map(|token| self.read_token(token, account, block));
        legs.extend(try_join_all(token_reads).await?);

        let positions = legs
            .into_iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(asset, amount)| {
                Position::token(protocol, asset, amount, PositionCategory::Principal, as_of.clone())
            })
            .collect();

        Ok(ProviderReading { as_of, positions })
    }

    async fn read_token(
        &self,
        token: &Asset,
        account: Address,
        block: BlockRef,
    ) -> Result<(Asset, rust_decimal::Decimal), ProviderError> {
        let protocol = self.config.protocol.as_str();
        let address = token
            .address
            .ok_or_else(|| ProviderError::unsupported(protocol, format!("native token {}", token)))?;
        let raw = self
            .reader
            .erc20_balance(address, account, block)
            .await
            .map_err(|e| ProviderError::from_chain(protocol, e))?;
        Ok((token.clone(), to_decimal(protocol, token, raw)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::positions::test_support::{units, ScriptedChain};
    use alloy_primitives::address;
    use rust_decimal_macros::dec;

    const ACCOUNT: Address = address!("00000000000000000000000000000000000000aa");
    const WXTZ: Address = address!("c9b53ab2679f573e480d01e0f49e2b5cfb7a3eab");
    const USDC: Address = address!("796ea11fa2dd751ed01b53c372ffdb4aaa8f00f9");

    fn config() -> SpotConfig {
        SpotConfig {
            protocol: "wallet".to_string(),
            network: Network::Etherlink,
            native: Some(Asset::native("XTZ", Network::Etherlink, 18)),
            tokens: vec![
                Asset::token("WXTZ", Network::Etherlink, WXTZ, 18),
                Asset::token("USDC", Network::Etherlink, USDC, 6),
            ],
        }
    }

    #[tokio::test]
    async fn test_reads_native_and_tokens_omitting_zero() {
        let chain = ScriptedChain::new(Network::Etherlink)
            .with_native(ACCOUNT, units(50, 18))
            .with_balance(USDC, ACCOUNT, units(12, 6));
        let provider = SpotProvider::new(config(), Arc::new(chain));

        let reading = provider
            .read_position(Network::Etherlink, ACCOUNT)
            .await
            .unwrap();
        let legs: Vec<(&str, rust_decimal::Decimal)> = reading
            .positions
            .iter()
            .map(|p| (p.asset.symbol.as_str(), p.amount))
            .collect();
        assert_eq!(legs, vec![("XTZ", dec!(50)), ("USDC", dec!(12))]);
    }

    #[tokio::test]
    async fn test_token_without_address_is_unsupported() {
        let mut config = config();
        config.tokens.push(Asset::native("XTZ", Network::Etherlink, 18));
        let provider = SpotProvider::new(config, Arc::new(ScriptedChain::new(Network::Etherlink)));
        let err = provider
            .read_position(Network::Etherlink, ACCOUNT)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "unsupported");
    }
}
