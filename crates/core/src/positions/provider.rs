use alloy_primitives::Address;
use aum_market_data::Network;

use super::lending::LendingProvider;
use super::liquidity_pool::LiquidityPoolProvider;
use super::positions_model::{PositionKey, ProviderReading};
use super::rewards::RewardsProvider;
use super::spot::SpotProvider;
use crate::errors::ProviderError;

/// Every supported position source. Each variant carries its own
/// configuration and read client.
pub enum PositionProvider {
    Lending(LendingProvider),
    Spot(SpotProvider),
    LiquidityPool(LiquidityPoolProvider),
    Rewards(RewardsProvider),
}

impl PositionProvider {
    pub fn key(&self) -> PositionKey {
        match self {
            Self::Lending(p) => p.key(),
            Self::Spot(p) => p.key(),
            Self::LiquidityPool(p) => p.key(),
            Self::Rewards(p) => p.key(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Lending(_) => "lending",
            Self::Spot(_) => "spot",
            Self::LiquidityPool(_) => "liquidity_pool",
            Self::Rewards(_) => "rewards",
        }
    }

    /// Read the account's position. Read-only; retries happen inside the
    /// variant's client.
    pub async fn read_position(
        &self,
        network: Network,
        account: Address,
    ) -> Result<ProviderReading, ProviderError> {
        match self {
            Self::Lending(p) => p.read_position(network, account).await,
            Self::Spot(p) => p.read_position(network, account).await,
            Self::LiquidityPool(p) => p.read_position(network, account).await,
            Self::Rewards(p) => p.read_position(network, account).await,
        }
    }
}

impl From<LendingProvider> for PositionProvider {
    fn from(provider: LendingProvider) -> Self {
        Self::Lending(provider)
    }
}

impl From<SpotProvider> for PositionProvider {
    fn from(provider: SpotProvider) -> Self {
        Self::Spot(provider)
    }
}

impl From<LiquidityPoolProvider> for PositionProvider {
    fn from(provider: LiquidityPoolProvider) -> Self {
        Self::LiquidityPool(provider)
    }
}

impl From<RewardsProvider> for PositionProvider {
    fn from(provider: RewardsProvider) -> Self {
        Self::Rewards(provider)
    }
}
