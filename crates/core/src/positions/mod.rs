//! Position providers: read one protocol's on-chain (or rewards API) state
//! for an account and return typed positions.

mod chain_reads;
mod lending;
mod liquidity_pool;
mod merkl_client;
mod positions_model;
mod provider;
mod rewards;
mod spot;

#[cfg(test)]
pub(crate) mod test_support;

pub use lending::{LendingConfig, LendingProvider, LendingReserve};
pub use liquidity_pool::{proportional_withdrawal, LiquidityPoolConfig, LiquidityPoolProvider, PoolCoin};
pub use merkl_client::{MerklClient, DEFAULT_BASE_URL as MERKL_DEFAULT_BASE_URL};
pub use positions_model::{AsOf, Position, PositionCategory, PositionKey, PositionUnit, ProviderReading};
pub use provider::PositionProvider;
pub use rewards::{ClaimableReward, RewardsConfig, RewardsProvider, RewardsSource};
pub use spot::{SpotConfig, SpotProvider};
