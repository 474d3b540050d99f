//! Chain reader trait.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use aum_market_data::Network;

use crate::errors::ChainError;

/// Block to read state at. Providers read the head once and pin every
/// subsequent call of a reading to it so legs are mutually consistent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockRef {
    Latest,
    Number(u64),
}

impl BlockRef {
    /// JSON-RPC block parameter.
    pub fn to_param(&self) -> String {
        match self {
            Self::Latest => "latest".to_string(),
            Self::Number(n) => format!("0x{:x}", n),
        }
    }
}

/// Narrow read interface over one chain. Implementations apply the retry
/// policy themselves; an error returned from here is final.
#[async_trait]
pub trait ChainReader: Send + Sync {
    fn network(&self) -> Network;

    async fn block_number(&self) -> Result<u64, ChainError>;

    async fn native_balance(&self, account: Address, block: BlockRef) -> Result<U256, ChainError>;

    async fn erc20_balance(
        &self,
        token: Address,
        account: Address,
        block: BlockRef,
    ) -> Result<U256, ChainError>;

    async fn erc20_total_supply(&self, token: Address, block: BlockRef) -> Result<U256, ChainError>;

    /// Reserve of coin `index` held by a stable-swap pool (`balances(i)`).
    async fn pool_coin_balance(
        &self,
        pool: Address,
        index: u64,
        block: BlockRef,
    ) -> Result<U256, ChainError>;

    /// Unclaimed fees of `token` owed to `account` by a fee distributor.
    async fn claimable_fee(
        &self,
        contract: Address,
        account: Address,
        token: Address,
        block: BlockRef,
    ) -> Result<U256, ChainError>;
}
