//! Scripted [`ChainReader`] for provider and aggregator tests.

use std::collections::HashMap;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use aum_market_data::Network;

use crate::chain::{BlockRef, ChainReader};
use crate::errors::ChainError;

pub(crate) struct ScriptedChain {
    network: Network,
    block: u64,
    native: HashMap<Address, U256>,
    balances: HashMap<(Address, Address), U256>,
    supplies: HashMap<Address, U256>,
    pool_balances: HashMap<(Address, u64), U256>,
    fees: HashMap<(Address, Address), U256>,
    failure: Option<ChainError>,
    delay: Option<Duration>,
    pinned: std::sync::Mutex<Vec<BlockRef>>,
}

impl ScriptedChain {
    pub(crate) fn new(network: Network) -> Self {
        Self {
            network,
            block: 1_000,
            native: HashMap::new(),
            balances: HashMap::new(),
            supplies: HashMap::new(),
            pool_balances: HashMap::new(),
            fees: HashMap::new(),
            failure: None,
            delay: None,
            pinned: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_native(mut self, account: Address, raw: U256) -> Self {
        self.native.insert(account, raw);
        self
    }

    pub(crate) fn with_balance(mut self, token: Address, account: Address, raw: U256) -> Self {
        self.balances.insert((token, account), raw);
        self
    }

    pub(crate) fn with_supply(mut self, token: Address, raw: U256) -> Self {
        self.supplies.insert(token, raw);
        self
    }

    pub(crate) fn with_pool_balance(mut self, pool: Address, index: u64, raw: U256) -> Self {
        self.pool_balances.insert((pool, index), raw);
        self
    }

    pub(crate) fn with_fee(mut self, contract: Address, token: Address, raw: U256) -> Self {
        self.fees.insert((contract, token), raw);
        self
    }

    pub(crate) fn failing(mut self, error: ChainError) -> Self {
        self.failure = Some(error);
        self
    }

    pub(crate) fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Block refs seen by state reads (excludes `block_number`).
    pub(crate) fn pinned_blocks(&self) -> Vec<BlockRef> {
        self.pinned.lock().unwrap().clone()
    }

    async fn step(&self) -> Result<(), ChainError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn state_read(&self, block: BlockRef) -> Result<(), ChainError> {
        self.pinned.lock().unwrap().push(block);
        self.step().await
    }
}

#[async_trait]
impl ChainReader for ScriptedChain {
    fn network(&self) -> Network {
        self.network
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        self.step().await?;
        Ok(self.block)
    }

    async fn native_balance(&self, account: Address, block: BlockRef) -> Result<U256, ChainError> {
        self.state_read(block).await?;
        Ok(self.native.get(&account).copied().unwrap_or_default())
    }

    async fn erc20_balance(
        &self,
        token: Address,
        account: Address,
        block: BlockRef,
    ) -> Result<U256, ChainError> {
        self.state_read(block).await?;
        Ok(self
            .balances
            .get(&(token, account))
            .copied()
            .unwrap_or_default())
    }

    async fn erc20_total_supply(&self, token: Address, block: BlockRef) -> Result<U256, ChainError> {
        self.state_read(block).await?;
        Ok(self.supplies.get(&token).copied().unwrap_or_default())
    }

    async fn pool_coin_balance(
        &self,
        pool: Address,
        index: u64,
        block: BlockRef,
    ) -> Result<U256, ChainError> {
        self.state_read(block).await?;
        Ok(self
            .pool_balances
            .get(&(pool, index))
            .copied()
            .unwrap_or_default())
    }

    async fn claimable_fee(
        &self,
        contract: Address,
        _account: Address,
        token: Address,
        block: BlockRef,
    ) -> Result<U256, ChainError> {
        self.state_read(block).await?;
        Ok(self.fees.get(&(contract, token)).copied().unwrap_or_default())
    }
}

/// `whole * 10^decimals` as a raw on-chain integer.
pub(crate) fn units(whole: u64, decimals: u8) -> U256 {
    U256::from(whole) * U256::from(10u64).pow(U256::from(decimals))
}
