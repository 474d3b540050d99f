//! Claimable incentive rewards, reported apart from principal.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use aum_market_data::{Asset, Network};
use chrono::Utc;
use log::debug;

use super::chain_reads::to_decimal;
use super::positions_model::{AsOf, Position, PositionCategory, PositionKey, ProviderReading};
use crate::errors::ProviderError;

/// Claimable-but-unclaimed amount of one reward token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimableReward {
    pub token: Address,
    pub symbol: String,
    pub claimable_raw: U256,
}

/// Off-chain source of reward balances.
#[async_trait]
pub trait RewardsSource: Send + Sync {
    async fn claimable_rewards(
        &self,
        account: Address,
        network: Network,
    ) -> Result<Vec<ClaimableReward>, ProviderError>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct RewardsConfig {
    pub protocol: String,
    pub network: Network,
    /// Reward tokens that are counted. Anything else the source reports is skipped.
    pub allowed_tokens: Vec<Asset>,
}

pub struct RewardsProvider {
    config: RewardsConfig,
    source: Arc<dyn RewardsSource>,
}

impl RewardsProvider {
    pub fn new(config: RewardsConfig, source: Arc<dyn RewardsSource>) -> Self {
        Self { config, source }
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
        if network != self.config.network {
            return Err(ProviderError::unsupported(protocol, format!("network {}", network)));
        }

        let rewards = self.source.claimable_rewards(account, network).await?;
        let as_of = AsOf::off_chain(Utc::now());

        let mut positions = Vec::new();
        for reward in rewards {
            let Some(asset) = self
                .config
                .allowed_tokens
                .iter()
                .find(|asset| asset.address == Some(reward.token))
            else {
                debug!(
                    "{}: skipping reward token {} ({}) outside the allow-list",
                    protocol, reward.symbol, reward.token
                );
                continue;
            };
            let amount = to_decimal(protocol, asset, reward.claimable_raw)?;
            if amount.is_zero() {
                continue;
            }
            positions.push(Position::token(
                protocol,
                asset.clone(),
                amount,
                PositionCategory::Rewards,
                as_of.clone(),
            ));
        }

        Ok(ProviderReading { as_of, positions })
    }
}
