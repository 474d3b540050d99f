//! Merkl rewards API client.

use std::time::Duration;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use aum_market_data::{Network, RetryPolicy, Retryable};
use log::debug;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use super::rewards::{ClaimableReward, RewardsSource};
use crate::errors::ProviderError;

pub const DEFAULT_BASE_URL: &str = "https://api.merkl.xyz";
const PROVIDER_ID: &str = "merkl";

#[derive(Debug, Deserialize)]
struct ChainRewards {
    #[serde(default)]
    rewards: Vec<MerklReward>,
}

#[derive(Debug, Deserialize)]
struct MerklReward {
    token: MerklToken,
    #[serde(default)]
    amount: Option<String>,
    #[serde(default)]
    claimed: Option<String>,
    #[serde(default)]
    breakdowns: Vec<MerklBreakdown>,
}

#[derive(Debug, Deserialize)]
struct MerklToken {
    address: Address,
    symbol: String,
}

/// Per-campaign slice of a reward.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MerklBreakdown {
    #[serde(default)]
    campaign_id: Option<String>,
    #[serde(default)]
    amount: Option<String>,
    #[serde(default)]
    claimed: Option<String>,
}

#[derive(Debug, Error)]
enum FetchError {
    #[error("request failed: {message}")]
    Transport { message: String, transient: bool },

    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("invalid response: {0}")]
    Decode(String),
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { transient, .. } => *transient,
            Self::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            Self::Decode(_) => false,
        }
    }
}

/// Reads claimable rewards per user and chain.
pub struct MerklClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl MerklClient {
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        }
    }

    async fn fetch_once(&self, account: Address, chain_id: u64) -> Result<Vec<ChainRewards>, FetchError> {
        let url = format!("{}/v4/users/{}/rewards", self.base_url, account);
        let response = self
            .client
            .get(&url)
            .query(&[("chainId", chain_id)])
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                transient: e.is_timeout() || e.is_connect(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status,
                body: body.chars().take(200).collect(),
            });
        }

        response
            .json::<Vec<ChainRewards>>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// 404 means Merkl has no record for the user on that chain; any other
/// client error is a request the API will never answer.
fn to_provider_error(error: FetchError) -> ProviderError {
    match error {
        FetchError::Status { status, .. } if status == StatusCode::NOT_FOUND => {
            ProviderError::unsupported(PROVIDER_ID, error.to_string())
        }
        FetchError::Status { status, .. } if status.is_client_error() && !error.is_retryable() => {
            ProviderError::invalid_response(PROVIDER_ID, error.to_string())
        }
        FetchError::Decode(message) => ProviderError::invalid_response(PROVIDER_ID, message),
        other => ProviderError::unreachable(PROVIDER_ID, other.to_string()),
    }
}

/// Claimable raw amount of one reward: unclaimed remainder of each
/// campaign, or of the reward itself when no breakdown is given.
fn claimable(reward: &MerklReward) -> Result<U256, String> {
    if reward.breakdowns.is_empty() {
        return unclaimed(reward.amount.as_deref(), reward.claimed.as_deref());
    }
    reward.breakdowns.iter().try_fold(U256::ZERO, |total, breakdown| {
        let remaining = unclaimed(breakdown.amount.as_deref(), breakdown.claimed.as_deref())?;
        if !remaining.is_zero() {
            debug!(
                "campaign {} claimable {}",
                breakdown.campaign_id.as_deref().unwrap_or("?"),
                remaining
            );
        }
        Ok(total.saturating_add(remaining))
    })
}

fn unclaimed(amount: Option<&str>, claimed: Option<&str>) -> Result<U256, String> {
    Ok(parse_wei(amount)?.saturating_sub(parse_wei(claimed)?))
}

fn parse_wei(value: Option<&str>) -> Result<U256, String> {
    match value {
        None | Some("") => Ok(U256::ZERO),
        Some(text) => text
            .parse::<U256>()
            .map_err(|e| format!("invalid amount '{}': {}", text, e)),
    }
}

#[async_trait]
impl RewardsSource for MerklClient {
    async fn claimable_rewards(
        &self,
        account: Address,
        network: Network,
    ) -> Result<Vec<ClaimableReward>, ProviderError> {
        let chain_id = network.chain_id();
        let label = format!("merkl rewards chain {}", chain_id);
        let chains = self
            .retry
            .run(&label, || self.fetch_once(account, chain_id))
            .await
            .map_err(|e| to_provider_error(e.into_inner()))?;

        chains
            .iter()
            .flat_map(|chain| chain.rewards.iter())
            .map(|reward| {
                let claimable_raw = claimable(reward)
                    .map_err(|message| ProviderError::invalid_response(PROVIDER_ID, message))?;
                Ok(ClaimableReward {
                    token: reward.token.address,
                    symbol: reward.token.symbol.clone(),
                    claimable_raw,
                })
            })
            .collect()
    }
}
