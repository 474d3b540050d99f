//! HTTP JSON-RPC chain reader.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{hex, Address, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use aum_market_data::{Network, RetryPolicy};
use log::debug;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use super::abi::{IClaimableFees, IStableSwapPool, IERC20};
use super::chain_traits::{BlockRef, ChainReader};
use crate::errors::ChainError;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// [`ChainReader`] over an HTTP JSON-RPC endpoint. Every request goes
/// through the retry policy.
pub struct JsonRpcChainReader {
    client: Client,
    endpoint: String,
    /// Host only; endpoint paths often embed API keys.
    host: String,
    network: Network,
    retry: RetryPolicy,
    next_id: AtomicU64,
}

impl JsonRpcChainReader {
    pub fn new(endpoint: &str, network: Network, timeout: Duration, retry: RetryPolicy) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        let host = Url::parse(endpoint)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "<invalid endpoint>".to_string());

        Self {
            client,
            endpoint: endpoint.to_string(),
            host,
            network,
            retry,
            next_id: AtomicU64::new(1),
        }
    }

    async fn request_once(&self, method: &str, params: &Value) -> Result<Value, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let transient = e.is_timeout() || e.is_connect() || e.is_request();
                ChainError::Transport {
                    message: e.without_url().to_string(),
                    transient,
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChainError::Http {
                status: status.as_u16(),
            });
        }

        let parsed: RpcResponse = response.json().await.map_err(|e| {
            let transient = e.is_timeout();
            ChainError::Transport {
                message: format!("Invalid JSON-RPC body: {}", e.without_url()),
                transient,
            }
        })?;
        into_result(parsed)
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let label = format!("{} {} on {}", self.network, method, self.host);
        self.retry
            .run(&label, || self.request_once(method, &params))
            .await
            .map_err(|e| e.into_inner())
    }

    async fn call<C: SolCall + Send>(
        &self,
        to: Address,
        call: C,
        block: BlockRef,
    ) -> Result<C::Return, ChainError> {
        let data = hex::encode_prefixed(call.abi_encode());
        let result = self
            .request(
                "eth_call",
                json!([{ "to": to, "data": data }, block.to_param()]),
            )
            .await?;
        let bytes = parse_bytes(&result)?;
        C::abi_decode_returns(&bytes).map_err(|e| ChainError::Decode(e.to_string()))
    }
}

fn into_result(response: RpcResponse) -> Result<Value, ChainError> {
    match (response.result, response.error) {
        (_, Some(err)) => Err(ChainError::Rpc {
            code: err.code,
            message: err.message,
        }),
        (Some(result), None) => Ok(result),
        (None, None) => Err(ChainError::Decode(
            "response has neither result nor error".to_string(),
        )),
    }
}

fn parse_quantity(value: &Value) -> Result<U256, ChainError> {
    let text = value
        .as_str()
        .ok_or_else(|| ChainError::Decode(format!("expected hex string, got {}", value)))?;
    let digits = text.strip_prefix("0x").unwrap_or(text);
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16)
        .map_err(|e| ChainError::Decode(format!("invalid quantity '{}': {}", text, e)))
}

fn parse_bytes(value: &Value) -> Result<Vec<u8>, ChainError> {
    let text = value
        .as_str()
        .ok_or_else(|| ChainError::Decode(format!("expected hex data, got {}", value)))?;
    hex::decode(text).map_err(|e| ChainError::Decode(format!("invalid hex data: {}", e)))
}

#[async_trait]
impl ChainReader for JsonRpcChainReader {
    fn network(&self) -> Network {
        self.network
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        let result = self.request("eth_blockNumber", json!([])).await?;
        let number = parse_quantity(&result)?;
        let number = u64::try_from(number)
            .map_err(|_| ChainError::Decode(format!("block number {} out of range", number)))?;
        debug!("{} head block {}", self.network, number);
        Ok(number)
    }

    async fn native_balance(&self, account: Address, block: BlockRef) -> Result<U256, ChainError> {
        let result = self
            .request("eth_getBalance", json!([account, block.to_param()]))
            .await?;
        parse_quantity(&result)
    }

    async fn erc20_balance(
        &self,
        token: Address,
        account: Address,
        block: BlockRef,
    ) -> Result<U256, ChainError> {
        self.call(token, IERC20::balanceOfCall { account }, block)
            .await
    }

    async fn erc20_total_supply(&self, token: Address, block: BlockRef) -> Result<U256, ChainError> {
        self.call(token, IERC20::totalSupplyCall {}, block).await
    }

    async fn pool_coin_balance(
        &self,
        pool: Address,
        index: u64,
        block: BlockRef,
    ) -> Result<U256, ChainError> {
        self.call(
            pool,
            IStableSwapPool::balancesCall {
                i: U256::from(index),
            },
            block,
        )
        .await
    }

    async fn claimable_fee(
        &self,
        contract: Address,
        account: Address,
        token: Address,
        block: BlockRef,
    ) -> Result<U256, ChainError> {
        self.call(contract, IClaimableFees::claimableCall { account, token }, block)
            .await
    }
}
