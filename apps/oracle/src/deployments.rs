//! Protocol deployments the oracle reads.
//!
//! Contract addresses are static; endpoints and retry settings arrive from
//! [`OracleSettings`].
//!
//! | Protocol  | Network   | Reads                                       |
//! |-----------|-----------|---------------------------------------------|
//! | aave      | base      | aBasEURC, aBasGHO supply, GHO variable debt |
//! | superlend | etherlink | slUSDC receipt token                        |
//! | curve     | etherlink | USDC/USDT stable pool LP share              |
//! | spot      | all three | native XTZ and plain token balances         |
//! | merkl     | etherlink | claimable WXTZ rewards                      |

use std::sync::Arc;

use alloy_primitives::{address, Address};
use aum_core::chain::{ChainReader, JsonRpcChainReader};
use aum_core::positions::{
    LendingConfig, LendingProvider, LendingReserve, LiquidityPoolConfig, LiquidityPoolProvider,
    MerklClient, PoolCoin, PositionProvider, RewardsConfig, RewardsProvider, RewardsSource,
    SpotConfig, SpotProvider,
};
use aum_market_data::{
    Asset, CowSwapQuoteProvider, FixedRate, FixedRateProvider, GeckoPool,
    GeckoTerminalPoolProvider, Network, PriceDiscoverySettings, QuoteProvider, RetryPolicy,
};

use crate::config::{Endpoints, OracleSettings};

// Ethereum
const ETHEREUM_USDC: Address = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
const ETHEREUM_USDT: Address = address!("dac17f958d2ee523a2206206994597c13d831ec7");

// Base
const BASE_USDC: Address = address!("833589fcd6edb6e08f4c7c32d4f71b54bda02913");
const BASE_EURC: Address = address!("60a3e35cc302bfa44cb288bc5a4f316fdb1adb42");
const BASE_GHO: Address = address!("6bb7a212910682dcfdbd5bcbb3e28fb4e8da10ee");
const AAVE_A_BAS_EURC: Address = address!("90da57e0a6c0d166bf15764e03b83745dc90025b");
const AAVE_A_BAS_GHO: Address = address!("067ae75628177fd257c2b1e500993e1a0babcbd1");
const AAVE_VARIABLE_DEBT_BAS_GHO: Address = address!("38e59ade183bbeb94583d44213c8f3297e9933e9");

// Etherlink
const ETHERLINK_WXTZ: Address = address!("c9b53ab2679f573e480d01e0f49e2b5cfb7a3eab");
const ETHERLINK_APPL_XTZ: Address = address!("cfd2f5faf6d92d963238e74321325a90ba67fca3");
const ETHERLINK_USDC: Address = address!("796ea11fa2dd751ed01b53c372ffdb4aaa8f00f9");
const ETHERLINK_USDT: Address = address!("2c03058c8afc06713be23e58d2febc8337dbfe6a");
const SUPERLEND_SL_USDC: Address = address!("d03bfdf9b26db1e6764724d914d7c3d18106a9fb");
const CURVE_USDC_USDT_POOL: Address = address!("2d84d79c852f6842abe0304b70bbaa1506add457");

/// GeckoTerminal USDC/WXTZ pool on Etherlink.
const GECKO_USDC_WXTZ_POOL: &str = "0x508060a01f11d6a2eb774b55aeba95931265e0cc";

fn usdc(network: Network) -> Asset {
    let address = match network {
        Network::Ethereum => ETHEREUM_USDC,
        Network::Base => BASE_USDC,
        Network::Etherlink => ETHERLINK_USDC,
    };
    Asset::token("USDC", network, address, 6)
}

fn usdt(network: Network) -> Asset {
    let address = match network {
        Network::Etherlink => ETHERLINK_USDT,
        _ => ETHEREUM_USDT,
    };
    Asset::token("USDT", network, address, 6)
}

fn wxtz() -> Asset {
    Asset::token("WXTZ", Network::Etherlink, ETHERLINK_WXTZ, 18)
}

fn eurc() -> Asset {
    Asset::token("EURC", Network::Base, BASE_EURC, 6)
}

fn gho() -> Asset {
    Asset::token("GHO", Network::Base, BASE_GHO, 18)
}

/// Every position is valued in USDC.
pub fn accounting_asset() -> Asset {
    usdc(Network::Base)
}

/// One JSON-RPC reader per network.
pub struct ChainReaders {
    pub ethereum: Arc<dyn ChainReader>,
    pub base: Arc<dyn ChainReader>,
    pub etherlink: Arc<dyn ChainReader>,
}

impl ChainReaders {
    pub fn new(endpoints: &Endpoints, retry: &RetryPolicy) -> Self {
        let reader = |url: &str, network: Network| -> Arc<dyn ChainReader> {
            Arc::new(JsonRpcChainReader::new(
                url,
                network,
                endpoints.request_timeout,
                retry.clone(),
            ))
        };
        Self {
            ethereum: reader(&endpoints.ethereum_rpc, Network::Ethereum),
            base: reader(&endpoints.base_rpc, Network::Base),
            etherlink: reader(&endpoints.etherlink_rpc, Network::Etherlink),
        }
    }
}

pub fn position_providers(settings: &OracleSettings) -> Vec<PositionProvider> {
    let readers = ChainReaders::new(&settings.endpoints, &settings.retry);
    let merkl: Arc<dyn RewardsSource> = Arc::new(MerklClient::new(
        &settings.endpoints.merkl,
        settings.endpoints.request_timeout,
        settings.retry.clone(),
    ));
    build_providers(&readers, merkl)
}

pub fn build_providers(readers: &ChainReaders, rewards: Arc<dyn RewardsSource>) -> Vec<PositionProvider> {
    let aave = LendingConfig {
        protocol: "aave".to_string(),
        network: Network::Base,
        reserves: vec![
            LendingReserve {
                underlying: eurc(),
                supply_token: Some(AAVE_A_BAS_EURC),
                debt_token: None,
            },
            LendingReserve {
                underlying: gho(),
                supply_token: Some(AAVE_A_BAS_GHO),
                debt_token: Some(AAVE_VARIABLE_DEBT_BAS_GHO),
            },
        ],
    };

    let superlend = LendingConfig {
        protocol: "superlend".to_string(),
        network: Network::Etherlink,
        reserves: vec![LendingReserve {
            underlying: usdc(Network::Etherlink),
            supply_token: Some(SUPERLEND_SL_USDC),
            debt_token: None,
        }],
    };

    let curve = LiquidityPoolConfig {
        protocol: "curve".to_string(),
        network: Network::Etherlink,
        pool: CURVE_USDC_USDT_POOL,
        coins: vec![
            PoolCoin {
                index: 0,
                asset: usdc(Network::Etherlink),
            },
            PoolCoin {
                index: 1,
                asset: usdt(Network::Etherlink),
            },
        ],
        fee_contract: None,
    };

    let spot_etherlink = SpotConfig {
        protocol: "spot".to_string(),
        network: Network::Etherlink,
        native: Some(Asset::native("XTZ", Network::Etherlink, 18)),
        tokens: vec![
            wxtz(),
            Asset::token("applXTZ", Network::Etherlink, ETHERLINK_APPL_XTZ, 18),
            usdc(Network::Etherlink),
            usdt(Network::Etherlink),
        ],
    };
    let spot_base = SpotConfig {
        protocol: "spot".to_string(),
        network: Network::Base,
        native: None,
        tokens: vec![usdc(Network::Base)],
    };
    let spot_ethereum = SpotConfig {
        protocol: "spot".to_string(),
        network: Network::Ethereum,
        native: None,
        tokens: vec![usdc(Network::Ethereum), usdt(Network::Ethereum)],
    };

    let merkl = RewardsConfig {
        protocol: "merkl".to_string(),
        network: Network::Etherlink,
        allowed_tokens: vec![wxtz()],
    };

    vec![
        LendingProvider::new(aave, readers.base.clone()).into(),
        LendingProvider::new(superlend, readers.etherlink.clone()).into(),
        LiquidityPoolProvider::new(curve, readers.etherlink.clone()).into(),
        SpotProvider::new(spot_etherlink, readers.etherlink.clone()).into(),
        SpotProvider::new(spot_base, readers.base.clone()).into(),
        SpotProvider::new(spot_ethereum, readers.ethereum.clone()).into(),
        RewardsProvider::new(merkl, rewards).into(),
    ]
}

/// Quote sources in the order price discovery should prefer them.
pub fn quote_providers(settings: &OracleSettings) -> Vec<Arc<dyn QuoteProvider>> {
    let endpoints = &settings.endpoints;
    let timeout = endpoints.request_timeout;

    // Tokens held on Etherlink are quoted on Ethereum at bridge parity.
    let cowswap_mainnet = CowSwapQuoteProvider::new(
        &format!("{}/mainnet", endpoints.cowswap),
        Network::Ethereum,
        vec![usdc(Network::Ethereum), usdt(Network::Ethereum)],
        timeout,
    )
    .with_quoter(settings.account);
    let cowswap_base = CowSwapQuoteProvider::new(
        &format!("{}/base", endpoints.cowswap),
        Network::Base,
        vec![usdc(Network::Base), eurc(), gho()],
        timeout,
    )
    .with_quoter(settings.account);

    let gecko = GeckoTerminalPoolProvider::new(
        &endpoints.geckoterminal,
        vec![GeckoPool {
            network_slug: "etherlink".to_string(),
            address: GECKO_USDC_WXTZ_POOL.to_string(),
            base_token: usdc(Network::Etherlink),
            quote_token: wxtz(),
        }],
        timeout,
    );

    let pegs = FixedRateProvider::new(vec![
        FixedRate::parity("applXTZ", "WXTZ"),
        FixedRate::parity("slUSDC", "USDC"),
        FixedRate::parity("XTZ", "WXTZ"),
    ]);

    vec![
        Arc::new(pegs),
        Arc::new(cowswap_mainnet),
        Arc::new(cowswap_base),
        Arc::new(gecko),
    ]
}

pub fn price_discovery_settings(retry: &RetryPolicy) -> PriceDiscoverySettings {
    PriceDiscoverySettings {
        retry: retry.clone(),
        intermediates: vec![wxtz()],
        ..PriceDiscoverySettings::default()
    }
}
