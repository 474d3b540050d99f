//! AUM Market Data Crate
//!
//! Leaf crate shared by every network-facing component of the oracle.
//!
//! # Overview
//!
//! - Asset and network model used to describe on-chain holdings
//! - A single retry policy (bounded exponential backoff with jitter) applied
//!   at every network boundary
//! - Price discovery: converts an amount of one asset into another using
//!   best-estimate quotes from several providers
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |  PriceDiscovery  |  (freshness check, parity hop, circuit breaker)
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! |  QuoteProvider   | --> |   RetryPolicy    |
//! +------------------+     +------------------+
//!   |       |       |
//!   v       v       v
//! CoW   Gecko    Fixed
//! Swap  Terminal rates
//! ```
//!
//! # Core Types
//!
//! - [`Asset`] - A token (or native coin) on a [`Network`]
//! - [`Quote`] - Best-estimate conversion result
//! - [`RetryPolicy`] - Backoff policy shared by all network calls
//! - [`PriceDiscovery`] - Quote orchestration across providers

pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;
pub mod retry;

pub use errors::{QuoteError, RetryClass};
pub use models::{scale_raw_amount, AmountError, Asset, Network, Quote, UnknownNetwork};
pub use provider::cowswap::CowSwapQuoteProvider;
pub use provider::fixed_rate::{FixedRate, FixedRateProvider};
pub use provider::geckoterminal::{GeckoPool, GeckoTerminalPoolProvider};
pub use provider::QuoteProvider;
pub use registry::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, PriceDiscovery, PriceDiscoverySettings,
    PriceDiscoveryTrait,
};
pub use retry::{RetryError, RetryPolicy, Retryable};
