//! Quote orchestration.
//!
//! This module provides:
//! - Provider ordering by priority with fallback on failure
//! - Retry with backoff per provider
//! - Circuit breaking for providers that keep failing
//! - Quote freshness checks and one-hop conversions through a peg

mod circuit_breaker;
mod price_discovery;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use price_discovery::{PriceDiscovery, PriceDiscoverySettings, PriceDiscoveryTrait};
