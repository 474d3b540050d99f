//! Quote provider abstractions and implementations.
//!
//! This module contains:
//! - The `QuoteProvider` trait that all providers implement
//! - Concrete providers (CoW Swap, GeckoTerminal, fixed parity rates)
//!
//! Providers are single-shot: they never retry and never look at quote
//! freshness bounds. Both concerns live in [`PriceDiscovery`](crate::PriceDiscovery).

mod http;
mod traits;

pub mod cowswap;
pub mod fixed_rate;
pub mod geckoterminal;

pub use traits::QuoteProvider;
