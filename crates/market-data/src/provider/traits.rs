//! Quote provider trait definition.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::errors::QuoteError;
use crate::models::{Asset, Quote};

/// Trait for quote providers.
///
/// Implement this trait to add a new price source. Price discovery orders
/// providers by [`priority`](Self::priority) and only calls those whose
/// [`supports`](Self::supports) returns true for the pair.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use aum_market_data::{Asset, Quote, QuoteError, QuoteProvider};
///
/// struct PegProvider;
///
/// #[async_trait]
/// impl QuoteProvider for PegProvider {
///     fn id(&self) -> &'static str {
///         "PEG"
///     }
///
///     fn supports(&self, from: &Asset, to: &Asset) -> bool {
///         from.symbol == "slUSDC" && to.symbol == "USDC"
///     }
///
///     // ... implement quote
/// }
/// ```
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Unique identifier, e.g. "COWSWAP". Used for logging and circuit
    /// breaker tracking.
    fn id(&self) -> &'static str;

    /// Lower values are tried first. Default is 10.
    fn priority(&self) -> u8 {
        10
    }

    /// Whether this provider can price `from` in units of `to`.
    fn supports(&self, from: &Asset, to: &Asset) -> bool;

    /// Convert a non-negative `amount` of `from` into `to`.
    ///
    /// Best-estimate semantics: the result must not be reduced by fees or
    /// slippage and the call must not reserve any liquidity.
    async fn quote(&self, from: &Asset, amount: Decimal, to: &Asset) -> Result<Quote, QuoteError>;
}
