//! Error types and retry classification for price discovery.
//!
//! This module provides:
//! - [`QuoteError`]: The error enum returned by every quote provider
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

use crate::models::AmountError;
use crate::retry::Retryable;

/// Errors that can occur while converting an amount between two assets.
///
/// Each variant is classified into a [`RetryClass`] via the
/// [`retry_class`](Self::retry_class) method, which determines how the
/// price discovery service reacts to the error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuoteError {
    /// No viable conversion path between the two assets.
    #[error("No liquidity: {from_asset} -> {to_asset}")]
    NoLiquidity {
        /// Symbol of the asset being valued
        from_asset: String,
        /// Symbol of the target asset
        to_asset: String,
    },

    /// The quote source returned data older than the freshness bound.
    #[error("Stale quote from {provider}: {age_secs}s old (max {max_age_secs}s)")]
    StaleQuote {
        /// The provider that returned the stale quote
        provider: String,
        /// Age of the quote in seconds
        age_secs: i64,
        /// Accepted freshness bound in seconds
        max_age_secs: i64,
    },

    /// The underlying request failed.
    ///
    /// `transient` marks failures worth retrying (timeouts, 5xx, 429,
    /// connection resets).
    #[error("Quote request failed: {provider} - {message}")]
    RequestFailed {
        /// The provider that failed
        provider: String,
        /// Error detail
        message: String,
        /// Whether retrying the same request may succeed
        transient: bool,
    },

    /// The amount itself cannot be expressed for the asset. Every provider
    /// would fail the same way.
    #[error("Invalid amount for {asset}: {source}")]
    InvalidAmount {
        /// Symbol of the asset the amount is denominated in
        asset: String,
        /// Conversion failure
        source: AmountError,
    },
}

impl QuoteError {
    pub fn no_liquidity(from_asset: &str, to_asset: &str) -> Self {
        Self::NoLiquidity {
            from_asset: from_asset.to_string(),
            to_asset: to_asset.to_string(),
        }
    }

    pub fn transient(provider: &str, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            provider: provider.to_string(),
            message: message.into(),
            transient: true,
        }
    }

    pub fn invalid_amount(asset: &str, source: AmountError) -> Self {
        Self::InvalidAmount {
            asset: asset.to_string(),
            source,
        }
    }

    pub fn permanent(provider: &str, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            provider: provider.to_string(),
            message: message.into(),
            transient: false,
        }
    }

    /// Returns the retry classification for this error.
    ///
    /// - [`RetryClass::WithBackoff`]: transient request failure, retry the same provider
    /// - [`RetryClass::NextProvider`]: this provider cannot serve the pair, try another
    /// - [`RetryClass::Never`]: the amount is unrepresentable, stop
    ///
    /// # Examples
    ///
    /// ```
    /// use aum_market_data::errors::{QuoteError, RetryClass};
    ///
    /// let error = QuoteError::transient("COWSWAP", "HTTP 503");
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = QuoteError::no_liquidity("GHO", "USDC");
    /// assert_eq!(error.retry_class(), RetryClass::NextProvider);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::RequestFailed {
                transient: true, ..
            } => RetryClass::WithBackoff,
            Self::RequestFailed {
                transient: false, ..
            }
            | Self::NoLiquidity { .. }
            | Self::StaleQuote { .. } => RetryClass::NextProvider,
            Self::InvalidAmount { .. } => RetryClass::Never,
        }
    }

    /// Short machine-readable name, used in failure markers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoLiquidity { .. } => "no_liquidity",
            Self::StaleQuote { .. } => "stale_quote",
            Self::RequestFailed { .. } => "request_failed",
            Self::InvalidAmount { .. } => "invalid_amount",
        }
    }
}

impl Retryable for QuoteError {
    fn is_retryable(&self) -> bool {
        self.retry_class() == RetryClass::WithBackoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_liquidity_moves_to_next_provider() {
        let error = QuoteError::no_liquidity("GHO", "USDC");
        assert_eq!(error.retry_class(), RetryClass::NextProvider);
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_stale_quote_moves_to_next_provider() {
        let error = QuoteError::StaleQuote {
            provider: "COWSWAP".to_string(),
            age_secs: 900,
            max_age_secs: 300,
        };
        assert_eq!(error.retry_class(), RetryClass::NextProvider);
    }

    #[test]
    fn test_transient_failure_retries_with_backoff() {
        let error = QuoteError::transient("GECKOTERMINAL", "timeout");
        assert_eq!(error.retry_class(), RetryClass::WithBackoff);
        assert!(error.is_retryable());
    }

    #[test]
    fn test_permanent_failure_is_not_retried() {
        let error = QuoteError::permanent("COWSWAP", "HTTP 401");
        assert_eq!(error.retry_class(), RetryClass::NextProvider);
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_unrepresentable_amount_is_terminal() {
        let error = QuoteError::invalid_amount("WEIRD", AmountError::UnsupportedDecimals(30));
        assert_eq!(error.retry_class(), RetryClass::Never);
        assert!(!error.is_retryable());
        assert_eq!(error.kind(), "invalid_amount");
    }

    #[test]
    fn test_error_display() {
        let error = QuoteError::no_liquidity("GHO", "USDC");
        assert_eq!(format!("{}", error), "No liquidity: GHO -> USDC");

        let error = QuoteError::permanent("COWSWAP", "HTTP 400 - UnsupportedToken");
        assert_eq!(
            format!("{}", error),
            "Quote request failed: COWSWAP - HTTP 400 - UnsupportedToken"
        );
    }
}
