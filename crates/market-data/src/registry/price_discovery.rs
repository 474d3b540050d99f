//! Price discovery service.
//!
//! Converts an amount of one asset into another by asking the configured
//! quote providers in priority order. The flow for one request:
//!
//! 1. Same asset (by symbol) or zero amount: answered locally
//! 2. Negative amount (a liability): quote the absolute value, negate the result
//! 3. Direct providers supporting the pair, each wrapped in the retry policy
//!    and gated by the circuit breaker
//! 4. If nothing direct could answer, one hop through a configured
//!    intermediate (`XTZ -> WXTZ -> USDC`)
//! 5. Every returned quote must be younger than `max_quote_age`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, info, warn};
use rust_decimal::Decimal;

use super::{CircuitBreaker, CircuitBreakerConfig};
use crate::errors::{QuoteError, RetryClass};
use crate::models::{Asset, Quote};
use crate::provider::QuoteProvider;
use crate::retry::RetryPolicy;

const DEFAULT_MAX_QUOTE_AGE: Duration = Duration::from_secs(300);
const ZERO_AMOUNT_PROVIDER: &str = "ZERO_AMOUNT";

/// Anything that can value an amount of one asset in another.
///
/// The aggregator depends on this trait rather than on [`PriceDiscovery`]
/// so it can be driven by scripted quotes in tests.
#[async_trait]
pub trait PriceDiscoveryTrait: Send + Sync {
    async fn quote(&self, from: &Asset, amount: Decimal, to: &Asset) -> Result<Quote, QuoteError>;
}

#[derive(Clone, Debug)]
pub struct PriceDiscoverySettings {
    /// Quotes observed longer ago than this are rejected as stale.
    pub max_quote_age: Duration,
    /// Applied to each provider call.
    pub retry: RetryPolicy,
    pub circuit_breaker: CircuitBreakerConfig,
    /// Assets usable as the middle leg of a two-step conversion.
    pub intermediates: Vec<Asset>,
}

impl Default for PriceDiscoverySettings {
    fn default() -> Self {
        Self {
            max_quote_age: DEFAULT_MAX_QUOTE_AGE,
            retry: RetryPolicy::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            intermediates: Vec::new(),
        }
    }
}

pub struct PriceDiscovery {
    providers: Vec<Arc<dyn QuoteProvider>>,
    retry: RetryPolicy,
    circuit_breaker: CircuitBreaker,
    max_quote_age: TimeDelta,
    intermediates: Vec<Asset>,
}

impl PriceDiscovery {
    pub fn new(mut providers: Vec<Arc<dyn QuoteProvider>>, settings: PriceDiscoverySettings) -> Self {
        providers.sort_by_key(|p| p.priority());
        let max_quote_age =
            TimeDelta::from_std(settings.max_quote_age).unwrap_or_else(|_| TimeDelta::days(365));

        Self {
            providers,
            retry: settings.retry,
            circuit_breaker: CircuitBreaker::new(settings.circuit_breaker),
            max_quote_age,
            intermediates: settings.intermediates,
        }
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    fn has_direct(&self, from: &Asset, to: &Asset) -> bool {
        self.providers.iter().any(|p| p.supports(from, to))
    }

    fn check_freshness(&self, quote: Quote, now: DateTime<Utc>) -> Result<Quote, QuoteError> {
        let age = now - quote.as_of;
        if age > self.max_quote_age {
            return Err(QuoteError::StaleQuote {
                provider: quote.provider,
                age_secs: age.num_seconds(),
                max_age_secs: self.max_quote_age.num_seconds(),
            });
        }
        Ok(quote)
    }

    /// Try every provider that supports the pair, in priority order.
    async fn quote_direct(
        &self,
        from: &Asset,
        amount: Decimal,
        to: &Asset,
    ) -> Result<Quote, QuoteError> {
        let mut last_error: Option<QuoteError> = None;

        for provider in self.providers.iter().filter(|p| p.supports(from, to)) {
            let provider_id = provider.id();

            if !self.circuit_breaker.is_allowed(provider_id) {
                debug!("Circuit breaker open for '{}', skipping", provider_id);
                if last_error.is_none() {
                    last_error = Some(QuoteError::transient(provider_id, "circuit breaker open"));
                }
                continue;
            }

            let label = format!("{} {}->{}", provider_id, from.symbol, to.symbol);
            let result = self
                .retry
                .run(&label, || provider.quote(from, amount, to))
                .await;

            match result {
                Ok(quote) => {
                    self.circuit_breaker.record_success(provider_id);
                    match self.check_freshness(quote, Utc::now()) {
                        Ok(quote) => return Ok(quote),
                        Err(e) => {
                            info!("Rejecting quote from '{}': {}", provider_id, e);
                            last_error = Some(e);
                        }
                    }
                }
                Err(retry_error) => {
                    let attempts = retry_error.attempts();
                    let error = retry_error.into_inner();
                    match error.retry_class() {
                        RetryClass::Never => return Err(error),
                        RetryClass::WithBackoff => {
                            self.circuit_breaker.record_failure(provider_id);
                            warn!(
                                "Provider '{}' failed after {} attempts: {}",
                                provider_id, attempts, error
                            );
                        }
                        RetryClass::NextProvider => {
                            info!("Provider '{}' cannot quote: {}, trying next", provider_id, error);
                        }
                    }
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| QuoteError::no_liquidity(&from.symbol, &to.symbol)))
    }

    /// `from -> intermediate -> to` through the first intermediate that has
    /// providers on both legs.
    async fn quote_via_intermediate(
        &self,
        from: &Asset,
        amount: Decimal,
        to: &Asset,
    ) -> Option<Result<Quote, QuoteError>> {
        let middle = self.intermediates.iter().find(|m| {
            !m.same_asset(from)
                && !m.same_asset(to)
                && self.has_direct(from, m)
                && self.has_direct(m, to)
        })?;

        debug!("Quoting {} -> {} via {}", from.symbol, to.symbol, middle.symbol);

        let result: Result<Quote, QuoteError> = async {
            let first = self.quote_direct(from, amount, middle).await?;
            let second = self.quote_direct(middle, first.amount_out, to).await?;
            Ok(Quote::new(
                from.clone(),
                to.clone(),
                amount,
                second.amount_out,
                format!("{}+{}", first.provider, second.provider),
                first.as_of.min(second.as_of),
            ))
        }
        .await;
        Some(result)
    }

    async fn quote_unsigned(
        &self,
        from: &Asset,
        amount: Decimal,
        to: &Asset,
    ) -> Result<Quote, QuoteError> {
        let direct = self.quote_direct(from, amount, to).await;
        match direct {
            Err(e) if e.retry_class() == RetryClass::NextProvider => {
                match self.quote_via_intermediate(from, amount, to).await {
                    Some(hop) => hop,
                    None => Err(e),
                }
            }
            other => other,
        }
    }
}

#[async_trait]
impl PriceDiscoveryTrait for PriceDiscovery {
    async fn quote(&self, from: &Asset, amount: Decimal, to: &Asset) -> Result<Quote, QuoteError> {
        let now = Utc::now();

        if from.same_asset(to) {
            return Ok(Quote::identity(from.clone(), to.clone(), amount, now));
        }
        if amount.is_zero() {
            return Ok(Quote::new(
                from.clone(),
                to.clone(),
                amount,
                Decimal::ZERO,
                ZERO_AMOUNT_PROVIDER,
                now,
            ));
        }

        if amount.is_sign_negative() {
            return self
                .quote_unsigned(from, amount.abs(), to)
                .await
                .map(Quote::negated);
        }
        self.quote_unsigned(from, amount, to).await
    }
}
