//! Shared HTTP error mapping for quote providers.

use reqwest::StatusCode;

use crate::errors::QuoteError;

/// Map a transport-level reqwest error. Timeouts and connection failures
/// are worth another attempt; anything else (bad URL, TLS setup) is not.
pub(crate) fn request_error(provider: &str, err: &reqwest::Error) -> QuoteError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        QuoteError::transient(provider, format!("Request failed: {}", err))
    } else {
        QuoteError::permanent(provider, format!("Request failed: {}", err))
    }
}

/// Map a non-success HTTP status. 429 and 5xx are transient.
pub(crate) fn status_error(provider: &str, status: StatusCode, body: &str) -> QuoteError {
    let message = format!("HTTP {} - {}", status.as_u16(), truncate(body, 200));
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        QuoteError::transient(provider, message)
    } else {
        QuoteError::permanent(provider, message)
    }
}

fn truncate(body: &str, max_chars: usize) -> &str {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
