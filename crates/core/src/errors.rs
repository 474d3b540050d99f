//! Error types for position reads, aggregation and persistence.
//!
//! Provider and quote failures are local: the aggregator turns them into
//! failure markers and keeps going. Storage failures propagate to the caller.

use aum_market_data::{AmountError, RetryError, Retryable};
use thiserror::Error;

use crate::portfolio::FailureMarker;

/// Failure reading one protocol position.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Network or RPC failure after retries were exhausted.
    #[error("{provider} unreachable: {message}")]
    Unreachable { provider: String, message: String },

    /// The chain answered with data of an unexpected shape.
    #[error("{provider} returned an invalid response: {message}")]
    InvalidResponse { provider: String, message: String },

    /// The queried account/asset combination is not handled by this provider.
    #[error("{provider} does not support {message}")]
    Unsupported { provider: String, message: String },
}

impl ProviderError {
    pub fn unreachable(provider: &str, message: impl Into<String>) -> Self {
        Self::Unreachable {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_response(provider: &str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn unsupported(provider: &str, message: impl Into<String>) -> Self {
        Self::Unsupported {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Map a chain read failure. The reader has already retried transient
    /// errors, so anything network-shaped here means the endpoint is gone.
    pub fn from_chain(provider: &str, err: ChainError) -> Self {
        match err {
            ChainError::Transport { .. } | ChainError::Http { .. } => {
                Self::unreachable(provider, err.to_string())
            }
            ChainError::Rpc { .. } if err.is_retryable() => {
                Self::unreachable(provider, err.to_string())
            }
            ChainError::Rpc { .. } | ChainError::Decode(_) => {
                Self::invalid_response(provider, err.to_string())
            }
        }
    }

    pub fn from_amount(provider: &str, err: AmountError) -> Self {
        Self::invalid_response(provider, err.to_string())
    }

    /// Short machine-readable name, used in failure markers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unreachable { .. } => "unreachable",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::Unsupported { .. } => "unsupported",
        }
    }
}

/// JSON-RPC rate limiting / resource limit codes used by public endpoints.
const RPC_LIMIT_EXCEEDED: i64 = -32005;
const RPC_INTERNAL_ERROR: i64 = -32603;
const RPC_TOO_MANY_REQUESTS: i64 = 429;

/// Failure of a single chain read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// The request never produced an HTTP response.
    #[error("RPC transport error: {message}")]
    Transport { message: String, transient: bool },

    #[error("RPC endpoint returned HTTP {status}")]
    Http { status: u16 },

    /// JSON-RPC error object, including reverts.
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Malformed hex or ABI data.
    #[error("Failed to decode RPC result: {0}")]
    Decode(String),
}

impl Retryable for ChainError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { transient, .. } => *transient,
            Self::Http { status } => *status == 429 || *status >= 500,
            Self::Rpc { code, .. } => matches!(
                *code,
                RPC_LIMIT_EXCEEDED | RPC_INTERNAL_ERROR | RPC_TOO_MANY_REQUESTS
            ),
            Self::Decode(_) => false,
        }
    }
}

/// Fatal aggregation outcomes. Anything less severe becomes a failure marker.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregateError {
    #[error("No position providers configured")]
    NoProvidersConfigured,

    /// Two providers map to the same snapshot entry.
    #[error("Position provider key '{0}' is configured more than once")]
    DuplicateProviderKey(String),

    /// Nothing could be normalized, so a snapshot would be meaningless.
    #[error("All {} position providers failed", .failures.len())]
    AllProvidersFailed { failures: Vec<FailureMarker> },
}

/// Failure of one full cycle. Either step failing means nothing was persisted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CycleError {
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failure of the persistence gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The store could not be reached, after retries where they apply.
    #[error("Storage {operation} failed after {attempts} attempt(s): {message}")]
    ConnectionFailed {
        operation: String,
        attempts: u32,
        message: String,
    },

    /// The snapshot failed pre-write checks.
    #[error("Snapshot validation failed: {reason}")]
    ValidationFailed { reason: String },
}

impl StorageError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::ValidationFailed {
            reason: reason.into(),
        }
    }

    /// Map a retried store call. Serialization problems are the snapshot's
    /// fault, everything else is the store's.
    pub fn from_store(operation: &str, err: RetryError<StoreError>) -> Self {
        let attempts = err.attempts();
        match err.into_inner() {
            StoreError::Serialization(message) => Self::ValidationFailed { reason: message },
            other => Self::ConnectionFailed {
                operation: operation.to_string(),
                attempts,
                message: other.to_string(),
            },
        }
    }
}

/// Errors raised by [`SnapshotStore`](crate::persistence::SnapshotStore) implementations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store connection error: {message}")]
    Connection { message: String, transient: bool },

    /// A document with the same key already exists.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The store refused the operation (authentication, permissions, schema).
    #[error("Store rejected operation: {0}")]
    Rejected(String),
}

impl StoreError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            transient: true,
        }
    }
}

impl Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection {
                transient: true,
                ..
            }
        )
    }
}
