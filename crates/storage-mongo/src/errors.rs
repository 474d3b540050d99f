//! Storage-specific error types for MongoDB operations.
//!
//! Driver errors are classified here and converted into the store-agnostic
//! [`StoreError`] defined in `aum-core`, which carries the retry decision.

use aum_core::errors::StoreError;
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use thiserror::Error;

/// Server error code for a unique index violation.
const DUPLICATE_KEY_CODE: i32 = 11000;

const RETRYABLE_LABELS: [&str; 2] = ["RetryableWriteError", "TransientTransactionError"];

#[derive(Error, Debug)]
pub enum MongoStorageError {
    #[error("Invalid MongoDB connection string: {0}")]
    InvalidUri(String),
}

/// Classify a driver error.
pub fn to_store_error(err: MongoError) -> StoreError {
    if RETRYABLE_LABELS.iter().any(|label| err.contains_label(label)) {
        return StoreError::transient(err.to_string());
    }
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY_CODE => {
            StoreError::DuplicateKey(write.message.clone())
        }
        ErrorKind::Io(_)
        | ErrorKind::ServerSelection { .. }
        | ErrorKind::ConnectionPoolCleared { .. } => StoreError::transient(err.to_string()),
        ErrorKind::Authentication { .. } => StoreError::Rejected(err.to_string()),
        ErrorKind::BsonSerialization(_) | ErrorKind::BsonDeserialization(_) => {
            StoreError::Serialization(err.to_string())
        }
        _ => StoreError::Connection {
            message: err.to_string(),
            transient: false,
        },
    }
}
