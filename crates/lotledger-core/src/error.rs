//! Error types for Lotledger core operations.
//!
//! Errors carry enough detail for the caller to act without a follow-up
//! query: shortfalls report both the available and the requested quantity.
//! Only [`LedgerError::Retryable`] should ever be retried automatically.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type alias for Lotledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Core error type for Lotledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Malformed request, rejected before any lock was taken
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced lot or item does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// On-hand pool cannot cover the request
    #[error("Insufficient quantity: {available} available, {requested} requested")]
    InsufficientQuantity { available: i64, requested: i64 },

    /// Staged pool cannot cover the request
    #[error("Insufficient staged quantity: {available} staged, {requested} requested")]
    InsufficientStagedQuantity { available: i64, requested: i64 },

    /// An internal consistency check failed; a bug, never a user error
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Serialization conflict or lock-wait timeout; safe to retry
    #[error("Retryable: {0}")]
    Retryable(String),

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid engine configuration
    #[error("Config error: {0}")]
    Config(String),
}

impl LedgerError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Retryable(_))
    }

    /// Whether the error is a business-rule shortfall.
    pub fn is_shortfall(&self) -> bool {
        matches!(
            self,
            LedgerError::InsufficientQuantity { .. } | LedgerError::InsufficientStagedQuantity { .. }
        )
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                LedgerError::Retryable(format!("database busy: {}", err))
            }
            Some(ErrorCode::ConstraintViolation) => {
                LedgerError::InvariantViolation(format!("constraint rejected write: {}", err))
            }
            _ => LedgerError::Storage(err.to_string()),
        }
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Storage(format!("Invalid JSON: {}", err))
    }
}
