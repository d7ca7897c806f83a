//! CLI error types for structured error handling.
//!
//! This module provides typed errors that map to specific exit codes,
//! enabling consistent error handling across the CLI.

use std::fmt;

use lotledger_core::LedgerError;

use crate::constants::exit_codes;

/// CLI-specific errors with associated exit codes.
#[derive(Debug)]
pub enum CliError {
    /// Resource not found (config, ledger file)
    NotFound { message: String, hint: String },

    /// Invalid user input
    InvalidInput(String),

    /// Integrity check or reconciliation failed
    IntegrityFailed(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::NotFound { message, hint } => write!(f, "{}\n{}", message, hint),
            CliError::InvalidInput(message) => write!(f, "{}", message),
            CliError::IntegrityFailed(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Create a NotFound error with message and hint.
    pub fn not_found(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::NotFound {
            message: message.into(),
            hint: hint.into(),
        }
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        CliError::InvalidInput(message.into())
    }

    pub fn integrity_failed(message: impl Into<String>) -> Self {
        CliError::IntegrityFailed(message.into())
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::InvalidInput(_) => exit_codes::INVALID_INPUT,
            CliError::IntegrityFailed(_) => exit_codes::INTEGRITY_FAILED,
        }
    }
}

/// Exit code for an engine error.
pub fn ledger_exit_code(err: &LedgerError) -> i32 {
    match err {
        LedgerError::NotFound(_) => exit_codes::NOT_FOUND,
        LedgerError::Validation(_) | LedgerError::Config(_) => exit_codes::INVALID_INPUT,
        LedgerError::InsufficientQuantity { .. }
        | LedgerError::InsufficientStagedQuantity { .. } => exit_codes::INSUFFICIENT,
        LedgerError::InvariantViolation(_) => exit_codes::INTEGRITY_FAILED,
        LedgerError::Retryable(_) => exit_codes::RETRYABLE,
        LedgerError::Storage(_) => exit_codes::GENERAL,
    }
}

/// Exit code for any error returned by a command handler.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        return cli_err.exit_code();
    }
    if let Some(ledger_err) = err.downcast_ref::<LedgerError>() {
        return ledger_exit_code(ledger_err);
    }
    exit_codes::GENERAL
}

/// Contextual hint for common failures.
pub fn hint_for(err: &anyhow::Error) -> Option<&'static str> {
    match err.downcast_ref::<LedgerError>()? {
        LedgerError::Retryable(_) => Some("Hint: Another operation held the lots; run the command again."),
        LedgerError::InsufficientQuantity { .. } => {
            Some("Hint: Run `lotledger lots <ITEM>` to see on-hand quantities.")
        }
        LedgerError::InsufficientStagedQuantity { .. } => {
            Some("Hint: Run `lotledger history --kind pick` to see what was staged.")
        }
        LedgerError::InvariantViolation(_) => {
            Some("Hint: Run `lotledger check` and restore from a backup if it fails.")
        }
        _ => None,
    }
}
