//! Constants used throughout the CLI.

/// Exit codes for the CLI.
///
/// These follow common Unix conventions:
/// - 0: Success
/// - 1: General error (used by anyhow for unhandled errors)
/// - 2: Misuse of shell command (reserved by shells, and by clap)
/// - 3+: Application-specific errors
pub mod exit_codes {
    /// Unclassified failure.
    pub const GENERAL: i32 = 1;

    /// Resource not found (config, ledger, lot, item).
    pub const NOT_FOUND: i32 = 3;

    /// Invalid user input or arguments.
    pub const INVALID_INPUT: i32 = 4;

    /// On-hand or staged quantity cannot cover the request.
    pub const INSUFFICIENT: i32 = 5;

    /// Integrity check or reconciliation failed.
    pub const INTEGRITY_FAILED: i32 = 6;

    /// Temporary failure; the same command may succeed if retried (EX_TEMPFAIL).
    pub const RETRYABLE: i32 = 75;
}

/// Actor recorded when neither `--actor` nor `$USER` is set.
pub const FALLBACK_ACTOR: &str = "unknown";
