//! Engine configuration.
//!
//! Every field has a default, so an empty `[engine]` table (or none at all)
//! yields a working configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::concurrency::RetryPolicy;
use crate::error::{LedgerError, Result};

/// Largest quantity a single request may move.
pub const DEFAULT_MAX_QUANTITY: i64 = 10_000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub limits: Limits,
    pub concurrency: ConcurrencySettings,
}

/// Bounds enforced by the validation gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_quantity: i64,
    pub max_item_len: usize,
    pub max_location_len: usize,
    pub max_actor_len: usize,
    pub max_work_order_len: usize,

    /// Bound on each lot metadata field (mpn, date code, MSL)
    pub max_metadata_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_quantity: DEFAULT_MAX_QUANTITY,
            max_item_len: 128,
            max_location_len: 64,
            max_actor_len: 64,
            max_work_order_len: 64,
            max_metadata_len: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencySettings {
    /// Bound on every lock wait, in-process and in the database
    pub lock_timeout_ms: u64,

    /// How often a pick re-discovers its candidate lots when the set
    /// changed while locking
    pub relock_attempts: u32,

    /// Attempts made by [`RetryPolicy`] for retryable failures
    pub retry_attempts: u32,

    /// First backoff delay; doubles on each further attempt
    pub retry_backoff_ms: u64,
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5_000,
            relock_attempts: 3,
            retry_attempts: 3,
            retry_backoff_ms: 25,
        }
    }
}

impl ConcurrencySettings {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_backoff_ms),
        )
    }
}

impl EngineConfig {
    /// Reject configurations the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        let limits = &self.limits;
        if limits.max_quantity < 1 {
            return Err(LedgerError::Config(
                "limits.max_quantity must be at least 1".to_string(),
            ));
        }
        if limits.max_item_len == 0 || limits.max_actor_len == 0 {
            return Err(LedgerError::Config(
                "limits.max_item_len and limits.max_actor_len must be positive".to_string(),
            ));
        }
        let concurrency = &self.concurrency;
        if concurrency.lock_timeout_ms == 0 {
            return Err(LedgerError::Config(
                "concurrency.lock_timeout_ms must be positive".to_string(),
            ));
        }
        if concurrency.relock_attempts == 0 || concurrency.retry_attempts == 0 {
            return Err(LedgerError::Config(
                "concurrency attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.limits.max_quantity, 10_000);
        assert_eq!(config.concurrency.lock_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"limits": {"max_quantity": 500}}"#).unwrap();
        assert_eq!(config.limits.max_quantity, 500);
        assert_eq!(config.limits.max_item_len, 128);
        assert_eq!(config.concurrency, ConcurrencySettings::default());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = EngineConfig::default();
        config.concurrency.lock_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(LedgerError::Config(_))));
    }
}
