//! Application-level utilities for the Lotledger CLI.
//!
//! This module provides:
//! - Path resolution for config and ledger files
//! - The per-invocation context that opens the ledger lazily

mod context;
mod resolver;

// Re-export public API
pub use context::AppContext;
pub use resolver::resolve_config_path;
