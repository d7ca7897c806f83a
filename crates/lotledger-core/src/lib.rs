//! # Lotledger Core
//!
//! Inventory ledger engine: Stock, Pick and Restock against a shared pool of
//! item lots, with non-negative quantities, FIFO multi-lot allocation and an
//! append-only transaction log.
//!
//! This crate provides the domain model, the storage abstraction and the
//! engine itself, independent of any transport or user interface.
//!
//! ## Architecture
//!
//! - **validation**: request checks that run before any lock is taken
//! - **concurrency**: per-lot lock table, transaction sessions, retry helper
//! - **allocation**: FIFO portioning across candidate lots
//! - **engine**: the `Ledger` type exposing stock/pick/restock/adjust
//! - **storage**: `LotStore` trait and the SQLite backend
//! - **audit**: log replay and reconciliation against stored quantities

pub mod allocation;
pub mod audit;
pub mod clock;
pub mod concurrency;
pub mod config;
pub mod engine;
pub mod error;
pub mod fs;
pub mod request;
pub mod storage;
pub mod validation;

pub use audit::{Discrepancy, ReconcileReport};
pub use clock::{Clock, FixedClock, SystemClock};
pub use concurrency::{with_retry, RetryPolicy};
pub use config::{ConcurrencySettings, EngineConfig, Limits};
pub use engine::{ItemSummary, Ledger, LotChange, OperationOutcome};
pub use error::{LedgerError, Result};
pub use request::{AdjustRequest, PickRequest, RestockRequest, RestockTarget, StockRequest};
pub use storage::{
    EntryFilter, LedgerEntry, Lot, LotId, LotMetadata, LotStore, OperationKind, SqliteLotStore,
};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
