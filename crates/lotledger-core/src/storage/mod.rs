//! Storage layer: the `LotStore` abstraction and its SQLite backend.

mod sqlite;
mod traits;
mod types;

pub use sqlite::{SqliteLotStore, SqliteTxn};
pub use traits::{LotStore, StoreTxn};
pub use types::{
    EntryFilter, LedgerEntry, Lot, LotDelta, LotId, LotMetadata, NewLedgerEntry, NewLot,
    OperationKind, StoreSnapshot,
};
