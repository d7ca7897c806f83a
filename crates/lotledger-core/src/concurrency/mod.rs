//! Concurrency controller.
//!
//! Each operation locks every lot it may touch, in ascending id order, and
//! only then opens its storage transaction. Lot locks always come before the
//! storage write lock, so all operations share one acquisition order and
//! cannot deadlock. Every wait is bounded and expires as `Retryable`.
//!
//! Lot locks only keep overlapping operations apart. The SQLite store admits
//! one write transaction at a time, so operations on disjoint lots are
//! still serialized while each holds the database write lock, and one of
//! them can fail as `Retryable` if the other holds it past `lock_timeout`.
//! That lock is taken last and held only from `begin` to commit.

mod locks;
mod retry;
mod session;

use std::time::Duration;

use crate::config::ConcurrencySettings;
use crate::error::{LedgerError, Result};
use crate::storage::{LotId, LotStore, StoreTxn};

pub use locks::{LockGuard, LockTable};
pub use retry::{with_retry, RetryPolicy};
pub use session::{OperationState, OperationTrace, Session};

/// The lots an operation needs locked before its transaction opens.
#[derive(Debug, Clone, Copy)]
pub enum LockScope<'r> {
    /// One explicit lot, whether or not it exists yet
    Lot(LotId),
    /// Every lot currently holding the item
    Item(&'r str),
    /// Nothing pre-existing; the operation only creates lots
    Fresh,
}

#[derive(Debug)]
pub struct Controller {
    locks: LockTable,
    lock_timeout: Duration,
    relock_attempts: u32,
}

impl Controller {
    pub fn new(settings: &ConcurrencySettings) -> Self {
        Self {
            locks: LockTable::new(),
            lock_timeout: settings.lock_timeout(),
            relock_attempts: settings.relock_attempts.max(1),
        }
    }

    /// Run `body` inside a locked, serializable transaction and commit.
    ///
    /// Any error from `body` or from the commit rolls the transaction back
    /// and releases the locks; nothing the operation did is kept.
    pub fn run<'s, S, R, F>(
        &'s self,
        store: &'s S,
        mut trace: OperationTrace,
        scope: LockScope<'_>,
        body: F,
    ) -> Result<R>
    where
        S: LotStore,
        F: FnOnce(&mut Session<'s, S::Txn<'s>>) -> Result<R>,
    {
        trace.advance(OperationState::Locking)?;
        let (locks, txn) = self.lock_scope(store, scope)?;

        let mut session = Session::new(txn, locks, trace);
        session.advance(OperationState::Computing)?;
        let output = body(&mut session)?;
        session.commit()?;
        Ok(output)
    }

    /// Discover the lock set, lock it, open the transaction and confirm the
    /// set did not change in between.
    fn lock_scope<'s, S: LotStore>(
        &'s self,
        store: &'s S,
        scope: LockScope<'_>,
    ) -> Result<(LockGuard<'s>, S::Txn<'s>)> {
        for attempt in 1..=self.relock_attempts {
            let ids = match scope {
                LockScope::Lot(id) => vec![id],
                LockScope::Item(item) => store.lot_ids_for_item(item)?,
                LockScope::Fresh => Vec::new(),
            };

            let guard = self.locks.acquire(&ids, self.lock_timeout)?;
            let mut txn = store.begin()?;

            if let LockScope::Item(item) = scope {
                let current = txn.lot_ids_for_item(item)?;
                if current != guard.ids() {
                    tracing::debug!(item, attempt, "candidate lots changed while locking");
                    continue;
                }
            }
            return Ok((guard, txn));
        }

        Err(LedgerError::Retryable(format!(
            "candidate lots kept changing after {} attempts",
            self.relock_attempts
        )))
    }
}
