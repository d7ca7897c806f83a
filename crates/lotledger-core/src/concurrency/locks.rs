//! Per-lot lock table.
//!
//! The table has no table-wide lock an operation can hold: the mutex below
//! guards only the set of held lot ids and is never held while an
//! operation computes or writes. Callers always acquire in ascending id
//! order, so two operations whose lot sets overlap can never wait on each
//! other in a cycle. Writers are still serialized one level down by the
//! store's write lock; see the controller.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::{LedgerError, Result};
use crate::storage::LotId;

#[derive(Debug, Default)]
pub struct LockTable {
    held: Mutex<HashSet<LotId>>,
    released: Condvar,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every id in `ids`, ascending, waiting at most `timeout` in total.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Retryable` on timeout; locks taken so far are
    /// released before returning.
    pub fn acquire(&self, ids: &[LotId], timeout: Duration) -> Result<LockGuard<'_>> {
        let mut ordered = ids.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let deadline = Instant::now() + timeout;
        let mut held = self.lock_held();
        let mut acquired = Vec::with_capacity(ordered.len());

        for id in ordered {
            while held.contains(&id) {
                let now = Instant::now();
                if now >= deadline {
                    for taken in &acquired {
                        held.remove(taken);
                    }
                    drop(held);
                    self.released.notify_all();
                    return Err(LedgerError::Retryable(format!(
                        "timed out after {} ms waiting for lot {}",
                        timeout.as_millis(),
                        id
                    )));
                }
                let (guard, _) = self
                    .released
                    .wait_timeout(held, deadline - now)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                held = guard;
            }
            held.insert(id);
            acquired.push(id);
        }

        Ok(LockGuard {
            table: self,
            ids: acquired,
        })
    }

    #[cfg(test)]
    fn is_locked(&self, id: LotId) -> bool {
        self.lock_held().contains(&id)
    }

    fn lock_held(&self) -> MutexGuard<'_, HashSet<LotId>> {
        // Insert/remove leave the set consistent even if a holder panicked.
        self.held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Lots held by one operation; released on drop.
#[derive(Debug)]
pub struct LockGuard<'a> {
    table: &'a LockTable,
    ids: Vec<LotId>,
}

impl LockGuard<'_> {
    /// Held ids, ascending.
    pub fn ids(&self) -> &[LotId] {
        &self.ids
    }

    pub fn covers(&self, id: LotId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if self.ids.is_empty() {
            return;
        }
        let mut held = self.table.lock_held();
        for id in &self.ids {
            held.remove(id);
        }
        drop(held);
        self.table.released.notify_all();
    }
}
