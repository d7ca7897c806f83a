//! Log replay and reconciliation.
//!
//! Replays the transaction log per lot and compares the result with the
//! stored quantities. Pure over a snapshot; no locks are taken.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::storage::{LedgerEntry, Lot, LotId, OperationKind};

/// One way the stored state and the log disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discrepancy {
    /// Stored quantities differ from the replayed ones
    QuantityMismatch {
        lot_id: LotId,
        stored_on_hand: i64,
        stored_staged: i64,
        replayed_on_hand: i64,
        replayed_staged: i64,
    },

    /// A stored quantity is negative
    NegativeStored {
        lot_id: LotId,
        on_hand_qty: i64,
        staged_qty: i64,
    },

    /// Replaying up to this entry drove a quantity negative
    NegativeReplay { lot_id: LotId, entry_id: i64 },

    /// Entry names a different item than its lot
    ItemMismatch {
        lot_id: LotId,
        entry_id: i64,
        lot_item: String,
        entry_item: String,
    },

    /// Entry references a lot that does not exist
    OrphanEntry { lot_id: LotId, entry_id: i64 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub lots_checked: usize,
    pub entries_replayed: usize,
    pub discrepancies: Vec<Discrepancy>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

#[derive(Default)]
struct Replayed {
    on_hand: i64,
    staged: i64,
    went_negative: bool,
}

/// Replay `entries` (in append order) and compare against `lots`.
pub fn reconcile(lots: &[Lot], entries: &[LedgerEntry]) -> ReconcileReport {
    let by_id: BTreeMap<LotId, &Lot> = lots.iter().map(|lot| (lot.id, lot)).collect();
    let mut replayed: BTreeMap<LotId, Replayed> = BTreeMap::new();
    let mut discrepancies = Vec::new();

    for entry in entries {
        let Some(lot) = by_id.get(&entry.lot_id) else {
            discrepancies.push(Discrepancy::OrphanEntry {
                lot_id: entry.lot_id,
                entry_id: entry.entry_id,
            });
            continue;
        };
        if lot.item != entry.item {
            discrepancies.push(Discrepancy::ItemMismatch {
                lot_id: lot.id,
                entry_id: entry.entry_id,
                lot_item: lot.item.clone(),
                entry_item: entry.item.clone(),
            });
        }

        let state = replayed.entry(entry.lot_id).or_default();
        let quantity = entry.quantity_delta;
        match entry.kind {
            OperationKind::Stock | OperationKind::Adjust => {
                state.on_hand = state.on_hand.saturating_add(quantity);
            }
            OperationKind::Pick => {
                state.on_hand = state.on_hand.saturating_sub(quantity);
                state.staged = state.staged.saturating_add(quantity);
            }
            OperationKind::Restock => {
                state.staged = state.staged.saturating_sub(quantity);
                state.on_hand = state.on_hand.saturating_add(quantity);
            }
        }

        // Report only the first entry that goes negative for each lot.
        if (state.on_hand < 0 || state.staged < 0) && !state.went_negative {
            state.went_negative = true;
            discrepancies.push(Discrepancy::NegativeReplay {
                lot_id: entry.lot_id,
                entry_id: entry.entry_id,
            });
        }
    }

    for lot in lots {
        if lot.on_hand_qty < 0 || lot.staged_qty < 0 {
            discrepancies.push(Discrepancy::NegativeStored {
                lot_id: lot.id,
                on_hand_qty: lot.on_hand_qty,
                staged_qty: lot.staged_qty,
            });
        }
        let (on_hand, staged) = replayed
            .get(&lot.id)
            .map(|state| (state.on_hand, state.staged))
            .unwrap_or((0, 0));
        if on_hand != lot.on_hand_qty || staged != lot.staged_qty {
            discrepancies.push(Discrepancy::QuantityMismatch {
                lot_id: lot.id,
                stored_on_hand: lot.on_hand_qty,
                stored_staged: lot.staged_qty,
                replayed_on_hand: on_hand,
                replayed_staged: staged,
            });
        }
    }

    ReconcileReport {
        lots_checked: lots.len(),
        entries_replayed: entries.len(),
        discrepancies,
    }
}
