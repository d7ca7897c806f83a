//! Lot allocation.
//!
//! Pure functions over lots already read under lock. Candidates are always
//! ordered by ascending lot id, which is the age order.

use crate::error::{LedgerError, Result};
use crate::storage::{Lot, LotId};

/// Quantity drawn from one lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Portion {
    pub lot_id: LotId,
    pub quantity: i64,
}

/// Split `requested` across `lots`, oldest first.
///
/// Lot *k* contributes `clamp(requested - on_hand_before_k, 0, on_hand_k)`.
/// Lots contributing nothing are left out of the result.
///
/// # Errors
///
/// Returns `InsufficientQuantity` with the total on-hand across every lot
/// when the lots cannot cover the request; nothing is allocated in that case.
pub fn allocate_fifo(lots: &[Lot], requested: i64) -> Result<Vec<Portion>> {
    ensure_ascending(lots)?;

    let available = lots
        .iter()
        .fold(0i64, |sum, lot| sum.saturating_add(lot.on_hand_qty));
    if available < requested {
        return Err(LedgerError::InsufficientQuantity {
            available,
            requested,
        });
    }

    let mut portions = Vec::new();
    let mut running_total = 0i64;
    for lot in lots {
        if running_total >= requested {
            break;
        }
        let portion = (requested - running_total).clamp(0, lot.on_hand_qty.max(0));
        if portion > 0 {
            portions.push(Portion {
                lot_id: lot.id,
                quantity: portion,
            });
        }
        running_total = running_total.saturating_add(lot.on_hand_qty);
    }

    let allocated: i64 = portions.iter().map(|p| p.quantity).sum();
    if allocated != requested {
        return Err(LedgerError::InvariantViolation(format!(
            "FIFO allocated {} of {} requested",
            allocated, requested
        )));
    }
    Ok(portions)
}

/// Choose the lot a restock-by-item returns stock to: the oldest lot whose
/// staged quantity covers the request.
///
/// # Errors
///
/// `NotFound` when there are no lots; otherwise `InsufficientStagedQuantity`
/// reporting the largest staged quantity of any single lot.
pub fn select_restock_lot<'a>(lots: &'a [Lot], item: &str, requested: i64) -> Result<&'a Lot> {
    ensure_ascending(lots)?;

    if lots.is_empty() {
        return Err(LedgerError::NotFound(format!("no lots for item {}", item)));
    }
    if let Some(lot) = lots.iter().find(|lot| lot.staged_qty >= requested) {
        return Ok(lot);
    }
    let available = lots.iter().map(|lot| lot.staged_qty).max().unwrap_or(0);
    Err(LedgerError::InsufficientStagedQuantity {
        available,
        requested,
    })
}

fn ensure_ascending(lots: &[Lot]) -> Result<()> {
    if lots.windows(2).any(|pair| pair[0].id >= pair[1].id) {
        return Err(LedgerError::InvariantViolation(
            "candidate lots are not in ascending id order".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LotMetadata;
    use chrono::Utc;

    fn lot(id: i64, on_hand: i64, staged: i64) -> Lot {
        Lot {
            id: LotId(id),
            item: "C-10U".to_string(),
            on_hand_qty: on_hand,
            staged_qty: staged,
            location: None,
            metadata: LotMetadata::default(),
            created_at: Utc::now(),
            last_modified: Utc::now(),
        }
    }

    #[test]
    fn test_oldest_lot_drained_first() {
        let lots = vec![lot(1, 30, 0), lot(2, 80, 0)];
        let portions = allocate_fifo(&lots, 50).unwrap();
        assert_eq!(
            portions,
            vec![
                Portion {
                    lot_id: LotId(1),
                    quantity: 30
                },
                Portion {
                    lot_id: LotId(2),
                    quantity: 20
                },
            ]
        );
    }

    #[test]
    fn test_single_lot_covers_request() {
        let lots = vec![lot(4, 100, 0), lot(9, 80, 0)];
        let portions = allocate_fifo(&lots, 100).unwrap();
        assert_eq!(portions.len(), 1);
        assert_eq!(portions[0].lot_id, LotId(4));
    }

    #[test]
    fn test_empty_lots_are_skipped() {
        let lots = vec![lot(1, 0, 10), lot(2, 5, 0), lot(3, 0, 0), lot(7, 5, 0)];
        let portions = allocate_fifo(&lots, 8).unwrap();
        assert_eq!(
            portions,
            vec![
                Portion {
                    lot_id: LotId(2),
                    quantity: 5
                },
                Portion {
                    lot_id: LotId(7),
                    quantity: 3
                },
            ]
        );
    }

    #[test]
    fn test_shortfall_reports_total_available() {
        let lots = vec![lot(1, 15, 0), lot(2, 25, 0)];
        let err = allocate_fifo(&lots, 50).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientQuantity {
                available: 40,
                requested: 50
            }
        ));
    }

    #[test]
    fn test_exact_total_is_fully_consumed() {
        let lots = vec![lot(1, 15, 0), lot(2, 25, 0)];
        let portions = allocate_fifo(&lots, 40).unwrap();
        assert_eq!(portions.iter().map(|p| p.quantity).sum::<i64>(), 40);
        assert_eq!(portions.len(), 2);
    }

    #[test]
    fn test_unordered_candidates_rejected() {
        let lots = vec![lot(2, 10, 0), lot(1, 10, 0)];
        assert!(matches!(
            allocate_fifo(&lots, 5),
            Err(LedgerError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_restock_picks_oldest_covering_lot() {
        let lots = vec![lot(1, 0, 5), lot(2, 0, 20), lot(3, 0, 40)];
        assert_eq!(select_restock_lot(&lots, "C-10U", 15).unwrap().id, LotId(2));
        assert_eq!(select_restock_lot(&lots, "C-10U", 5).unwrap().id, LotId(1));
    }

    #[test]
    fn test_restock_shortfall_reports_largest_staged() {
        let lots = vec![lot(1, 0, 5), lot(2, 0, 20)];
        let err = select_restock_lot(&lots, "C-10U", 50).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientStagedQuantity {
                available: 20,
                requested: 50
            }
        ));
        assert!(matches!(
            select_restock_lot(&[], "C-10U", 1),
            Err(LedgerError::NotFound(_))
        ));
    }
}
