//! Validation gate.
//!
//! Every check here runs before any lock is taken or any transaction is
//! opened, so a rejected request has no side effects at all.

use crate::config::Limits;
use crate::error::{LedgerError, Result};
use crate::request::{AdjustRequest, PickRequest, RestockRequest, RestockTarget, StockRequest};
use crate::storage::{LotId, LotMetadata};

pub fn validate_stock(request: &StockRequest, limits: &Limits) -> Result<()> {
    check_quantity(request.quantity, limits)?;
    check_item(&request.item, limits)?;
    check_optional_lot(request.lot_id)?;
    check_text("location", &request.location, limits.max_location_len)?;
    check_metadata(&request.metadata, limits)?;
    check_actor(&request.actor, limits)?;
    check_work_order(request.work_order.as_deref(), limits)
}

pub fn validate_pick(request: &PickRequest, limits: &Limits) -> Result<()> {
    check_quantity(request.quantity, limits)?;
    check_item(&request.item, limits)?;
    check_optional_lot(request.lot_id)?;
    if let Some(ref destination) = request.destination {
        check_text("destination", destination, limits.max_location_len)?;
    }
    check_actor(&request.actor, limits)?;
    check_work_order(request.work_order.as_deref(), limits)
}

pub fn validate_restock(request: &RestockRequest, limits: &Limits) -> Result<()> {
    check_quantity(request.quantity, limits)?;
    match request.target {
        RestockTarget::Lot(lot_id) => check_lot(lot_id)?,
        RestockTarget::Item(ref item) => check_item(item, limits)?,
    }
    if let Some(ref location) = request.location {
        check_text("location", location, limits.max_location_len)?;
    }
    check_actor(&request.actor, limits)?;
    check_work_order(request.work_order.as_deref(), limits)
}

pub fn validate_adjust(request: &AdjustRequest, limits: &Limits) -> Result<()> {
    if request.delta == 0 {
        return Err(LedgerError::Validation(
            "adjustment must be non-zero".to_string(),
        ));
    }
    if request.delta.unsigned_abs() > limits.max_quantity.unsigned_abs() {
        return Err(LedgerError::Validation(format!(
            "adjustment {} exceeds the maximum of {}",
            request.delta, limits.max_quantity
        )));
    }
    check_lot(request.lot_id)?;
    check_actor(&request.actor, limits)?;
    check_work_order(request.work_order.as_deref(), limits)
}

fn check_quantity(quantity: i64, limits: &Limits) -> Result<()> {
    if quantity < 1 || quantity > limits.max_quantity {
        return Err(LedgerError::Validation(format!(
            "quantity must be between 1 and {}, got {}",
            limits.max_quantity, quantity
        )));
    }
    Ok(())
}

fn check_lot(lot_id: LotId) -> Result<()> {
    if lot_id.get() < 1 {
        return Err(LedgerError::Validation(format!(
            "lot id must be a positive integer, got {}",
            lot_id
        )));
    }
    Ok(())
}

fn check_optional_lot(lot_id: Option<LotId>) -> Result<()> {
    lot_id.map_or(Ok(()), check_lot)
}

/// Items are matched exactly, so padding would silently create a distinct item.
fn check_item(item: &str, limits: &Limits) -> Result<()> {
    check_text("item", item, limits.max_item_len)?;
    if item.trim() != item {
        return Err(LedgerError::Validation(format!(
            "item '{}' has leading or trailing whitespace",
            item
        )));
    }
    Ok(())
}

fn check_actor(actor: &str, limits: &Limits) -> Result<()> {
    check_text("actor", actor, limits.max_actor_len)
}

fn check_work_order(work_order: Option<&str>, limits: &Limits) -> Result<()> {
    match work_order {
        Some(value) => check_text("work order", value, limits.max_work_order_len),
        None => Ok(()),
    }
}

fn check_metadata(metadata: &LotMetadata, limits: &Limits) -> Result<()> {
    let fields = [
        ("mpn", &metadata.mpn),
        ("date code", &metadata.date_code),
        ("msl", &metadata.msl),
    ];
    for (name, value) in fields {
        if let Some(value) = value {
            check_text(name, value, limits.max_metadata_len)?;
        }
    }
    Ok(())
}

/// Non-empty, bounded, printable.
fn check_text(field: &str, value: &str, max_len: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::Validation(format!("{} must not be empty", field)));
    }
    let len = value.chars().count();
    if len > max_len {
        return Err(LedgerError::Validation(format!(
            "{} is {} characters long (max {})",
            field, len, max_len
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(LedgerError::Validation(format!(
            "{} contains control characters",
            field
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> Limits {
        Limits::default()
    }

    fn assert_invalid(result: Result<()>) {
        assert!(
            matches!(result, Err(LedgerError::Validation(_))),
            "expected validation error, got {:?}",
            result
        );
    }

    #[test]
    fn test_quantity_bounds() {
        let ok = StockRequest::new("R-10K", 10_000, "A-01", "alice");
        validate_stock(&ok, &limits()).unwrap();

        for quantity in [0, -1, 10_001] {
            let request = StockRequest::new("R-10K", quantity, "A-01", "alice");
            assert_invalid(validate_stock(&request, &limits()));
        }
    }

    #[test]
    fn test_item_rules() {
        for item in ["", "   ", " R-10K", "R-10K\n", "R\u{7}10K"] {
            let request = PickRequest::new(item, 1, "alice");
            assert_invalid(validate_pick(&request, &limits()));
        }

        let long = "X".repeat(129);
        assert_invalid(validate_pick(&PickRequest::new(long, 1, "alice"), &limits()));
        let max = "X".repeat(128);
        validate_pick(&PickRequest::new(max, 1, "alice"), &limits()).unwrap();
    }

    #[test]
    fn test_lot_id_must_be_positive() {
        let request = PickRequest::new("R-10K", 1, "alice").with_lot(LotId(0));
        assert_invalid(validate_pick(&request, &limits()));

        let request = RestockRequest::for_lot(LotId(-4), 1, "alice");
        assert_invalid(validate_restock(&request, &limits()));

        let request = RestockRequest::for_lot(LotId(4), 1, "alice");
        validate_restock(&request, &limits()).unwrap();
    }

    #[test]
    fn test_location_and_actor_bounds() {
        let request = StockRequest::new("R-10K", 5, "L".repeat(65), "alice");
        assert_invalid(validate_stock(&request, &limits()));

        let request = StockRequest::new("R-10K", 5, "", "alice");
        assert_invalid(validate_stock(&request, &limits()));

        let request = StockRequest::new("R-10K", 5, "A-01", "");
        assert_invalid(validate_stock(&request, &limits()));

        let request = RestockRequest::for_item("R-10K", 5, "alice").with_location("");
        assert_invalid(validate_restock(&request, &limits()));
    }

    #[test]
    fn test_metadata_fields_are_bounded() {
        let metadata = LotMetadata {
            mpn: Some("M".repeat(65)),
            ..LotMetadata::default()
        };
        let request = StockRequest::new("R-10K", 5, "A-01", "alice").with_metadata(metadata);
        assert_invalid(validate_stock(&request, &limits()));
    }

    #[test]
    fn test_adjust_rules() {
        assert_invalid(validate_adjust(
            &AdjustRequest::new(LotId(1), 0, "alice"),
            &limits(),
        ));
        assert_invalid(validate_adjust(
            &AdjustRequest::new(LotId(1), -10_001, "alice"),
            &limits(),
        ));
        validate_adjust(&AdjustRequest::new(LotId(1), -10_000, "alice"), &limits()).unwrap();
    }

    #[test]
    fn test_custom_limits_apply() {
        let limits = Limits {
            max_quantity: 50,
            ..Limits::default()
        };
        let request = PickRequest::new("R-10K", 51, "alice");
        assert_invalid(validate_pick(&request, &limits));
    }

    #[test]
    fn test_metadata_has_its_own_limit() {
        let limits = Limits {
            max_location_len: 4,
            max_metadata_len: 12,
            ..Limits::default()
        };
        let with_mpn = |mpn: &str| {
            StockRequest::new("R-10K", 5, "A-01", "alice").with_metadata(LotMetadata {
                mpn: Some(mpn.to_string()),
                ..LotMetadata::default()
            })
        };

        validate_stock(&with_mpn("RC0603FR-07"), &limits).unwrap();
        assert_invalid(validate_stock(&with_mpn("RC0603FR-0710KL"), &limits));
    }
}
