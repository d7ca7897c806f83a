//! Text and table output formatting.

use std::io::IsTerminal;

use chrono::SecondsFormat;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::{NOTHING, UTF8_FULL};
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};

use lotledger_core::audit::Discrepancy;
use lotledger_core::{LedgerEntry, Lot, OperationOutcome, ReconcileReport};

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    if std::io::stdout().is_terminal() {
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS);
    } else {
        table.load_preset(NOTHING);
    }
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    table
}

fn number(value: i64) -> Cell {
    Cell::new(value).set_alignment(CellAlignment::Right)
}

fn optional(value: Option<&str>) -> Cell {
    Cell::new(value.unwrap_or("-"))
}

/// Table of lots, one row each.
pub fn lots_table(lots: &[Lot]) -> Table {
    let mut table = new_table(&[
        "LOT", "ITEM", "ON HAND", "STAGED", "LOCATION", "MPN", "DATE CODE", "UPDATED",
    ]);
    for lot in lots {
        table.add_row(vec![
            number(lot.id.get()),
            Cell::new(&lot.item),
            number(lot.on_hand_qty),
            number(lot.staged_qty),
            optional(lot.location.as_deref()),
            optional(lot.metadata.mpn.as_deref()),
            optional(lot.metadata.date_code.as_deref()),
            Cell::new(lot.last_modified.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ]);
    }
    table
}

/// Table of ledger entries in the order given.
pub fn entries_table(entries: &[LedgerEntry]) -> Table {
    let mut table = new_table(&[
        "#", "TIME", "KIND", "LOT", "ITEM", "QTY", "FROM", "TO", "ACTOR", "WORK ORDER",
    ]);
    for entry in entries {
        table.add_row(vec![
            number(entry.entry_id),
            Cell::new(entry.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Cell::new(entry.kind),
            number(entry.lot_id.get()),
            Cell::new(&entry.item),
            number(entry.quantity_delta),
            optional(entry.location_from.as_deref()),
            optional(entry.location_to.as_deref()),
            Cell::new(&entry.actor),
            optional(entry.work_order.as_deref()),
        ]);
    }
    table
}

/// Print the result of a committed operation.
///
/// Quiet mode prints only the changed lot ids, one per line.
pub fn print_outcome(outcome: &OperationOutcome, quiet: bool) {
    if quiet {
        for change in &outcome.lots {
            println!("{}", change.lot_id);
        }
        return;
    }

    println!(
        "{} {} x{} committed (operation {})",
        outcome.kind, outcome.item, outcome.quantity, outcome.operation_id
    );
    let mut table = new_table(&["LOT", "MOVED", "ON HAND", "STAGED", "LOCATION", ""]);
    for change in &outcome.lots {
        table.add_row(vec![
            number(change.lot_id.get()),
            number(change.quantity),
            number(change.on_hand_qty),
            number(change.staged_qty),
            optional(change.location.as_deref()),
            Cell::new(if change.created { "new" } else { "" }),
        ]);
    }
    println!("{}", table);
}

/// Print one lot as key-value lines.
pub fn print_lot(lot: &Lot, quiet: bool) {
    if quiet {
        println!("{} {} {}", lot.id, lot.on_hand_qty, lot.staged_qty);
        return;
    }
    println!("Lot: {}", lot.id);
    println!("Item: {}", lot.item);
    println!("On hand: {}", lot.on_hand_qty);
    println!("Staged: {}", lot.staged_qty);
    println!("Location: {}", lot.location.as_deref().unwrap_or("-"));
    if let Some(ref mpn) = lot.metadata.mpn {
        println!("MPN: {}", mpn);
    }
    if let Some(ref date_code) = lot.metadata.date_code {
        println!("Date code: {}", date_code);
    }
    if let Some(ref msl) = lot.metadata.msl {
        println!("MSL: {}", msl);
    }
    println!(
        "Created: {}",
        lot.created_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    println!(
        "Updated: {}",
        lot.last_modified.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
}

/// Print a reconciliation report.
pub fn print_report(report: &ReconcileReport, quiet: bool) {
    if report.is_clean() {
        if !quiet {
            println!("Integrity check: OK");
            println!("- database integrity: OK");
            println!("- foreign keys: OK");
            println!(
                "- ledger replay: OK ({} lots, {} entries)",
                report.lots_checked, report.entries_replayed
            );
        }
        return;
    }

    eprintln!("Integrity check: FAILED");
    for discrepancy in &report.discrepancies {
        eprintln!("- {}", describe(discrepancy));
    }
}

fn describe(discrepancy: &Discrepancy) -> String {
    match discrepancy {
        Discrepancy::QuantityMismatch {
            lot_id,
            stored_on_hand,
            stored_staged,
            replayed_on_hand,
            replayed_staged,
        } => format!(
            "lot {}: stored {}/{} (on hand/staged), log replays to {}/{}",
            lot_id, stored_on_hand, stored_staged, replayed_on_hand, replayed_staged
        ),
        Discrepancy::NegativeStored {
            lot_id,
            on_hand_qty,
            staged_qty,
        } => format!(
            "lot {}: negative stored quantity {}/{}",
            lot_id, on_hand_qty, staged_qty
        ),
        Discrepancy::NegativeReplay { lot_id, entry_id } => format!(
            "lot {}: replay goes negative at entry {}",
            lot_id, entry_id
        ),
        Discrepancy::ItemMismatch {
            lot_id,
            entry_id,
            lot_item,
            entry_item,
        } => format!(
            "lot {}: entry {} records item {} but the lot holds {}",
            lot_id, entry_id, entry_item, lot_item
        ),
        Discrepancy::OrphanEntry { lot_id, entry_id } => {
            format!("entry {} references missing lot {}", entry_id, lot_id)
        }
    }
}
