use lotledger_core::{EntryFilter, LotId, OperationKind};
use uuid::Uuid;

use crate::app::AppContext;
use crate::cli::{HistoryArgs, LotsArgs};
use crate::errors::CliError;
use crate::output::{entries_table, lots_table, print_json, print_lot};

pub fn handle_lot(ctx: &AppContext, lot_id: i64) -> anyhow::Result<()> {
    let lot = ctx.ledger()?.lot(LotId(lot_id))?;
    if ctx.json() {
        return print_json(&lot);
    }
    print_lot(&lot, ctx.quiet());
    Ok(())
}

pub fn handle_lots(ctx: &AppContext, args: &LotsArgs) -> anyhow::Result<()> {
    let ledger = ctx.ledger()?;

    let Some(ref item) = args.item else {
        let lots = ledger.list_lots()?;
        if ctx.json() {
            return print_json(&lots);
        }
        if lots.is_empty() {
            if !ctx.quiet() {
                println!("No lots.");
            }
            return Ok(());
        }
        println!("{}", lots_table(&lots));
        return Ok(());
    };

    let summary = ledger.item_summary(item)?;
    let lots = ledger.lots_for_item(item)?;
    if ctx.json() {
        return print_json(&serde_json::json!({
            "summary": summary,
            "lots": lots,
        }));
    }
    if !ctx.quiet() {
        println!(
            "{}: {} on hand, {} staged across {} lot(s)",
            summary.item, summary.on_hand_qty, summary.staged_qty, summary.lot_count
        );
    }
    println!("{}", lots_table(&lots));
    Ok(())
}

pub fn handle_history(ctx: &AppContext, args: &HistoryArgs) -> anyhow::Result<()> {
    let filter = build_filter(args)?;
    let entries = ctx.ledger()?.history(&filter)?;

    if ctx.json() {
        return print_json(&entries);
    }
    if entries.is_empty() {
        if !ctx.quiet() {
            println!("No entries.");
        }
        return Ok(());
    }
    println!("{}", entries_table(&entries));
    Ok(())
}

fn build_filter(args: &HistoryArgs) -> anyhow::Result<EntryFilter> {
    let mut filter = EntryFilter::new();
    if let Some(lot) = args.lot {
        filter = filter.lot(LotId(lot));
    }
    if let Some(ref item) = args.item {
        filter = filter.item(item);
    }
    if let Some(ref kind) = args.kind {
        filter = filter.kind(kind.parse::<OperationKind>()?);
    }
    if let Some(ref work_order) = args.work_order {
        filter = filter.work_order(work_order);
    }
    if let Some(ref operation) = args.operation {
        let parsed = Uuid::parse_str(operation)
            .map_err(|e| CliError::invalid_input(format!("Invalid operation id: {}", e)))?;
        filter = filter.operation(parsed);
    }
    if let Some(limit) = args.limit {
        filter = filter.limit(limit);
    }
    if args.newest_first {
        filter = filter.newest_first();
    }
    Ok(filter)
}
