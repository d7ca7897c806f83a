//! Stock, pick, restock and adjust.
//!
//! Each handler builds a request, runs it under the ledger's retry policy
//! and prints the outcome.

use lotledger_core::{
    with_retry, AdjustRequest, LotId, LotMetadata, OperationOutcome, PickRequest,
    RestockRequest, StockRequest,
};

use crate::app::AppContext;
use crate::cli::{AdjustArgs, PickArgs, RestockArgs, StockArgs};
use crate::errors::CliError;
use crate::output::{print_json, print_outcome};

pub fn handle_stock(ctx: &AppContext, args: &StockArgs) -> anyhow::Result<()> {
    let ledger = ctx.ledger()?;

    let mut request = StockRequest::new(&args.item, args.quantity, &args.location, ctx.actor())
        .with_metadata(LotMetadata {
            mpn: args.mpn.clone(),
            date_code: args.date_code.clone(),
            msl: args.msl.clone(),
        });
    if let Some(lot) = args.lot {
        request = request.with_lot(LotId(lot));
    }
    if let Some(ref work_order) = args.work_order {
        request = request.with_work_order(work_order);
    }

    let outcome = with_retry(&ledger.retry_policy(), || ledger.stock(&request))?;
    report(ctx, &outcome)
}

pub fn handle_pick(ctx: &AppContext, args: &PickArgs) -> anyhow::Result<()> {
    let ledger = ctx.ledger()?;

    let mut request = PickRequest::new(&args.item, args.quantity, ctx.actor());
    if let Some(lot) = args.lot {
        request = request.with_lot(LotId(lot));
    }
    if let Some(ref destination) = args.destination {
        request = request.with_destination(destination);
    }
    if let Some(ref work_order) = args.work_order {
        request = request.with_work_order(work_order);
    }

    let outcome = with_retry(&ledger.retry_policy(), || ledger.pick(&request))?;
    report(ctx, &outcome)
}

pub fn handle_restock(ctx: &AppContext, args: &RestockArgs) -> anyhow::Result<()> {
    let ledger = ctx.ledger()?;

    let mut request = match (args.lot, args.item.as_deref()) {
        (Some(lot), None) => RestockRequest::for_lot(LotId(lot), args.quantity, ctx.actor()),
        (None, Some(item)) => RestockRequest::for_item(item, args.quantity, ctx.actor()),
        _ => {
            return Err(
                CliError::invalid_input("Pass exactly one of --lot or --item").into(),
            )
        }
    };
    if let Some(ref location) = args.location {
        request = request.with_location(location);
    }
    if let Some(ref work_order) = args.work_order {
        request = request.with_work_order(work_order);
    }

    let outcome = with_retry(&ledger.retry_policy(), || ledger.restock(&request))?;
    report(ctx, &outcome)
}

pub fn handle_adjust(ctx: &AppContext, args: &AdjustArgs) -> anyhow::Result<()> {
    let ledger = ctx.ledger()?;

    let mut request = AdjustRequest::new(LotId(args.lot), args.delta, ctx.actor());
    if let Some(ref work_order) = args.work_order {
        request = request.with_work_order(work_order);
    }

    let outcome = with_retry(&ledger.retry_policy(), || ledger.adjust(&request))?;
    report(ctx, &outcome)
}

fn report(ctx: &AppContext, outcome: &OperationOutcome) -> anyhow::Result<()> {
    if ctx.json() {
        return print_json(outcome);
    }
    print_outcome(outcome, ctx.quiet());
    Ok(())
}
