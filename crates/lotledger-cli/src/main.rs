//! Lotledger CLI - inventory lot ledger
//!
//! This is the command-line interface for Lotledger. It maps subcommands onto
//! the core engine and engine errors onto exit codes.

mod app;
mod cli;
mod commands;
mod config;
mod constants;
mod errors;
mod logging;
mod output;

use clap::Parser;
use lotledger_core::VERSION;

use crate::app::AppContext;
use crate::cli::{Cli, Commands};
use crate::commands::{init, maintenance, operations, query};
use crate::errors::{exit_code_for, hint_for};

fn main() {
    let cli = Cli::parse();
    logging::init();
    let ctx = AppContext::new(&cli);

    if let Err(e) = run(&ctx, &cli) {
        eprintln!("Error: {:#}", e);
        if let Some(hint) = hint_for(&e) {
            eprintln!("{}", hint);
        }
        std::process::exit(exit_code_for(&e));
    }
}

fn run(ctx: &AppContext, cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Some(Commands::Init(args)) => {
            init::handle_init(ctx, args)?;
        }
        Some(Commands::Stock(args)) => {
            operations::handle_stock(ctx, args)?;
        }
        Some(Commands::Pick(args)) => {
            operations::handle_pick(ctx, args)?;
        }
        Some(Commands::Restock(args)) => {
            operations::handle_restock(ctx, args)?;
        }
        Some(Commands::Adjust(args)) => {
            operations::handle_adjust(ctx, args)?;
        }
        Some(Commands::Lot { lot_id }) => {
            query::handle_lot(ctx, *lot_id)?;
        }
        Some(Commands::Lots(args)) => {
            query::handle_lots(ctx, args)?;
        }
        Some(Commands::History(args)) => {
            query::handle_history(ctx, args)?;
        }
        Some(Commands::Check) => {
            maintenance::handle_check(ctx)?;
        }
        Some(Commands::Backup { destination }) => {
            maintenance::handle_backup(ctx, destination)?;
        }
        Some(Commands::Completions { shell }) => {
            maintenance::handle_completions(*shell)?;
        }
        None => {
            println!("Lotledger v{}", VERSION);
            println!("\nRun `lotledger --help` for usage information.");
        }
    }
    Ok(())
}
