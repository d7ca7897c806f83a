use std::path::Path;

use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::app::AppContext;
use crate::cli::Cli;
use crate::errors::CliError;
use crate::output::{print_json, print_report};

pub fn handle_check(ctx: &AppContext) -> anyhow::Result<()> {
    let ledger = ctx.ledger()?;
    let report = match ledger.check() {
        Ok(report) => report,
        Err(err) => {
            eprintln!("Integrity check: FAILED");
            eprintln!("- error: {}", err);
            return Err(CliError::integrity_failed(
                "Integrity check failed\nHint: Restore from a backup made with `lotledger backup`.",
            )
            .into());
        }
    };

    if ctx.json() {
        print_json(&report)?;
    } else {
        print_report(&report, ctx.quiet());
    }
    if !report.is_clean() {
        return Err(CliError::integrity_failed(format!(
            "Ledger does not reconcile: {} discrepancies",
            report.discrepancies.len()
        ))
        .into());
    }
    Ok(())
}

pub fn handle_backup(ctx: &AppContext, destination: &str) -> anyhow::Result<()> {
    let ledger = ctx.ledger()?;
    let destination = Path::new(destination);
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!(
                    "Failed to create backup directory {}: {}",
                    parent.display(),
                    e
                )
            })?;
        }
    }

    ledger.backup_to(destination)?;
    if !ctx.quiet() {
        println!("Backed up ledger to {}", destination.display());
    }
    Ok(())
}

pub fn handle_completions(shell: Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "lotledger", &mut std::io::stdout());
    Ok(())
}
