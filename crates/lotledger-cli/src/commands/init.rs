use std::path::PathBuf;

use lotledger_core::{EngineConfig, Ledger};

use crate::app::{resolve_config_path, AppContext};
use crate::cli::InitArgs;
use crate::config::{default_ledger_path, write_config, LotledgerConfig};
use crate::errors::CliError;

pub fn handle_init(ctx: &AppContext, args: &InitArgs) -> anyhow::Result<()> {
    let ledger_path = match args.path.as_deref().or(ctx.cli().db.as_deref()) {
        Some(path) => PathBuf::from(path),
        None => default_ledger_path()?,
    };
    let config_path = match args.config_path.as_deref() {
        Some(path) => PathBuf::from(path),
        None => resolve_config_path()?,
    };

    if config_path.exists() && !args.force {
        return Err(CliError::invalid_input(format!(
            "Config already exists at {}\nHint: Pass --force to overwrite it.",
            config_path.display()
        ))
        .into());
    }

    if let Some(parent) = ledger_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!(
                    "Failed to create ledger directory {}: {}",
                    parent.display(),
                    e
                )
            })?;
        }
    }

    // Opening creates the schema; an existing ledger is left as it is.
    let existed = ledger_path.exists();
    Ledger::open(&ledger_path, EngineConfig::default())?;
    let ledger_path = ledger_path.canonicalize().unwrap_or(ledger_path);
    write_config(&config_path, &LotledgerConfig::new(ledger_path.clone()))?;
    tracing::info!(ledger = %ledger_path.display(), config = %config_path.display(), "initialized");

    if !ctx.quiet() {
        if existed {
            println!("Using existing ledger at {}", ledger_path.display());
        } else {
            println!("Initialized new ledger at {}", ledger_path.display());
        }
        println!("Config written to {}", config_path.display());
    }
    Ok(())
}
