//! Path resolution for config and ledger files.

use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::config::{default_config_path, read_config, LotledgerConfig};
use crate::errors::CliError;

/// Resolve the config file path, checking LOTLEDGER_CONFIG env var first.
pub fn resolve_config_path() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("LOTLEDGER_CONFIG") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }
    default_config_path()
}

/// Resolve the ledger database path from CLI args or config.
pub fn resolve_ledger_path(cli: &Cli, config: Option<&LotledgerConfig>) -> anyhow::Result<PathBuf> {
    if let Some(path) = cli.db.as_deref() {
        return Ok(PathBuf::from(path));
    }

    match config {
        Some(config) => Ok(PathBuf::from(&config.ledger.path)),
        None => {
            let config_path = resolve_config_path()?;
            Err(CliError::not_found(
                format!("No config found at {}", config_path.display()),
                init_hint(),
            )
            .into())
        }
    }
}

/// Load the config file if there is one.
pub fn load_config() -> anyhow::Result<Option<LotledgerConfig>> {
    let path = resolve_config_path()?;
    if !path.exists() {
        return Ok(None);
    }
    read_config(&path).map(Some)
}

/// Error message when the ledger database is missing.
pub fn missing_ledger_message(path: &Path) -> String {
    format!("No ledger found at {}", path.display())
}

pub fn init_hint() -> String {
    "\nRun:\n  lotledger init\n\nOr specify a ledger path:\n  LOTLEDGER_PATH=/path/to/ledger.db lotledger init".to_string()
}
