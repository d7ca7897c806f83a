//! Application context for the Lotledger CLI.
//!
//! Bundles the CLI arguments with the lazily-loaded config and ledger.

use once_cell::unsync::OnceCell;

use lotledger_core::Ledger;

use crate::cli::Cli;
use crate::config::LotledgerConfig;
use crate::constants::FALLBACK_ACTOR;
use crate::errors::CliError;

use super::resolver::{init_hint, load_config, missing_ledger_message, resolve_ledger_path};

/// Application context that bundles CLI args with config and the open ledger.
///
/// This avoids repeatedly loading config and threading multiple parameters
/// through handler functions.
pub struct AppContext<'a> {
    cli: &'a Cli,
    config: OnceCell<Option<LotledgerConfig>>,
    ledger: OnceCell<Ledger>,
}

impl<'a> AppContext<'a> {
    /// Create a new application context from CLI arguments.
    pub fn new(cli: &'a Cli) -> Self {
        Self {
            cli,
            config: OnceCell::new(),
            ledger: OnceCell::new(),
        }
    }

    /// Get the CLI arguments.
    pub fn cli(&self) -> &Cli {
        self.cli
    }

    /// Check if quiet mode is enabled.
    pub fn quiet(&self) -> bool {
        self.cli.quiet
    }

    pub fn json(&self) -> bool {
        self.cli.json
    }

    /// Actor recorded in ledger entries: `--actor`, then `$USER`.
    pub fn actor(&self) -> String {
        self.cli
            .actor
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_ACTOR.to_string())
    }

    /// Get the config file contents, loading them lazily. `None` when no
    /// config file exists.
    pub fn config(&self) -> anyhow::Result<Option<&LotledgerConfig>> {
        let config = self.config.get_or_try_init(load_config)?;
        Ok(config.as_ref())
    }

    /// Open the ledger on first use.
    pub fn ledger(&self) -> anyhow::Result<&Ledger> {
        self.ledger.get_or_try_init(|| {
            let config = self.config()?;
            let path = resolve_ledger_path(self.cli, config)?;
            if !path.exists() {
                return Err(CliError::not_found(missing_ledger_message(&path), init_hint()).into());
            }
            let engine = config.map(|config| config.engine.clone()).unwrap_or_default();
            tracing::debug!(path = %path.display(), "opening ledger");
            Ok(Ledger::open(&path, engine)?)
        })
    }
}
