use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use lotledger_core::EngineConfig;

#[derive(Debug, Serialize, Deserialize)]
pub struct LotledgerConfig {
    pub ledger: LedgerSection,

    /// Engine limits and concurrency settings; every field defaults
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LedgerSection {
    pub path: String,
}

impl LotledgerConfig {
    pub fn new(ledger_path: PathBuf) -> Self {
        Self {
            ledger: LedgerSection {
                path: ledger_path.to_string_lossy().to_string(),
            },
            engine: EngineConfig::default(),
        }
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("config.toml"))
}

pub fn default_ledger_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_data_dir()?.join("ledger.db"))
}

pub fn read_config(path: &Path) -> anyhow::Result<LotledgerConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}

pub fn write_config(path: &Path, config: &LotledgerConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!(
                "Failed to create config directory {}: {}",
                parent.display(),
                e
            )
        })?;
    }
    let contents =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {}", e))?;
    std::fs::write(path, contents)
        .map_err(|e| anyhow::anyhow!("Failed to write config {}: {}", path.display(), e))?;
    Ok(())
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("lotledger"));
        }
    }
    Ok(home_dir()?.join(".config").join("lotledger"))
}

pub fn xdg_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_DATA_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("lotledger"));
        }
    }
    Ok(home_dir()?.join(".local").join("share").join("lotledger"))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; cannot resolve default paths"))?;
    Ok(PathBuf::from(home))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_section_is_optional() {
        let config: LotledgerConfig =
            toml::from_str("[ledger]\npath = \"/var/lib/lotledger/ledger.db\"\n").unwrap();
        assert_eq!(config.ledger.path, "/var/lib/lotledger/ledger.db");
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn test_partial_engine_section_keeps_other_defaults() {
        let config: LotledgerConfig = toml::from_str(
            "[ledger]\npath = \"ledger.db\"\n\n[engine.limits]\nmax_quantity = 500\n",
        )
        .unwrap();
        assert_eq!(config.engine.limits.max_quantity, 500);
        assert_eq!(config.engine.concurrency, EngineConfig::default().concurrency);
    }

    #[test]
    fn test_written_config_reads_back() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        write_config(&path, &LotledgerConfig::new(PathBuf::from("/tmp/ledger.db"))).unwrap();

        let config = read_config(&path).unwrap();
        assert_eq!(config.ledger.path, "/tmp/ledger.db");
    }
}
