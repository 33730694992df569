//! CLI configuration management.
//!
//! Stored as TOML in `~/.hdforge/config.toml`.

use hdforge_crypto::KdfParams;
use hdforge_types::{Discrimination, WalletScheme};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Wallet database directory
    pub db_dir: PathBuf,
    /// Address network
    pub network: Discrimination,
    /// Derivation scheme for new wallets
    pub scheme: WalletScheme,
    /// Tracing filter directive
    pub log_level: String,
    /// Emit logs as JSON
    pub json_logs: bool,
    /// Password hashing cost
    pub kdf: KdfParams,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_dir: Self::base_dir().join("db"),
            network: Discrimination::Production,
            scheme: WalletScheme::Cip1852,
            log_level: "warn".to_string(),
            json_logs: false,
            kdf: KdfParams::default(),
        }
    }
}

impl CliConfig {
    /// Load configuration from the default location, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: CliConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get configuration file path.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
        Ok(home.join(".hdforge").join("config.toml"))
    }

    fn base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".hdforge")
    }
}
