//! # Engine Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     FISCAL_INTEGRITY_SECRET=...                                        │
//! │     FISCAL_DATABASE_PATH=/var/lib/fiscal/fiscal.db                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     explicit path, or                                                  │
//! │     ~/.config/fiscal-engine/engine.toml (Linux)                        │
//! │     ~/Library/Application Support/com.fiscal.engine/engine.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # engine.toml
//! [fiscal]
//! integrity_secret = "change-me"
//! default_vat_rate_bps = 1400        # 14 %
//! default_retention_rate_bps = 650   # 6.5 %
//!
//! [database]
//! path = "fiscal.db"
//! max_connections = 5
//! busy_timeout_secs = 5
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use fiscal_core::types::Rate;
use fiscal_db::{DbConfig, MEMORY_PATH};

// =============================================================================
// Fiscal Settings
// =============================================================================

/// Tax defaults and the integrity stamp secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiscalSettings {
    /// Shared secret mixed into every integrity hash. Must not be empty.
    #[serde(default)]
    pub integrity_secret: String,

    /// VAT rate for lines whose product has none and that don't set one.
    #[serde(default = "default_vat_rate")]
    pub default_vat_rate_bps: u32,

    /// Retention rate for service lines when neither the line nor the
    /// product sets one.
    #[serde(default = "default_retention_rate")]
    pub default_retention_rate_bps: u32,
}

fn default_vat_rate() -> u32 {
    1400
}

fn default_retention_rate() -> u32 {
    650
}

impl Default for FiscalSettings {
    fn default() -> Self {
        FiscalSettings {
            integrity_secret: String::new(),
            default_vat_rate_bps: default_vat_rate(),
            default_retention_rate_bps: default_retention_rate(),
        }
    }
}

impl FiscalSettings {
    pub fn default_vat_rate(&self) -> Rate {
        Rate::from_bps(self.default_vat_rate_bps)
    }

    pub fn default_retention_rate(&self) -> Rate {
        Rate::from_bps(self.default_retention_rate_bps)
    }
}

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits for the database lock (seconds).
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_secs: u64,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("fiscal.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout(),
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub fiscal: FiscalSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl EngineConfig {
    /// In-memory database with the given secret. Used by tests and embedders
    /// that don't need persistence.
    pub fn in_memory(integrity_secret: impl Into<String>) -> Self {
        EngineConfig {
            fiscal: FiscalSettings {
                integrity_secret: integrity_secret.into(),
                ..FiscalSettings::default()
            },
            database: DatabaseSettings {
                path: PathBuf::from(MEMORY_PATH),
                max_connections: 1,
                ..DatabaseSettings::default()
            },
        }
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`engine.toml`)
    /// 3. Environment variables
    pub fn load(config_path: Option<&Path>) -> EngineResult<Self> {
        let mut config = Self::default();

        let path = config_path
            .map(Path::to_path_buf)
            .or_else(Self::default_config_path);
        if let Some(path) = path {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else if config_path.is_some() {
                warn!(?path, "Config file not found, using defaults");
            } else {
                debug!(?path, "No config file, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.fiscal.integrity_secret.trim().is_empty() {
            return Err(EngineError::InvalidConfig(
                "fiscal.integrity_secret must be set".into(),
            ));
        }

        for (field, bps) in [
            ("fiscal.default_vat_rate_bps", self.fiscal.default_vat_rate_bps),
            (
                "fiscal.default_retention_rate_bps",
                self.fiscal.default_retention_rate_bps,
            ),
        ] {
            if bps > Rate::MAX_BPS {
                return Err(EngineError::InvalidConfig(format!(
                    "{} must be at most {}, got {}",
                    field,
                    Rate::MAX_BPS,
                    bps
                )));
            }
        }

        if self.database.max_connections == 0 {
            return Err(EngineError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Pool configuration for [`fiscal_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        let base = if self.database.path == Path::new(MEMORY_PATH) {
            DbConfig::in_memory()
        } else {
            DbConfig::new(&self.database.path)
        };
        base.max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_secs(self.database.busy_timeout_secs))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("FISCAL_INTEGRITY_SECRET") {
            debug!("Overriding integrity secret from environment");
            self.fiscal.integrity_secret = secret;
        }

        if let Ok(path) = std::env::var("FISCAL_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(value) = std::env::var("FISCAL_DATABASE_MAX_CONNECTIONS") {
            match value.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %value, "Ignoring invalid FISCAL_DATABASE_MAX_CONNECTIONS"),
            }
        }

        if let Ok(value) = std::env::var("FISCAL_DEFAULT_VAT_RATE_BPS") {
            match value.parse::<u32>() {
                Ok(bps) => self.fiscal.default_vat_rate_bps = bps,
                Err(_) => warn!(value = %value, "Ignoring invalid FISCAL_DEFAULT_VAT_RATE_BPS"),
            }
        }

        if let Ok(value) = std::env::var("FISCAL_DEFAULT_RETENTION_RATE_BPS") {
            match value.parse::<u32>() {
                Ok(bps) => self.fiscal.default_retention_rate_bps = bps,
                Err(_) => {
                    warn!(value = %value, "Ignoring invalid FISCAL_DEFAULT_RETENTION_RATE_BPS")
                }
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "fiscal", "engine")
            .map(|dirs| dirs.config_dir().join("engine.toml"))
    }
}
