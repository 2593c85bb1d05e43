//! # Configuration Structures
//!
//! Every section deserializes with `#[serde(default)]`, so a file only needs
//! to name the values it changes.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Top-level configuration.
///
/// ## Sections
/// - `storage`: how corrupted persisted handlers are treated on load
/// - `database`: where handlers and links are persisted
/// - `observability`: log filtering
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    #[validate(nested)]
    pub storage: StorageConfig,

    #[serde(default)]
    #[validate(nested)]
    pub database: DatabaseConfig,

    #[serde(default)]
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

/// Corruption policy applied when loading persisted handlers.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct StorageConfig {
    /// Rebuild handlers whose metadata disagrees with their stored record,
    /// trusting the record.
    #[serde(default)]
    pub force_load: bool,

    /// Delete corrupted handlers that were not force-loaded.
    #[serde(default = "default_true")]
    pub purge_corrupted: bool,

    /// Copy a corrupted handler into the quarantine table before purging it.
    #[serde(default = "default_true")]
    pub quarantine_corrupted: bool,
}

fn default_true() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            force_load: false,
            purge_corrupted: true,
            quarantine_corrupted: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// sqlx connection URL
    #[serde(default = "default_database_url")]
    #[validate(length(min = 1))]
    pub url: String,

    #[serde(default = "default_database_pool_size")]
    #[validate(range(min = 1, max = 100))]
    pub pool_size: u32,
}

fn default_database_url() -> String {
    "sqlite://regionward.db?mode=rwc".to_string()
}

fn default_database_pool_size() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_size: default_database_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// Default `tracing` filter level when `RUST_LOG` is unset
    #[serde(default = "default_logging_level")]
    #[validate(custom(function = "validate_logging_level"))]
    pub logging_level: String,
}

fn default_logging_level() -> String {
    "info".to_string()
}

fn validate_logging_level(value: &str) -> Result<(), validator::ValidationError> {
    match value {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(validator::ValidationError::new("Invalid logging level")),
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            logging_level: default_logging_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.storage.force_load);
        assert!(config.storage.purge_corrupted);
        assert!(config.storage.quarantine_corrupted);
        assert_eq!(config.database.url, "sqlite://regionward.db?mode=rwc");
        assert_eq!(config.database.pool_size, 5);
        assert_eq!(config.observability.logging_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config: Config = toml::from_str("[storage]\nforce_load = true\n").unwrap();
        assert!(config.storage.force_load);
        assert!(config.storage.purge_corrupted);
        assert_eq!(config.database, DatabaseConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.database.pool_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.database.url = String::new();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.observability.logging_level = "loud".to_string();
        assert!(config.validate().is_err());
    }
}
