//! # Environment Variable Loader
//!
//! ## Variables
//! - `RW_STORAGE_FORCE_LOAD`: rebuild corrupted handlers from their records
//!   (true/false, default: false)
//! - `RW_STORAGE_PURGE_CORRUPTED`: delete corrupted handlers (default: true)
//! - `RW_STORAGE_QUARANTINE_CORRUPTED`: quarantine before purging
//!   (default: true)
//! - `RW_DATABASE_URL`: sqlx connection URL
//!   (default: `sqlite://regionward.db?mode=rwc`)
//! - `RW_DATABASE_POOL_SIZE`: connection pool size (default: 5)
//! - `RW_LOG_LEVEL`: logging level (trace/debug/info/warn/error, default:
//!   "info")
//!
//! Unset variables leave the current value alone; set but unparseable ones
//! are an error rather than a silent fallback.

use crate::config::Config;
use errors::ConfigError;
use std::env;
use std::str::FromStr;

pub const FORCE_LOAD: &str = "RW_STORAGE_FORCE_LOAD";
pub const PURGE_CORRUPTED: &str = "RW_STORAGE_PURGE_CORRUPTED";
pub const QUARANTINE_CORRUPTED: &str = "RW_STORAGE_QUARANTINE_CORRUPTED";
pub const DATABASE_URL: &str = "RW_DATABASE_URL";
pub const DATABASE_POOL_SIZE: &str = "RW_DATABASE_POOL_SIZE";
pub const LOG_LEVEL: &str = "RW_LOG_LEVEL";

/// Defaults overlaid with whatever `RW_*` variables are set.
pub fn load_from_env() -> Result<Config, ConfigError> {
    let mut config = Config::default();
    apply_env(&mut config)?;
    Ok(config)
}

/// Overlays set `RW_*` variables onto `config`. Returns the keys changed.
pub fn apply_env(config: &mut Config) -> Result<Vec<&'static str>, ConfigError> {
    let mut changed = Vec::new();

    if let Some(value) = parse_env(FORCE_LOAD)? {
        config.storage.force_load = value;
        changed.push("storage.force_load");
    }
    if let Some(value) = parse_env(PURGE_CORRUPTED)? {
        config.storage.purge_corrupted = value;
        changed.push("storage.purge_corrupted");
    }
    if let Some(value) = parse_env(QUARANTINE_CORRUPTED)? {
        config.storage.quarantine_corrupted = value;
        changed.push("storage.quarantine_corrupted");
    }
    if let Some(value) = read_env(DATABASE_URL) {
        config.database.url = value;
        changed.push("database.url");
    }
    if let Some(value) = parse_env(DATABASE_POOL_SIZE)? {
        config.database.pool_size = value;
        changed.push("database.pool_size");
    }
    if let Some(value) = read_env(LOG_LEVEL) {
        config.observability.logging_level = value.to_lowercase();
        changed.push("observability.logging_level");
    }

    Ok(changed)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = read_env(key) else {
        return Ok(None);
    };
    raw.to_lowercase()
        .parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::EnvParse {
            variable: key.to_string(),
            reason: format!("{raw:?}: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear() {
        unsafe {
            for key in [
                FORCE_LOAD,
                PURGE_CORRUPTED,
                QUARANTINE_CORRUPTED,
                DATABASE_URL,
                DATABASE_POOL_SIZE,
                LOG_LEVEL,
            ] {
                env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_load_from_env_defaults() {
        clear();
        let config = load_from_env().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    #[serial]
    fn test_load_from_env_overrides() {
        clear();
        unsafe {
            env::set_var(FORCE_LOAD, "TRUE");
            env::set_var(PURGE_CORRUPTED, "false");
            env::set_var(DATABASE_URL, "sqlite::memory:");
            env::set_var(DATABASE_POOL_SIZE, "3");
            env::set_var(LOG_LEVEL, "Debug");
        }
        let config = load_from_env().unwrap();
        clear();

        assert!(config.storage.force_load);
        assert!(!config.storage.purge_corrupted);
        assert!(config.storage.quarantine_corrupted);
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.database.pool_size, 3);
        assert_eq!(config.observability.logging_level, "debug");
    }

    #[test]
    #[serial]
    fn test_apply_env_reports_changed_keys() {
        clear();
        unsafe {
            env::set_var(QUARANTINE_CORRUPTED, "false");
        }
        let mut config = Config::default();
        let changed = apply_env(&mut config).unwrap();
        clear();

        assert_eq!(changed, vec!["storage.quarantine_corrupted"]);
        assert!(!config.storage.quarantine_corrupted);
    }

    #[test]
    #[serial]
    fn test_invalid_value_is_an_error() {
        clear();
        unsafe {
            env::set_var(DATABASE_POOL_SIZE, "many");
        }
        let result = load_from_env();
        clear();

        match result {
            Err(ConfigError::EnvParse { variable, .. }) => {
                assert_eq!(variable, DATABASE_POOL_SIZE);
            }
            other => panic!("expected EnvParse, got {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn test_blank_value_is_ignored() {
        clear();
        unsafe {
            env::set_var(FORCE_LOAD, "  ");
        }
        let config = load_from_env().unwrap();
        clear();
        assert!(!config.storage.force_load);
    }
}
