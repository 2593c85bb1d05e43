//! # Configuration Precedence
//!
//! 1. Environment variables (highest priority)
//! 2. Configuration file
//! 3. Default values (lowest priority)

use crate::config::Config;
use crate::file_loader::{ConfigFileError, load_from_file};
use crate::loader::apply_env;
use errors::ConfigError;
use std::path::Path;
use validator::Validate;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    File(#[from] ConfigFileError),

    #[error(transparent)]
    Env(#[from] ConfigError),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Layers the environment over `file_config`, falling back to `defaults`
/// when there is no file.
pub fn merge_configs(
    defaults: Config,
    file_config: Option<Config>,
    file_source_name: &str,
) -> Result<Config, ConfigError> {
    let mut config = match file_config {
        Some(file) => {
            if file != defaults {
                tracing::info!("Configuration loaded from {}", file_source_name);
            }
            file
        }
        None => defaults,
    };

    let changes = apply_env(&mut config)?;
    if !changes.is_empty() {
        tracing::info!("Configuration from env: {:?}", changes);
    }
    Ok(config)
}

/// Loads the optional file, applies the environment and validates.
pub fn load(path: Option<&Path>) -> Result<Config, LoadError> {
    let file_config = path.map(load_from_file).transpose()?;
    let source = path.map_or_else(String::new, |p| p.display().to_string());
    let config = merge_configs(Config::default(), file_config, &source)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{DATABASE_POOL_SIZE, DATABASE_URL, FORCE_LOAD, PURGE_CORRUPTED};
    use serial_test::serial;
    use std::{env, fs};
    use tempfile::TempDir;

    fn clear() {
        unsafe {
            for key in [FORCE_LOAD, PURGE_CORRUPTED, DATABASE_URL, DATABASE_POOL_SIZE] {
                env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        clear();
        let mut file = Config::default();
        file.database.url = "sqlite://file.db".to_string();
        file.storage.purge_corrupted = false;
        unsafe {
            env::set_var(DATABASE_URL, "sqlite://env.db");
        }
        let config = merge_configs(Config::default(), Some(file), "test.toml").unwrap();
        clear();

        assert_eq!(config.database.url, "sqlite://env.db");
        assert!(!config.storage.purge_corrupted);
    }

    #[test]
    #[serial]
    fn test_env_can_restore_default_value() {
        clear();
        let mut file = Config::default();
        file.storage.purge_corrupted = false;
        unsafe {
            env::set_var(PURGE_CORRUPTED, "true");
        }
        let config = merge_configs(Config::default(), Some(file), "test.toml").unwrap();
        clear();
        assert!(config.storage.purge_corrupted);
    }

    #[test]
    #[serial]
    fn test_load_without_file_uses_defaults() {
        clear();
        assert_eq!(load(None).unwrap(), Config::default());
    }

    #[test]
    #[serial]
    fn test_load_validates_result() {
        clear();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("regionward.toml");
        fs::write(&path, "[database]\npool_size = 0\n").unwrap();
        assert!(matches!(load(Some(&path)), Err(LoadError::Validation(_))));

        unsafe {
            env::set_var(DATABASE_POOL_SIZE, "4");
        }
        let config = load(Some(&path)).unwrap();
        clear();
        assert_eq!(config.database.pool_size, 4);
    }

    #[test]
    #[serial]
    fn test_load_reports_file_errors() {
        clear();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.yaml");
        assert!(matches!(load(Some(&path)), Err(LoadError::File(_))));
    }
}
