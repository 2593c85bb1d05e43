//! # Configuration File Loading
//!
//! Loads configuration from TOML or YAML files, picking the format from the
//! file extension.

use crate::config::Config;
use std::path::Path;

/// Configuration file loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(String),

    #[error("Config file has no extension")]
    NoExtension,

    #[error("Unsupported config file format: {0}")]
    UnsupportedFormat(String),
}

/// Load configuration from a TOML file.
///
/// ```rust,no_run
/// use config::load_from_toml;
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_from_toml(Path::new("regionward.toml"))?;
///     println!("database: {}", config.database.url);
///     Ok(())
/// }
/// ```
pub fn load_from_toml(path: &Path) -> Result<Config, ConfigFileError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|_e| ConfigFileError::FileNotFound(path.display().to_string()))?;

    toml::from_str(&contents).map_err(|e| ConfigFileError::TomlParse(e.to_string()))
}

/// Load configuration from a YAML file.
pub fn load_from_yaml(path: &Path) -> Result<Config, ConfigFileError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|_e| ConfigFileError::FileNotFound(path.display().to_string()))?;

    serde_yaml::from_str(&contents).map_err(|e| ConfigFileError::YamlParse(e.to_string()))
}

/// Load configuration from file, detecting the format.
///
/// Supported extensions: `.toml`, `.yaml`, `.yml` (case-insensitive).
pub fn load_from_file(path: &Path) -> Result<Config, ConfigFileError> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or(ConfigFileError::NoExtension)?;

    match extension.to_lowercase().as_str() {
        "toml" => load_from_toml(path),
        "yaml" | "yml" => load_from_yaml(path),
        other => Err(ConfigFileError::UnsupportedFormat(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("regionward.toml");
        fs::write(
            &path,
            r#"
[storage]
force_load = true
purge_corrupted = false

[database]
url = "sqlite://test.db"
pool_size = 2
"#,
        )
        .unwrap();

        let config = load_from_toml(&path).unwrap();
        assert!(config.storage.force_load);
        assert!(!config.storage.purge_corrupted);
        assert!(config.storage.quarantine_corrupted);
        assert_eq!(config.database.url, "sqlite://test.db");
        assert_eq!(config.database.pool_size, 2);
        assert_eq!(config.observability.logging_level, "info");
    }

    #[test]
    fn test_load_from_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("regionward.yaml");
        fs::write(
            &path,
            r"
storage:
  quarantine_corrupted: false
observability:
  logging_level: debug
",
        )
        .unwrap();

        let config = load_from_yaml(&path).unwrap();
        assert!(!config.storage.quarantine_corrupted);
        assert_eq!(config.observability.logging_level, "debug");
    }

    #[test]
    fn test_load_from_file_missing() {
        let dir = TempDir::new().unwrap();
        let result = load_from_file(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigFileError::FileNotFound(_))));
    }

    #[test]
    fn test_load_from_file_bad_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[storage\nforce_load = ").unwrap();
        assert!(matches!(
            load_from_file(&path),
            Err(ConfigFileError::TomlParse(_))
        ));
    }

    #[test]
    fn test_load_from_file_unsupported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("regionward.json");
        fs::write(&path, "{}").unwrap();
        assert!(matches!(
            load_from_file(&path),
            Err(ConfigFileError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_load_from_file_no_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("regionward");
        fs::write(&path, "").unwrap();
        assert!(matches!(
            load_from_file(&path),
            Err(ConfigFileError::NoExtension)
        ));
    }

    #[test]
    fn test_load_from_file_yml_uppercase() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("regionward.YML");
        fs::write(&path, "database:\n  pool_size: 9\n").unwrap();
        assert_eq!(load_from_file(&path).unwrap().database.pool_size, 9);
    }
}
