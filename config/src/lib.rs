//! # Configuration System
//!
//! Configuration for regionward tools and services.
//!
//! This crate provides:
//! - Configuration structures for storage, database and observability
//! - Environment variable loading (`RW_*`)
//! - Configuration file loading (TOML/YAML)
//! - Configuration precedence (env > file > defaults)
//! - Configuration validation via the `validator` crate

pub mod config;
pub mod file_loader;
pub mod loader;
pub mod precedence;

pub use config::{Config, DatabaseConfig, ObservabilityConfig, StorageConfig};
pub use file_loader::{ConfigFileError, load_from_file, load_from_toml, load_from_yaml};
pub use loader::{apply_env, load_from_env};
pub use precedence::{LoadError, load, merge_configs};
pub use validator::Validate;
