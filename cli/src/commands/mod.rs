use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use config::{Config, StorageConfig};
use std::path::PathBuf;
use storage::HandlerStore;

pub mod check;
pub mod evaluate;
pub mod handlers;
pub mod links;

#[derive(Parser)]
#[command(name = "wardctl")]
#[command(author, version, about = "Regionward - inspect and administer region policy stores")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Configuration file (.toml, .yaml or .yml)
    #[arg(long, short, global = true, env = "RW_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Database URL, overriding the configuration file and environment
    #[arg(long, global = true, value_name = "URL")]
    pub database: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(subcommand, about = "List, inspect, create and edit handlers")]
    Handlers(handlers::HandlersCommand),

    #[command(subcommand, about = "Manage region-handler links")]
    Links(links::LinksCommand),

    #[command(about = "Resolve a query against one or more regions")]
    Evaluate(evaluate::EvaluateArgs),

    #[command(about = "Load the whole store and report corrupted data")]
    Check(check::CheckArgs),
}

/// Defaults, then the file, then `RW_*` variables, then command-line flags.
pub fn load_config(global: &GlobalArgs) -> Result<Config> {
    let mut config = config::load(global.config.as_deref()).context("Failed to load configuration")?;
    if let Some(url) = &global.database {
        config.database.url.clone_from(url);
    }
    Ok(config)
}

/// An open store plus the configuration it was opened with.
pub struct Session {
    pub config: Config,
    pub store: HandlerStore,
}

impl Session {
    pub async fn open(config: Config) -> Result<Self> {
        let pool = storage::connect(&config.database)
            .await
            .with_context(|| format!("Failed to open database {}", config.database.url))?;
        let store = HandlerStore::new(pool, config.storage.clone());
        store
            .initialize_schema()
            .await
            .context("Failed to initialize schema")?;
        tracing::debug!(url = %config.database.url, "store opened");
        Ok(Self { config, store })
    }

    /// Same database, but corrupted handlers are only reported. Inspection
    /// commands use this so that looking never deletes anything.
    pub fn inspecting_store(&self) -> HandlerStore {
        let policy = StorageConfig {
            purge_corrupted: false,
            quarantine_corrupted: false,
            ..self.config.storage.clone()
        };
        HandlerStore::new(self.store.pool().clone(), policy)
    }
}
