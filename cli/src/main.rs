use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(&cli.global)?;

    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.logging_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Handlers(cmd) => commands::handlers::run(cmd, config).await,
        Commands::Links(cmd) => commands::links::run(cmd, config).await,
        Commands::Evaluate(args) => commands::evaluate::run(args, config).await,
        Commands::Check(args) => commands::check::run(args, config).await,
    }
}
